//! Durable agent memory.
//!
//! Memory entries are key/category/value triples maintained outside the
//! engine (by the surrounding application). During a run they are exposed
//! through a read-only [`MemoryView`]; the engine never writes memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use ulid::Ulid;

/// Unique identifier for a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MemoryEntryId(Ulid);

impl MemoryEntryId {
    /// Creates a new memory entry ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for MemoryEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MemoryEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mem_{}", self.0)
    }
}

/// A single durable memory entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// Unique identifier.
    pub id: MemoryEntryId,
    /// Entry category (e.g. "preference", "identity", "constraint").
    pub category: String,
    /// The entry key (e.g. "timezone", "name", "preferred_language").
    pub key: String,
    /// The entry value.
    pub value: JsonValue,
    /// When this entry was last updated.
    pub updated_at: DateTime<Utc>,
}

impl MemoryEntry {
    /// Creates a new memory entry.
    #[must_use]
    pub fn new(
        category: impl Into<String>,
        key: impl Into<String>,
        value: JsonValue,
    ) -> Self {
        Self {
            id: MemoryEntryId::new(),
            category: category.into(),
            key: key.into(),
            value,
            updated_at: Utc::now(),
        }
    }
}

/// A read-only view over an agent's memory entries for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryView {
    entries: Vec<MemoryEntry>,
}

impl MemoryView {
    /// Creates a view over the given entries.
    #[must_use]
    pub fn new(entries: Vec<MemoryEntry>) -> Self {
        Self { entries }
    }

    /// Creates an empty view.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the entry with the given key, if any.
    ///
    /// Keys are unique per agent; if duplicates exist the most recently
    /// updated entry wins.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&MemoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.key == key)
            .max_by_key(|e| e.updated_at)
    }

    /// Returns all entries in the given category.
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a MemoryEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    /// Returns all entries.
    #[must_use]
    pub fn entries(&self) -> &[MemoryEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the view holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_by_key() {
        let view = MemoryView::new(vec![
            MemoryEntry::new("identity", "name", serde_json::json!("Ada")),
            MemoryEntry::new("preference", "timezone", serde_json::json!("UTC")),
        ]);

        let entry = view.get("timezone").expect("entry exists");
        assert_eq!(entry.value, serde_json::json!("UTC"));
        assert!(view.get("missing").is_none());
    }

    #[test]
    fn duplicate_keys_prefer_newest() {
        let mut old = MemoryEntry::new("preference", "timezone", serde_json::json!("UTC"));
        old.updated_at = Utc::now() - chrono::Duration::days(1);
        let new = MemoryEntry::new("preference", "timezone", serde_json::json!("CET"));

        let view = MemoryView::new(vec![old, new]);
        assert_eq!(
            view.get("timezone").unwrap().value,
            serde_json::json!("CET")
        );
    }

    #[test]
    fn filter_by_category() {
        let view = MemoryView::new(vec![
            MemoryEntry::new("identity", "name", serde_json::json!("Ada")),
            MemoryEntry::new("preference", "timezone", serde_json::json!("UTC")),
            MemoryEntry::new("preference", "language", serde_json::json!("en")),
        ]);

        let prefs: Vec<_> = view.in_category("preference").collect();
        assert_eq!(prefs.len(), 2);
    }

    #[test]
    fn memory_entry_serde_roundtrip() {
        let entry = MemoryEntry::new("constraint", "diet", serde_json::json!("vegetarian"));
        let json = serde_json::to_string(&entry).expect("serialize");
        let parsed: MemoryEntry = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(entry, parsed);
    }
}
