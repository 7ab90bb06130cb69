//! Static registry of action specifications.
//!
//! The gate only applies to action types flagged as side-effecting here.
//! Each spec declares the argument shape used by schema validation and
//! whether the action is irreversible (which controls judge escalation).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The expected JSON kind of an argument field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    String,
    Number,
    Boolean,
    Object,
    Array,
}

impl ArgKind {
    /// Returns true if the JSON value matches this kind.
    #[must_use]
    pub fn matches(&self, value: &serde_json::Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

/// A declared argument field for an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgField {
    /// Field name.
    pub name: String,
    /// Expected JSON kind.
    pub kind: ArgKind,
    /// Whether the field must be present.
    pub required: bool,
}

impl ArgField {
    /// Creates a required field.
    #[must_use]
    pub fn required(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    /// Creates an optional field.
    #[must_use]
    pub fn optional(name: impl Into<String>, kind: ArgKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }
}

/// Specification of an action type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSpec {
    /// The action type (e.g. "send_message").
    pub action_type: String,
    /// Whether executing this action has an observable external effect.
    pub side_effecting: bool,
    /// Whether the effect cannot be undone once performed.
    pub irreversible: bool,
    /// Declared argument fields.
    pub args: Vec<ArgField>,
}

impl ActionSpec {
    /// Creates a new spec.
    #[must_use]
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            side_effecting: true,
            irreversible: false,
            args: Vec::new(),
        }
    }

    /// Marks the action as irreversible.
    #[must_use]
    pub fn irreversible(mut self) -> Self {
        self.irreversible = true;
        self
    }

    /// Marks the action as read-only (not side-effecting).
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.side_effecting = false;
        self
    }

    /// Adds an argument field.
    #[must_use]
    pub fn with_arg(mut self, field: ArgField) -> Self {
        self.args.push(field);
        self
    }

    /// Returns the required argument fields.
    pub fn required_args(&self) -> impl Iterator<Item = &ArgField> {
        self.args.iter().filter(|a| a.required)
    }
}

/// Registry of action specifications keyed by action type.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    specs: HashMap<String, ActionSpec>,
}

impl ActionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with the built-in action types.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register(
            ActionSpec::new("send_message")
                .irreversible()
                .with_arg(ArgField::required("recipient", ArgKind::String))
                .with_arg(ArgField::required("body", ArgKind::String))
                .with_arg(ArgField::optional("subject", ArgKind::String)),
        );
        registry.register(
            ActionSpec::new("create_calendar_event")
                .with_arg(ArgField::required("title", ArgKind::String))
                .with_arg(ArgField::required("start", ArgKind::String))
                .with_arg(ArgField::optional("end", ArgKind::String))
                .with_arg(ArgField::optional("attendees", ArgKind::Array)),
        );
        registry.register(
            ActionSpec::new("append_document")
                .with_arg(ArgField::required("document_id", ArgKind::String))
                .with_arg(ArgField::required("content", ArgKind::String)),
        );

        registry
    }

    /// Registers a spec, replacing any previous one for the same type.
    pub fn register(&mut self, spec: ActionSpec) {
        self.specs.insert(spec.action_type.clone(), spec);
    }

    /// Returns the spec for an action type, if registered.
    #[must_use]
    pub fn get(&self, action_type: &str) -> Option<&ActionSpec> {
        self.specs.get(action_type)
    }

    /// Returns true if the action type is registered as side-effecting.
    ///
    /// Unregistered action types are treated as side-effecting so that
    /// unknown actions never bypass the gate.
    #[must_use]
    pub fn is_side_effecting(&self, action_type: &str) -> bool {
        self.specs
            .get(action_type)
            .is_none_or(|spec| spec.side_effecting)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_send_message_is_irreversible() {
        let registry = ActionRegistry::with_builtins();
        let spec = registry.get("send_message").expect("registered");
        assert!(spec.side_effecting);
        assert!(spec.irreversible);
        assert_eq!(spec.required_args().count(), 2);
    }

    #[test]
    fn unknown_action_is_treated_as_side_effecting() {
        let registry = ActionRegistry::with_builtins();
        assert!(registry.is_side_effecting("mystery_action"));
    }

    #[test]
    fn read_only_action_bypasses_gate() {
        let mut registry = ActionRegistry::new();
        registry.register(ActionSpec::new("list_events").read_only());
        assert!(!registry.is_side_effecting("list_events"));
    }

    #[test]
    fn arg_kind_matches() {
        assert!(ArgKind::String.matches(&serde_json::json!("x")));
        assert!(ArgKind::Number.matches(&serde_json::json!(5)));
        assert!(!ArgKind::String.matches(&serde_json::json!(5)));
        assert!(ArgKind::Array.matches(&serde_json::json!([])));
    }
}
