//! L1 deterministic assertions.
//!
//! These are cheap lexical checks that run against the flattened text of
//! an action's arguments. Each assertion carries a severity: a failed
//! `Block` assertion hard-blocks the action, a failed `Warn` assertion is
//! recorded on the verdict but does not stop execution.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{[^}]*\}\}").expect("valid placeholder regex"));

/// How a failed assertion affects the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Failure hard-blocks the action.
    Block,
    /// Failure is recorded but does not stop execution.
    Warn,
}

/// The check an assertion performs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum AssertionCheck {
    /// No unresolved `{{...}}` template placeholder survives in the text.
    NoPlaceholders,
    /// Every declared required field is present and non-empty.
    RequiredFieldsNonEmpty,
    /// None of the configured terms appear in the text.
    NoProfanity { terms: Vec<String> },
    /// The text's script roughly matches the expected language tag.
    LanguageMatch { expected: String },
}

/// A named L1 assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assertion {
    pub name: String,
    pub check: AssertionCheck,
    pub severity: Severity,
}

impl Assertion {
    #[must_use]
    pub fn new(name: impl Into<String>, check: AssertionCheck, severity: Severity) -> Self {
        Self {
            name: name.into(),
            check,
            severity,
        }
    }
}

/// A recorded assertion failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionFailure {
    /// Name of the assertion that failed.
    pub assertion: String,
    pub severity: Severity,
    /// What was found.
    pub detail: String,
}

/// The default assertion set applied when a flow declares none.
#[must_use]
pub fn default_assertions() -> Vec<Assertion> {
    vec![
        Assertion::new(
            "no_placeholders",
            AssertionCheck::NoPlaceholders,
            Severity::Block,
        ),
        Assertion::new(
            "required_fields_non_empty",
            AssertionCheck::RequiredFieldsNonEmpty,
            Severity::Block,
        ),
    ]
}

/// Runs one assertion against the flattened argument text.
///
/// `required_field_text` holds the string value of each required field so
/// the non-empty check can inspect them individually.
#[must_use]
pub fn run_assertion(
    assertion: &Assertion,
    text: &str,
    required_field_text: &[(String, String)],
) -> Option<AssertionFailure> {
    let detail = match &assertion.check {
        AssertionCheck::NoPlaceholders => PLACEHOLDER_RE
            .find(text)
            .map(|m| format!("unresolved placeholder '{}'", m.as_str())),
        AssertionCheck::RequiredFieldsNonEmpty => required_field_text
            .iter()
            .find(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| format!("required field '{name}' is empty")),
        AssertionCheck::NoProfanity { terms } => {
            let lower = text.to_lowercase();
            terms
                .iter()
                .find(|term| lower.contains(&term.to_lowercase()))
                .map(|term| format!("disallowed term '{term}'"))
        }
        AssertionCheck::LanguageMatch { expected } => {
            if script_matches(text, expected) {
                None
            } else {
                Some(format!("text does not look like '{expected}'"))
            }
        }
    };

    detail.map(|detail| AssertionFailure {
        assertion: assertion.name.clone(),
        severity: assertion.severity,
        detail,
    })
}

/// A coarse script check: for Latin-tagged languages the majority of
/// alphabetic characters must be ASCII, and vice versa for others.
fn script_matches(text: &str, expected: &str) -> bool {
    let alphabetic: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    if alphabetic.is_empty() {
        return true;
    }
    let ascii = alphabetic.iter().filter(|c| c.is_ascii()).count();
    let latin_majority = ascii * 2 >= alphabetic.len();
    let expects_latin = matches!(
        expected.split('-').next().unwrap_or(expected),
        "en" | "es" | "fr" | "de" | "it" | "pt" | "nl"
    );
    latin_majority == expects_latin
}
