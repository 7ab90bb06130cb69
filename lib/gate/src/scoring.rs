//! L2 rule-based content scoring.
//!
//! Produces a 0-100 score across four weighted dimensions. The heuristics
//! are deliberately cheap and deterministic; the gate escalates to the L3
//! judge when this tier is not confident enough on its own.

use serde::{Deserialize, Serialize};

/// Relative weights for the four scoring dimensions, summing to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub relevance: u8,
    pub structure: u8,
    pub tone: u8,
    pub completeness: u8,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            relevance: 35,
            structure: 20,
            tone: 15,
            completeness: 30,
        }
    }
}

impl ScoreWeights {
    /// Total weight, used as the score denominator.
    #[must_use]
    pub fn total(&self) -> u32 {
        u32::from(self.relevance)
            + u32::from(self.structure)
            + u32::from(self.tone)
            + u32::from(self.completeness)
    }
}

/// One dimension's contribution to the L2 score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub dimension: String,
    /// Raw dimension score, 0-100 before weighting.
    pub score: u8,
    pub weight: u8,
    /// Why the dimension scored below full marks, if it did.
    pub note: Option<String>,
}

/// The full L2 result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Weighted total, 0-100.
    pub total: u8,
    pub dimensions: Vec<DimensionScore>,
}

/// Scores the flattened argument text against the triggering user message.
///
/// `required_field_text` carries the string value of each required field
/// for the completeness dimension.
#[must_use]
pub fn score_content(
    text: &str,
    user_message: &str,
    required_field_text: &[(String, String)],
    weights: &ScoreWeights,
) -> ScoreBreakdown {
    let dimensions = vec![
        relevance(text, user_message, weights.relevance),
        structure(text, weights.structure),
        tone(text, weights.tone),
        completeness(text, required_field_text, weights.completeness),
    ];

    let weighted: u32 = dimensions
        .iter()
        .map(|d| u32::from(d.score) * u32::from(d.weight))
        .sum();
    let total_weight = weights.total().max(1);
    let total = (weighted / total_weight).min(100) as u8;

    ScoreBreakdown { total, dimensions }
}

/// Keyword overlap between the content and the user message.
fn relevance(text: &str, user_message: &str, weight: u8) -> DimensionScore {
    let message_words: Vec<String> = significant_words(user_message);
    if message_words.is_empty() {
        return DimensionScore {
            dimension: "relevance".to_string(),
            score: 100,
            weight,
            note: None,
        };
    }

    let lower = text.to_lowercase();
    let hits = message_words.iter().filter(|w| lower.contains(*w)).count();
    let ratio = hits as f64 / message_words.len() as f64;
    // Half the keywords present already counts as fully relevant.
    let score = ((ratio * 2.0).min(1.0) * 100.0).round() as u8;

    DimensionScore {
        dimension: "relevance".to_string(),
        score,
        weight,
        note: (score < 100).then(|| {
            format!(
                "{hits} of {} user-message keywords present",
                message_words.len()
            )
        }),
    }
}

/// Length and sentence shape.
fn structure(text: &str, weight: u8) -> DimensionScore {
    let trimmed = text.trim();
    let (score, note) = if trimmed.is_empty() {
        (0, Some("content is empty".to_string()))
    } else if trimmed.len() < 10 {
        (40, Some("content is very short".to_string()))
    } else if trimmed.len() > 8_000 {
        (50, Some("content is unusually long".to_string()))
    } else {
        let sentences = trimmed
            .split(['.', '!', '?', '\n'])
            .filter(|s| !s.trim().is_empty())
            .count();
        if sentences == 0 {
            (60, Some("no sentence boundaries found".to_string()))
        } else {
            (100, None)
        }
    };

    DimensionScore {
        dimension: "structure".to_string(),
        score,
        weight,
        note,
    }
}

/// Shouting and exclamation-mark density.
fn tone(text: &str, weight: u8) -> DimensionScore {
    let alphabetic: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    let mut score: i32 = 100;
    let mut notes = Vec::new();

    if !alphabetic.is_empty() {
        let upper = alphabetic.iter().filter(|c| c.is_uppercase()).count();
        if upper * 2 > alphabetic.len() {
            score -= 50;
            notes.push("mostly upper-case text");
        }
    }

    let exclamations = text.chars().filter(|c| *c == '!').count();
    if exclamations > 3 {
        score -= 30;
        notes.push("excessive exclamation marks");
    }

    DimensionScore {
        dimension: "tone".to_string(),
        score: score.max(0) as u8,
        weight,
        note: (!notes.is_empty()).then(|| notes.join("; ")),
    }
}

/// Required-field emptiness and apparent truncation.
fn completeness(
    text: &str,
    required_field_text: &[(String, String)],
    weight: u8,
) -> DimensionScore {
    let mut score: i32 = 100;
    let mut notes = Vec::new();

    let empty: Vec<&str> = required_field_text
        .iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k.as_str())
        .collect();
    if !empty.is_empty() {
        score -= 40 * empty.len() as i32;
        notes.push(format!("empty required fields: {}", empty.join(", ")));
    }

    let trimmed = text.trim_end();
    if trimmed.ends_with("...") || trimmed.ends_with(',') || trimmed.ends_with("and") {
        score -= 30;
        notes.push("content appears truncated".to_string());
    }

    DimensionScore {
        dimension: "completeness".to_string(),
        score: score.max(0) as u8,
        weight,
        note: (!notes.is_empty()).then(|| notes.join("; ")),
    }
}

fn significant_words(text: &str) -> Vec<String> {
    const STOP_WORDS: &[&str] = &[
        "the", "a", "an", "and", "or", "but", "to", "of", "in", "on", "for", "with", "is", "are",
        "was", "be", "it", "that", "this", "my", "me", "you", "i", "please", "can",
    ];
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_weights_sum_to_one_hundred() {
        assert_eq!(ScoreWeights::default().total(), 100);
    }

    #[test]
    fn relevant_complete_content_scores_high() {
        let breakdown = score_content(
            "Hi Sam, confirming our project review meeting on Thursday at 2pm.",
            "schedule a project review meeting with Sam on Thursday",
            &[("body".to_string(), "Hi Sam, confirming".to_string())],
            &ScoreWeights::default(),
        );
        assert!(breakdown.total >= 70, "got {}", breakdown.total);
    }

    #[test]
    fn irrelevant_content_scores_low_on_relevance() {
        let breakdown = score_content(
            "Completely unrelated announcement about gardening supplies.",
            "schedule a dentist appointment for tuesday morning",
            &[],
            &ScoreWeights::default(),
        );
        let relevance = breakdown
            .dimensions
            .iter()
            .find(|d| d.dimension == "relevance")
            .expect("relevance dimension");
        assert!(relevance.score < 50);
    }

    #[test]
    fn empty_content_scores_zero_structure() {
        let breakdown = score_content("", "anything", &[], &ScoreWeights::default());
        let structure = breakdown
            .dimensions
            .iter()
            .find(|d| d.dimension == "structure")
            .expect("structure dimension");
        assert_eq!(structure.score, 0);
    }

    #[test]
    fn shouting_penalized_on_tone() {
        let breakdown = score_content(
            "URGENT MEETING NOW!!! COME IMMEDIATELY!!!!",
            "meeting",
            &[],
            &ScoreWeights::default(),
        );
        let tone = breakdown
            .dimensions
            .iter()
            .find(|d| d.dimension == "tone")
            .expect("tone dimension");
        assert!(tone.score < 50);
    }

    #[test]
    fn truncated_content_penalized_on_completeness() {
        let breakdown = score_content(
            "The report covers the first quarter and...",
            "report",
            &[],
            &ScoreWeights::default(),
        );
        let completeness = breakdown
            .dimensions
            .iter()
            .find(|d| d.dimension == "completeness")
            .expect("completeness dimension");
        assert!(completeness.score < 100);
        assert!(completeness.note.as_deref().unwrap_or("").contains("truncated"));
    }

    #[test]
    fn total_is_weighted_average() {
        let breakdown = score_content(
            "Hi Sam, confirming our project review meeting on Thursday.",
            "project review meeting Thursday Sam",
            &[],
            &ScoreWeights::default(),
        );
        let manual: u32 = breakdown
            .dimensions
            .iter()
            .map(|d| u32::from(d.score) * u32::from(d.weight))
            .sum::<u32>()
            / 100;
        assert_eq!(u32::from(breakdown.total), manual);
    }
}
