//! Structured clarifying questions and their in-progress answers

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// One selectable option of a structured question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    /// Display text (short)
    pub label: String,
    /// Explanation of what this option means
    pub description: String,
}

/// A structured clarifying question posed to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// The full question text
    pub prompt: String,
    /// Short label displayed as a chip/tag
    pub header: String,
    /// Whether multiple options may be selected at once
    #[serde(default)]
    pub multi_select: bool,
    pub options: Vec<QuestionOption>,
}

/// The in-progress answer to one question: selected option ids and an
/// optional free-text "other" value, held independently.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub options: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
}

impl Answer {
    /// Whether nothing has been selected or written yet.
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
            && self
                .custom_text
                .as_deref()
                .is_none_or(|t| t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_empty_states() {
        assert!(Answer::default().is_empty());

        let blank_text = Answer {
            options: BTreeSet::new(),
            custom_text: Some("   ".into()),
        };
        assert!(blank_text.is_empty());

        let selected = Answer {
            options: BTreeSet::from(["opt1".to_string()]),
            custom_text: None,
        };
        assert!(!selected.is_empty());

        let written = Answer {
            options: BTreeSet::new(),
            custom_text: Some("other reason".into()),
        };
        assert!(!written.is_empty());
    }
}
