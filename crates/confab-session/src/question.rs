//! Pending-question flow: collecting structured answers before one commit
//!
//! A short-lived auxiliary state machine: `Collecting -> Confirming ->
//! {Committed, Cancelled}`. Questions may be answered in any order; nothing
//! reaches the turn store until the facade commits the rendered answers as a
//! single user turn.

use std::collections::{HashMap, HashSet};

use confab_core::{Answer, Question};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Maximum number of questions in one flow.
const MAX_QUESTIONS: usize = 4;
/// Maximum header length, displayed as a chip/tag.
const MAX_HEADER_LEN: usize = 12;
/// Allowed option count per question.
const OPTION_RANGE: std::ops::RangeInclusive<usize> = 2..=4;

/// Phase of the pending-question flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionPhase {
    /// Answers are being selected
    Collecting,
    /// The summary is shown; waiting for submit or cancel
    Confirming,
}

/// Structural validation for a question set before a flow may start.
pub fn validate_questions(questions: &[Question]) -> Result<()> {
    if questions.is_empty() {
        return Err(Error::Question("at least one question is required".into()));
    }
    if questions.len() > MAX_QUESTIONS {
        return Err(Error::Question(format!(
            "at most {MAX_QUESTIONS} questions allowed"
        )));
    }

    let mut seen = HashSet::new();
    for q in questions {
        if q.prompt.trim().is_empty() {
            return Err(Error::Question(format!("question {}: prompt is empty", q.id)));
        }
        if q.header.trim().is_empty() || q.header.len() > MAX_HEADER_LEN {
            return Err(Error::Question(format!(
                "question {}: header must be 1-{MAX_HEADER_LEN} characters",
                q.id
            )));
        }
        if !seen.insert(q.id.clone()) {
            return Err(Error::Question(format!("duplicate question id: {}", q.id)));
        }
        if !OPTION_RANGE.contains(&q.options.len()) {
            return Err(Error::Question(format!(
                "question {}: {}-{} options required",
                q.id,
                OPTION_RANGE.start(),
                OPTION_RANGE.end()
            )));
        }
        let mut opt_seen = HashSet::new();
        for opt in &q.options {
            if opt.label.trim().is_empty() {
                return Err(Error::Question(format!(
                    "question {}: option {} has an empty label",
                    q.id, opt.id
                )));
            }
            if !opt_seen.insert(opt.id.clone()) {
                return Err(Error::Question(format!(
                    "question {}: duplicate option id: {}",
                    q.id, opt.id
                )));
            }
        }
    }
    Ok(())
}

/// The in-progress structured-question flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingQuestion {
    questions: Vec<Question>,
    answers: HashMap<String, Answer>,
    phase: QuestionPhase,
}

impl PendingQuestion {
    /// Start a flow over a validated question set.
    pub fn new(questions: Vec<Question>) -> Result<Self> {
        validate_questions(&questions)?;
        Ok(Self {
            questions,
            answers: HashMap::new(),
            phase: QuestionPhase::Collecting,
        })
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn phase(&self) -> QuestionPhase {
        self.phase
    }

    /// The current answer for a question, if any part of it has been given.
    pub fn answer(&self, question_id: &str) -> Option<&Answer> {
        self.answers.get(question_id)
    }

    /// Toggle an option selection. Single-select questions replace the
    /// current selection; multi-select questions toggle membership.
    pub fn toggle_option(&mut self, question_id: &str, option_id: &str) -> Result<()> {
        self.require_collecting()?;
        let question = self.find_question(question_id)?;
        if !question.options.iter().any(|o| o.id == option_id) {
            return Err(Error::Question(format!(
                "question {question_id} has no option {option_id}"
            )));
        }
        let multi = question.multi_select;

        let answer = self.answers.entry(question_id.to_string()).or_default();
        if answer.options.contains(option_id) {
            answer.options.remove(option_id);
        } else {
            if !multi {
                answer.options.clear();
            }
            answer.options.insert(option_id.to_string());
        }
        Ok(())
    }

    /// Set or clear the free-text "other" value for a question.
    pub fn set_custom_text(&mut self, question_id: &str, text: Option<String>) -> Result<()> {
        self.require_collecting()?;
        self.find_question(question_id)?;
        let answer = self.answers.entry(question_id.to_string()).or_default();
        answer.custom_text = text;
        Ok(())
    }

    /// Move to the confirmation step. Requires at least one answered
    /// question — confirming an empty answer set would commit an empty turn.
    pub fn begin_confirmation(&mut self) -> Result<()> {
        self.require_collecting()?;
        if !self.answers.values().any(|a| !a.is_empty()) {
            return Err(Error::Question("no answers to confirm".into()));
        }
        self.phase = QuestionPhase::Confirming;
        Ok(())
    }

    /// Return from confirmation to answer editing.
    pub fn reopen(&mut self) {
        self.phase = QuestionPhase::Collecting;
    }

    /// Serialize all answers into the user-turn content committed on submit.
    ///
    /// Deterministic: question order, then option-definition order, then the
    /// free-text value. Unanswered questions are omitted.
    pub fn render_content(&self) -> String {
        let mut out = String::new();
        for question in &self.questions {
            let Some(answer) = self.answers.get(&question.id) else {
                continue;
            };
            if answer.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&question.prompt);
            for option in &question.options {
                if answer.options.contains(&option.id) {
                    out.push_str("\n- ");
                    out.push_str(&option.label);
                }
            }
            if let Some(text) = answer.custom_text.as_deref() {
                let text = text.trim();
                if !text.is_empty() {
                    out.push_str("\n- Other: ");
                    out.push_str(text);
                }
            }
        }
        out
    }

    fn require_collecting(&self) -> Result<()> {
        if self.phase != QuestionPhase::Collecting {
            return Err(Error::Question(
                "answers cannot change while confirming".into(),
            ));
        }
        Ok(())
    }

    fn find_question(&self, question_id: &str) -> Result<&Question> {
        self.questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| Error::Question(format!("unknown question: {question_id}")))
    }
}
