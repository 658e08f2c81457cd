//! Quiz question record and its validation rules

use crate::error::{QuizError, Result};
use serde::{Deserialize, Serialize};

/// A single quiz question.
///
/// `question` and `answer` are guaranteed non-empty after trimming;
/// construction fails otherwise. The same rule applies when a record is
/// deserialized from the store, so a corrupt stored record never becomes a
/// live question. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "QuestionRecord")]
pub struct QuizQuestion {
    pub question: String,
    pub answer: String,
    pub comment: String,
    pub source: String,
    pub author: String,
}

/// Raw record shape as it appears in storage, before validation.
#[derive(Debug, Deserialize)]
struct QuestionRecord {
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    source: String,
    #[serde(default)]
    author: String,
}

impl TryFrom<QuestionRecord> for QuizQuestion {
    type Error = QuizError;

    fn try_from(record: QuestionRecord) -> Result<Self> {
        QuizQuestion::new(
            record.question,
            record.answer,
            record.comment,
            record.source,
            record.author,
        )
    }
}

impl QuizQuestion {
    /// Create a validated question.
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        comment: impl Into<String>,
        source: impl Into<String>,
        author: impl Into<String>,
    ) -> Result<Self> {
        let question = question.into();
        let answer = answer.into();

        if question.trim().is_empty() {
            return Err(QuizError::Validation(
                "Question text is not presented.".to_string(),
            ));
        }
        if answer.trim().is_empty() {
            return Err(QuizError::Validation(
                "Answer text is not presented.".to_string(),
            ));
        }

        Ok(Self {
            question,
            answer,
            comment: comment.into(),
            source: source.into(),
            author: author.into(),
        })
    }

    /// Compare a user's reply against the stored answer.
    ///
    /// Both sides are case-folded and stripped of surrounding whitespace.
    /// Exact equality only; no fuzzy matching, no partial credit.
    pub fn matches_answer(&self, text: &str) -> bool {
        self.answer.trim().to_lowercase() == text.trim().to_lowercase()
    }
}
