use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::QuestionId;

/// A multiple-choice question as fetched from the backend.
///
/// Immutable once fetched; the session owns its questions for the attempt's
/// lifetime. Answers refer to options by index into `options`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<String>,
}

/// Validation failures for exam drafts authored by an admin.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DraftError {
    #[error("exam name is empty")]
    EmptyName,

    #[error("exam duration must be at least one minute")]
    ZeroDuration,

    #[error("exam has no questions")]
    NoQuestions,

    #[error("question {index} has empty text")]
    EmptyQuestionText { index: usize },

    #[error("question {index} needs at least two options, got {got}")]
    TooFewOptions { index: usize, got: usize },

    #[error("question {index} option {option} is empty")]
    EmptyOption { index: usize, option: usize },

    #[error("question {index} marks option {correct} correct but only has {got} options")]
    CorrectOutOfRange {
        index: usize,
        correct: usize,
        got: usize,
    },
}

/// A question being authored, including the correct answer.
///
/// The correct answer never leaves the admin side; fetched [`Question`]s
/// deliberately omit it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionDraft {
    pub text: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
}

/// An exam being authored by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamDraft {
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: u32,
    pub questions: Vec<QuestionDraft>,
}

impl ExamDraft {
    /// Check the draft is submittable.
    ///
    /// # Errors
    ///
    /// Returns the first `DraftError` found, in document order.
    pub fn validate(&self) -> Result<(), DraftError> {
        if self.name.trim().is_empty() {
            return Err(DraftError::EmptyName);
        }
        if self.duration_minutes == 0 {
            return Err(DraftError::ZeroDuration);
        }
        if self.questions.is_empty() {
            return Err(DraftError::NoQuestions);
        }
        for (index, question) in self.questions.iter().enumerate() {
            if question.text.trim().is_empty() {
                return Err(DraftError::EmptyQuestionText { index });
            }
            if question.options.len() < 2 {
                return Err(DraftError::TooFewOptions {
                    index,
                    got: question.options.len(),
                });
            }
            for (option, text) in question.options.iter().enumerate() {
                if text.trim().is_empty() {
                    return Err(DraftError::EmptyOption { index, option });
                }
            }
            if question.correct_answer >= question.options.len() {
                return Err(DraftError::CorrectOutOfRange {
                    index,
                    correct: question.correct_answer,
                    got: question.options.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ExamDraft {
        ExamDraft {
            name: "Midterm".into(),
            description: None,
            duration_minutes: 30,
            questions: vec![QuestionDraft {
                text: "2 + 2 = ?".into(),
                options: vec!["3".into(), "4".into()],
                correct_answer: 1,
            }],
        }
    }

    #[test]
    fn valid_draft_passes() {
        assert_eq!(draft().validate(), Ok(()));
    }

    #[test]
    fn blank_name_is_rejected() {
        let mut d = draft();
        d.name = "   ".into();
        assert_eq!(d.validate(), Err(DraftError::EmptyName));
    }

    #[test]
    fn correct_answer_must_point_at_an_option() {
        let mut d = draft();
        d.questions[0].correct_answer = 2;
        assert_eq!(
            d.validate(),
            Err(DraftError::CorrectOutOfRange {
                index: 0,
                correct: 2,
                got: 2
            })
        );
    }

    #[test]
    fn single_option_question_is_rejected() {
        let mut d = draft();
        d.questions[0].options.truncate(1);
        assert_eq!(
            d.validate(),
            Err(DraftError::TooFewOptions { index: 0, got: 1 })
        );
    }
}
