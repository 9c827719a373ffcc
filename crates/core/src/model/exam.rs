use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ExamId;

/// Exam metadata as fetched from the backend.
///
/// Durations are authored in whole minutes; the session works in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exam {
    pub id: ExamId,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: u32,
    pub active: bool,
}

impl Exam {
    /// Attempt duration converted to seconds.
    #[must_use]
    pub fn duration_seconds(&self) -> u32 {
        self.duration_minutes.saturating_mul(60)
    }
}

/// Listing entry for an exam a student may still take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamSummary {
    pub id: ExamId,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: u32,
    pub question_count: u32,
}

/// Listing entry for an exam a student has already finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedExam {
    pub exam_id: ExamId,
    pub exam_name: String,
    pub score: f64,
    pub completed_at: DateTime<Utc>,
    pub forced_submission: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_converts_to_seconds() {
        let exam = Exam {
            id: ExamId::new("e1"),
            name: "Algebra".into(),
            description: None,
            duration_minutes: 45,
            active: true,
        };
        assert_eq!(exam.duration_seconds(), 2700);
    }
}
