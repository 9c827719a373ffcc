use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of warnings that forces an attempt to be submitted.
pub const WARNING_LIMIT: u32 = 3;

/// A recorded suspicious-activity event.
///
/// Warnings are append-only; the running count drives the escalation policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningEvent {
    pub message: String,
    pub at: DateTime<Utc>,
}

impl WarningEvent {
    #[must_use]
    pub fn new(message: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            message: message.into(),
            at,
        }
    }
}

/// One row of the proctor's live view of an exam in progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveStudent {
    pub student_name: String,
    pub time_left_seconds: u32,
    pub warning_count: u32,
    pub current_question: u32,
}
