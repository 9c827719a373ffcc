mod exam;
mod ids;
mod monitoring;
mod question;
mod session;
mod user;

pub use exam::{CompletedExam, Exam, ExamSummary};
pub use ids::{ExamId, QuestionId};
pub use monitoring::{ActiveStudent, WARNING_LIMIT, WarningEvent};
pub use question::{DraftError, ExamDraft, Question, QuestionDraft};
pub use session::{
    ExamSession, MonitorSnapshot, SessionStateError, SessionStatus, SubmissionPayload, TickOutcome,
    WarningOutcome,
};
pub use user::{Credentials, NewUser, Role, User};
