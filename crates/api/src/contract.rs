use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use exam_core::model::{
    ActiveStudent, CompletedExam, Credentials, Exam, ExamDraft, ExamId, ExamSummary,
    MonitorSnapshot, NewUser, Question, QuestionId, SubmissionPayload, User,
};

/// Exact message the backend attaches to the 403 that marks a finished
/// attempt. Anything else on a 403 is an ordinary status error.
pub const ALREADY_COMPLETED_MESSAGE: &str = "You have already completed this exam";

/// Errors surfaced by Exam API adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Missing or rejected bearer token.
    #[error("unauthorized")]
    Unauthorized,

    /// The attempt was already finished. Terminal: callers must not retry.
    #[error("{ALREADY_COMPLETED_MESSAGE}")]
    AlreadyCompleted,

    #[error("not found")]
    NotFound,

    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Token plus profile returned by a successful login.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// Acknowledgement of a final submission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubmissionReceipt {
    pub score: f64,
}

/// Account endpoints.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a bearer token, installing it for later calls.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` for bad credentials.
    async fn login(&self, credentials: &Credentials) -> Result<AuthSession, ApiError>;

    /// Create an account. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` if the backend rejects the registration.
    async fn register(&self, new_user: &NewUser) -> Result<(), ApiError>;

    /// Re-validate the installed token.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Unauthorized` if no valid token is installed.
    async fn verify(&self) -> Result<User, ApiError>;

    /// Discard the installed token. Local only.
    fn logout(&self);
}

/// Exam catalog and attempt endpoints.
#[async_trait]
pub trait ExamApi: Send + Sync {
    /// Exams the student may still take.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure.
    async fn available_exams(&self) -> Result<Vec<ExamSummary>, ApiError>;

    /// Exams the student already finished, with scores.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure.
    async fn completed_exams(&self) -> Result<Vec<CompletedExam>, ApiError>;

    /// Exam metadata for one attempt.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::AlreadyCompleted` if this student finished the
    /// exam, `ApiError::NotFound` if it does not exist.
    async fn fetch_exam(&self, id: &ExamId) -> Result<Exam, ApiError>;

    /// Ordered question list for one attempt.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`ExamApi::fetch_exam`].
    async fn fetch_questions(&self, id: &ExamId) -> Result<Vec<Question>, ApiError>;

    /// Persist a single selected answer (advisory; the submission payload
    /// is authoritative).
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure.
    async fn save_answer(
        &self,
        id: &ExamId,
        question_id: &QuestionId,
        answer: usize,
    ) -> Result<(), ApiError>;

    /// Submit the attempt and receive the score.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::AlreadyCompleted` if a submission was already
    /// accepted for this attempt.
    async fn submit(
        &self,
        id: &ExamId,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, ApiError>;
}

/// Proctoring endpoints. All of these are advisory from the client's point
/// of view; the session never depends on their success.
#[async_trait]
pub trait MonitoringApi: Send + Sync {
    /// Announce that a monitored attempt started.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure.
    async fn start(&self, exam_id: &ExamId) -> Result<(), ApiError>;

    /// Periodic heartbeat with the attempt's live state.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure.
    async fn update(&self, exam_id: &ExamId, snapshot: MonitorSnapshot) -> Result<(), ApiError>;

    /// Report one suspicious-activity event.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure.
    async fn warning(&self, exam_id: &ExamId, message: &str) -> Result<(), ApiError>;

    /// Announce that the attempt ended without submission.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure.
    async fn end(&self, exam_id: &ExamId) -> Result<(), ApiError>;

    /// Live view of students currently taking an exam (admin).
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure.
    async fn active_students(&self, exam_id: &ExamId) -> Result<Vec<ActiveStudent>, ApiError>;
}

/// Exam administration endpoints.
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// Every exam, active or not.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure.
    async fn list_exams(&self) -> Result<Vec<Exam>, ApiError>;

    /// Create an exam from a validated draft.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure.
    async fn create_exam(&self, draft: &ExamDraft) -> Result<ExamId, ApiError>;

    /// Open or close an exam for students.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on any failure.
    async fn set_exam_active(&self, id: &ExamId, active: bool) -> Result<(), ApiError>;
}

/// Aggregates the API surfaces behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Api {
    pub auth: Arc<dyn AuthApi>,
    pub exams: Arc<dyn ExamApi>,
    pub monitoring: Arc<dyn MonitoringApi>,
    pub admin: Arc<dyn AdminApi>,
}

impl Api {
    /// In-memory backend for tests and prototyping. Also returns the fake
    /// itself so callers can seed exams and inspect recorded calls.
    #[must_use]
    pub fn in_memory() -> (Self, Arc<crate::fake::InMemoryApi>) {
        let fake = Arc::new(crate::fake::InMemoryApi::new());
        let api = Self {
            auth: Arc::clone(&fake) as Arc<dyn AuthApi>,
            exams: Arc::clone(&fake) as Arc<dyn ExamApi>,
            monitoring: Arc::clone(&fake) as Arc<dyn MonitoringApi>,
            admin: Arc::clone(&fake) as Arc<dyn AdminApi>,
        };
        (api, fake)
    }

    /// HTTP backend rooted at `config.base_url`.
    #[must_use]
    pub fn http(config: crate::http::HttpConfig) -> Self {
        let http = Arc::new(crate::http::HttpApi::new(config));
        Self {
            auth: Arc::clone(&http) as Arc<dyn AuthApi>,
            exams: Arc::clone(&http) as Arc<dyn ExamApi>,
            monitoring: Arc::clone(&http) as Arc<dyn MonitoringApi>,
            admin: http as Arc<dyn AdminApi>,
        }
    }
}
