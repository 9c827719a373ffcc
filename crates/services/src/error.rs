//! Shared error types for the services crate.

use thiserror::Error;

use exam_api::ApiError;
use exam_core::model::{DraftError, SessionStateError};

/// Errors emitted by `AuthService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("not logged in")]
    NotLoggedIn,

    #[error(transparent)]
    Api(ApiError),
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unauthorized => AuthError::InvalidCredentials,
            other => AuthError::Api(other),
        }
    }
}

/// Errors emitted by `CatalogService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted by `ProctorService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProctorError {
    #[error(transparent)]
    Draft(#[from] DraftError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Errors emitted by the exam session runtime.
///
/// Only loading and the final submission surface errors; every other
/// network path is advisory and merely logged.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    /// The attempt was already finished. Terminal: show a completed state,
    /// never a retry.
    #[error("this exam was already completed")]
    AlreadyCompleted,

    /// The exam could not be loaded; the attempt never started.
    #[error("failed to load exam: {0}")]
    Load(#[source] ApiError),

    /// The submission could not be confirmed. The attempt stays completed
    /// locally; retrying could double-submit.
    #[error("failed to submit exam: {0}")]
    Submission(#[source] ApiError),

    #[error(transparent)]
    State(#[from] SessionStateError),
}

impl SessionError {
    /// Classify a failure from the initial exam/question fetch.
    #[must_use]
    pub fn from_load(err: ApiError) -> Self {
        match err {
            ApiError::AlreadyCompleted => SessionError::AlreadyCompleted,
            other => SessionError::Load(other),
        }
    }
}
