#![forbid(unsafe_code)]

pub mod app_services;
pub mod auth_service;
pub mod catalog_service;
pub mod error;
pub mod monitoring;
pub mod proctor_service;
pub mod session;

pub use exam_core::Clock;

pub use app_services::AppServices;
pub use auth_service::AuthService;
pub use catalog_service::CatalogService;
pub use error::{AuthError, CatalogError, ProctorError, SessionError};
pub use monitoring::ActivityKind;
pub use proctor_service::ProctorService;
pub use session::{ExamSessionRuntime, SessionEvent};
