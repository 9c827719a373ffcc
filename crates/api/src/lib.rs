#![forbid(unsafe_code)]

pub mod contract;
pub mod fake;
pub mod http;

pub use contract::{
    ALREADY_COMPLETED_MESSAGE, AdminApi, Api, ApiError, AuthApi, AuthSession, ExamApi,
    MonitoringApi, SubmissionReceipt,
};
pub use fake::InMemoryApi;
pub use http::{HttpApi, HttpConfig};
