use std::sync::Arc;

use tokio::sync::mpsc;

use exam_api::{Api, HttpConfig, InMemoryApi};
use exam_core::Clock;
use exam_core::model::ExamId;

use crate::auth_service::AuthService;
use crate::catalog_service::CatalogService;
use crate::error::SessionError;
use crate::proctor_service::ProctorService;
use crate::session::{ExamSessionRuntime, SessionEvent};

/// Assembles the client-facing services over one API backend.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    api: Api,
    auth: Arc<AuthService>,
    catalog: Arc<CatalogService>,
    proctor: Arc<ProctorService>,
}

impl AppServices {
    #[must_use]
    pub fn new(api: Api, clock: Clock) -> Self {
        let auth = Arc::new(AuthService::new(Arc::clone(&api.auth)));
        let catalog = Arc::new(CatalogService::new(Arc::clone(&api.exams)));
        let proctor = Arc::new(ProctorService::new(
            Arc::clone(&api.admin),
            Arc::clone(&api.monitoring),
        ));
        Self {
            clock,
            api,
            auth,
            catalog,
            proctor,
        }
    }

    /// Services backed by the HTTP Exam API.
    #[must_use]
    pub fn http(config: HttpConfig) -> Self {
        Self::new(Api::http(config), Clock::default())
    }

    /// Services backed by the in-memory fake, plus the fake itself for
    /// seeding and inspection.
    #[must_use]
    pub fn in_memory(clock: Clock) -> (Self, Arc<InMemoryApi>) {
        let (api, fake) = Api::in_memory();
        (Self::new(api, clock), fake)
    }

    #[must_use]
    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    #[must_use]
    pub fn proctor(&self) -> &ProctorService {
        &self.proctor
    }

    /// Begin a monitored attempt at the given exam.
    ///
    /// # Errors
    ///
    /// See [`ExamSessionRuntime::start`].
    pub async fn start_exam(
        &self,
        exam_id: ExamId,
    ) -> Result<(ExamSessionRuntime, mpsc::UnboundedReceiver<SessionEvent>), SessionError> {
        ExamSessionRuntime::start(
            Arc::clone(&self.api.exams),
            Arc::clone(&self.api.monitoring),
            self.clock,
            exam_id,
        )
        .await
    }
}
