use std::sync::Arc;

use exam_api::ExamApi;
use exam_core::model::{CompletedExam, ExamSummary};

use crate::error::CatalogError;

/// Student dashboard queries: what can still be taken, what is done.
pub struct CatalogService {
    exams: Arc<dyn ExamApi>,
}

impl CatalogService {
    #[must_use]
    pub fn new(exams: Arc<dyn ExamApi>) -> Self {
        Self { exams }
    }

    /// Exams the student may still take.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on any backend failure.
    pub async fn available_exams(&self) -> Result<Vec<ExamSummary>, CatalogError> {
        Ok(self.exams.available_exams().await?)
    }

    /// Finished exams with scores, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` on any backend failure.
    pub async fn completed_exams(&self) -> Result<Vec<CompletedExam>, CatalogError> {
        Ok(self.exams.completed_exams().await?)
    }
}
