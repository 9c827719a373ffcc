use std::sync::Arc;

use exam_api::{AdminApi, MonitoringApi};
use exam_core::model::{ActiveStudent, Exam, ExamDraft, ExamId};

use crate::error::ProctorError;

/// Admin-side exam administration and live monitoring.
pub struct ProctorService {
    admin: Arc<dyn AdminApi>,
    monitoring: Arc<dyn MonitoringApi>,
}

impl ProctorService {
    #[must_use]
    pub fn new(admin: Arc<dyn AdminApi>, monitoring: Arc<dyn MonitoringApi>) -> Self {
        Self { admin, monitoring }
    }

    /// Every exam, active or not.
    ///
    /// # Errors
    ///
    /// Returns `ProctorError` on any backend failure.
    pub async fn list_exams(&self) -> Result<Vec<Exam>, ProctorError> {
        Ok(self.admin.list_exams().await?)
    }

    /// Validate a draft locally, then create the exam.
    ///
    /// # Errors
    ///
    /// Returns `ProctorError::Draft` for an invalid draft without touching
    /// the backend, or `ProctorError::Api` if creation fails.
    pub async fn create_exam(&self, draft: &ExamDraft) -> Result<ExamId, ProctorError> {
        draft.validate()?;
        Ok(self.admin.create_exam(draft).await?)
    }

    /// Open or close an exam for students.
    ///
    /// # Errors
    ///
    /// Returns `ProctorError` on any backend failure.
    pub async fn set_exam_active(&self, id: &ExamId, active: bool) -> Result<(), ProctorError> {
        Ok(self.admin.set_exam_active(id, active).await?)
    }

    /// Live view of students currently taking an exam. The dashboard polls
    /// this; scheduling the poll is the presentation layer's business.
    ///
    /// # Errors
    ///
    /// Returns `ProctorError` on any backend failure.
    pub async fn active_students(&self, id: &ExamId) -> Result<Vec<ActiveStudent>, ProctorError> {
        Ok(self.monitoring.active_students(id).await?)
    }
}
