//! In-memory Exam API for tests and prototyping.
//!
//! Besides implementing the contracts, the fake records every submission,
//! heartbeat, warning, and saved answer so tests can assert call counts and
//! payloads, and it can be told to fail the advisory paths.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use exam_core::Clock;
use exam_core::model::{
    ActiveStudent, CompletedExam, Credentials, Exam, ExamDraft, ExamId, ExamSummary,
    MonitorSnapshot, NewUser, Question, QuestionId, Role, SubmissionPayload, User,
};

use crate::contract::{
    AdminApi, ApiError, AuthApi, AuthSession, ExamApi, MonitoringApi, SubmissionReceipt,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unavailable(what: &str) -> ApiError {
    ApiError::Status {
        status: 503,
        message: format!("{what} unavailable"),
    }
}

struct StoredExam {
    exam: Exam,
    questions: Vec<Question>,
    answer_key: HashMap<QuestionId, usize>,
}

/// Scriptable in-memory backend.
#[derive(Default)]
pub struct InMemoryApi {
    clock: Mutex<Clock>,
    users: Mutex<Vec<NewUser>>,
    current_user: Mutex<Option<User>>,
    exams: Mutex<Vec<StoredExam>>,
    completed: Mutex<HashMap<ExamId, CompletedExam>>,
    next_exam_id: AtomicU64,

    monitoring_started: Mutex<Vec<ExamId>>,
    monitoring_ended: Mutex<Vec<ExamId>>,
    heartbeats: Mutex<Vec<(ExamId, MonitorSnapshot)>>,
    warnings: Mutex<Vec<(ExamId, String)>>,
    saved_answers: Mutex<Vec<(ExamId, QuestionId, usize)>>,
    submissions: Mutex<Vec<(ExamId, SubmissionPayload)>>,

    fail_monitoring: AtomicBool,
    fail_save_answer: AtomicBool,
    fail_submit: AtomicBool,
}

impl InMemoryApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_clock(self, clock: Clock) -> Self {
        *lock(&self.clock) = clock;
        self
    }

    // ─── Seeding ───────────────────────────────────────────────────────────

    pub fn seed_exam(
        &self,
        exam: Exam,
        questions: Vec<Question>,
        answer_key: HashMap<QuestionId, usize>,
    ) {
        lock(&self.exams).push(StoredExam {
            exam,
            questions,
            answer_key,
        });
    }

    /// Pretend the current student already finished this exam, so the next
    /// load fails with [`ApiError::AlreadyCompleted`].
    pub fn seed_completed(&self, completed: CompletedExam) {
        lock(&self.completed).insert(completed.exam_id.clone(), completed);
    }

    pub fn seed_user(&self, new_user: NewUser) {
        lock(&self.users).push(new_user);
    }

    // ─── Failure injection ─────────────────────────────────────────────────

    pub fn set_fail_monitoring(&self, fail: bool) {
        self.fail_monitoring.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_save_answer(&self, fail: bool) {
        self.fail_save_answer.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    // ─── Recorded calls ────────────────────────────────────────────────────

    #[must_use]
    pub fn submissions(&self) -> Vec<(ExamId, SubmissionPayload)> {
        lock(&self.submissions).clone()
    }

    #[must_use]
    pub fn heartbeats(&self) -> Vec<(ExamId, MonitorSnapshot)> {
        lock(&self.heartbeats).clone()
    }

    #[must_use]
    pub fn reported_warnings(&self) -> Vec<(ExamId, String)> {
        lock(&self.warnings).clone()
    }

    #[must_use]
    pub fn saved_answers(&self) -> Vec<(ExamId, QuestionId, usize)> {
        lock(&self.saved_answers).clone()
    }

    #[must_use]
    pub fn monitoring_started(&self) -> Vec<ExamId> {
        lock(&self.monitoring_started).clone()
    }

    #[must_use]
    pub fn monitoring_ended(&self) -> Vec<ExamId> {
        lock(&self.monitoring_ended).clone()
    }

    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        lock(&self.clock).now()
    }

    fn guard_not_completed(&self, id: &ExamId) -> Result<(), ApiError> {
        if lock(&self.completed).contains_key(id) {
            return Err(ApiError::AlreadyCompleted);
        }
        Ok(())
    }
}

#[async_trait]
impl AuthApi for InMemoryApi {
    async fn login(&self, credentials: &Credentials) -> Result<AuthSession, ApiError> {
        let users = lock(&self.users);
        let found = users
            .iter()
            .find(|u| u.email == credentials.email && u.password == credentials.password)
            .ok_or(ApiError::Unauthorized)?;
        let user = User {
            id: format!("user-{}", found.email),
            name: found.name.clone(),
            email: found.email.clone(),
            role: found.role,
        };
        *lock(&self.current_user) = Some(user.clone());
        Ok(AuthSession {
            token: format!("token-{}", found.email),
            user,
        })
    }

    async fn register(&self, new_user: &NewUser) -> Result<(), ApiError> {
        let mut users = lock(&self.users);
        if users.iter().any(|u| u.email == new_user.email) {
            return Err(ApiError::Status {
                status: 409,
                message: "email already registered".into(),
            });
        }
        users.push(new_user.clone());
        Ok(())
    }

    async fn verify(&self) -> Result<User, ApiError> {
        lock(&self.current_user).clone().ok_or(ApiError::Unauthorized)
    }

    fn logout(&self) {
        *lock(&self.current_user) = None;
    }
}

#[async_trait]
impl ExamApi for InMemoryApi {
    async fn available_exams(&self) -> Result<Vec<ExamSummary>, ApiError> {
        let completed = lock(&self.completed);
        Ok(lock(&self.exams)
            .iter()
            .filter(|stored| stored.exam.active && !completed.contains_key(&stored.exam.id))
            .map(|stored| ExamSummary {
                id: stored.exam.id.clone(),
                name: stored.exam.name.clone(),
                description: stored.exam.description.clone(),
                duration_minutes: stored.exam.duration_minutes,
                question_count: u32::try_from(stored.questions.len()).unwrap_or(u32::MAX),
            })
            .collect())
    }

    async fn completed_exams(&self) -> Result<Vec<CompletedExam>, ApiError> {
        let mut listed: Vec<_> = lock(&self.completed).values().cloned().collect();
        listed.sort_by(|a, b| a.completed_at.cmp(&b.completed_at));
        Ok(listed)
    }

    async fn fetch_exam(&self, id: &ExamId) -> Result<Exam, ApiError> {
        self.guard_not_completed(id)?;
        lock(&self.exams)
            .iter()
            .find(|stored| &stored.exam.id == id)
            .map(|stored| stored.exam.clone())
            .ok_or(ApiError::NotFound)
    }

    async fn fetch_questions(&self, id: &ExamId) -> Result<Vec<Question>, ApiError> {
        self.guard_not_completed(id)?;
        lock(&self.exams)
            .iter()
            .find(|stored| &stored.exam.id == id)
            .map(|stored| stored.questions.clone())
            .ok_or(ApiError::NotFound)
    }

    async fn save_answer(
        &self,
        id: &ExamId,
        question_id: &QuestionId,
        answer: usize,
    ) -> Result<(), ApiError> {
        if self.fail_save_answer.load(Ordering::SeqCst) {
            return Err(unavailable("answer persistence"));
        }
        lock(&self.saved_answers).push((id.clone(), question_id.clone(), answer));
        Ok(())
    }

    async fn submit(
        &self,
        id: &ExamId,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, ApiError> {
        self.guard_not_completed(id)?;
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(unavailable("submission"));
        }

        let (exam_name, score) = {
            let exams = lock(&self.exams);
            let stored = exams
                .iter()
                .find(|stored| &stored.exam.id == id)
                .ok_or(ApiError::NotFound)?;
            let correct = payload
                .answers
                .iter()
                .filter(|(question_id, answer)| {
                    stored.answer_key.get(*question_id) == Some(*answer)
                })
                .count();
            let total = stored.questions.len().max(1);
            #[allow(clippy::cast_precision_loss)]
            let score = (correct as f64 / total as f64) * 100.0;
            (stored.exam.name.clone(), score)
        };

        lock(&self.submissions).push((id.clone(), payload.clone()));
        lock(&self.completed).insert(
            id.clone(),
            CompletedExam {
                exam_id: id.clone(),
                exam_name,
                score,
                completed_at: self.now(),
                forced_submission: payload.forced,
            },
        );
        Ok(SubmissionReceipt { score })
    }
}

#[async_trait]
impl MonitoringApi for InMemoryApi {
    async fn start(&self, exam_id: &ExamId) -> Result<(), ApiError> {
        if self.fail_monitoring.load(Ordering::SeqCst) {
            return Err(unavailable("monitoring"));
        }
        lock(&self.monitoring_started).push(exam_id.clone());
        Ok(())
    }

    async fn update(&self, exam_id: &ExamId, snapshot: MonitorSnapshot) -> Result<(), ApiError> {
        if self.fail_monitoring.load(Ordering::SeqCst) {
            return Err(unavailable("monitoring"));
        }
        lock(&self.heartbeats).push((exam_id.clone(), snapshot));
        Ok(())
    }

    async fn warning(&self, exam_id: &ExamId, message: &str) -> Result<(), ApiError> {
        if self.fail_monitoring.load(Ordering::SeqCst) {
            return Err(unavailable("monitoring"));
        }
        lock(&self.warnings).push((exam_id.clone(), message.to_owned()));
        Ok(())
    }

    async fn end(&self, exam_id: &ExamId) -> Result<(), ApiError> {
        if self.fail_monitoring.load(Ordering::SeqCst) {
            return Err(unavailable("monitoring"));
        }
        lock(&self.monitoring_ended).push(exam_id.clone());
        Ok(())
    }

    async fn active_students(&self, exam_id: &ExamId) -> Result<Vec<ActiveStudent>, ApiError> {
        let student_name = lock(&self.current_user)
            .as_ref()
            .map_or_else(|| "Student".to_owned(), |user| user.name.clone());
        Ok(lock(&self.heartbeats)
            .iter()
            .rev()
            .find(|(id, _)| id == exam_id)
            .map(|(_, snapshot)| ActiveStudent {
                student_name,
                time_left_seconds: snapshot.time_left_seconds,
                warning_count: snapshot.warning_count,
                current_question: u32::try_from(snapshot.current_question).unwrap_or(u32::MAX),
            })
            .into_iter()
            .collect())
    }
}

#[async_trait]
impl AdminApi for InMemoryApi {
    async fn list_exams(&self) -> Result<Vec<Exam>, ApiError> {
        Ok(lock(&self.exams)
            .iter()
            .map(|stored| stored.exam.clone())
            .collect())
    }

    async fn create_exam(&self, draft: &ExamDraft) -> Result<ExamId, ApiError> {
        let n = self.next_exam_id.fetch_add(1, Ordering::SeqCst) + 1;
        let exam_id = ExamId::new(format!("exam-{n}"));
        let mut questions = Vec::with_capacity(draft.questions.len());
        let mut answer_key = HashMap::new();
        for (i, q) in draft.questions.iter().enumerate() {
            let question_id = QuestionId::new(format!("{exam_id}-q{i}"));
            answer_key.insert(question_id.clone(), q.correct_answer);
            questions.push(Question {
                id: question_id,
                text: q.text.clone(),
                options: q.options.clone(),
            });
        }
        self.seed_exam(
            Exam {
                id: exam_id.clone(),
                name: draft.name.clone(),
                description: draft.description.clone(),
                duration_minutes: draft.duration_minutes,
                active: true,
            },
            questions,
            answer_key,
        );
        Ok(exam_id)
    }

    async fn set_exam_active(&self, id: &ExamId, active: bool) -> Result<(), ApiError> {
        let mut exams = lock(&self.exams);
        let stored = exams
            .iter_mut()
            .find(|stored| &stored.exam.id == id)
            .ok_or(ApiError::NotFound)?;
        stored.exam.active = active;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exam_core::time::fixed_clock;

    fn seeded() -> InMemoryApi {
        let api = InMemoryApi::new().with_clock(fixed_clock());
        let q1 = QuestionId::new("q1");
        let q2 = QuestionId::new("q2");
        api.seed_exam(
            Exam {
                id: ExamId::new("exam-1"),
                name: "Sample".into(),
                description: None,
                duration_minutes: 10,
                active: true,
            },
            vec![
                Question {
                    id: q1.clone(),
                    text: "one".into(),
                    options: vec!["a".into(), "b".into()],
                },
                Question {
                    id: q2.clone(),
                    text: "two".into(),
                    options: vec!["a".into(), "b".into()],
                },
            ],
            HashMap::from([(q1, 0), (q2, 1)]),
        );
        api
    }

    #[tokio::test]
    async fn submit_scores_against_answer_key() {
        let api = seeded();
        let id = ExamId::new("exam-1");
        let payload = SubmissionPayload {
            answers: HashMap::from([(QuestionId::new("q1"), 0), (QuestionId::new("q2"), 0)]),
            forced: false,
            warnings: 0,
        };

        let receipt = api.submit(&id, &payload).await.unwrap();
        assert!((receipt.score - 50.0).abs() < f64::EPSILON);
        assert_eq!(api.submissions().len(), 1);
    }

    #[tokio::test]
    async fn second_load_after_submission_is_already_completed() {
        let api = seeded();
        let id = ExamId::new("exam-1");
        let payload = SubmissionPayload {
            answers: HashMap::new(),
            forced: true,
            warnings: 3,
        };
        api.submit(&id, &payload).await.unwrap();

        assert!(matches!(
            api.fetch_exam(&id).await.unwrap_err(),
            ApiError::AlreadyCompleted
        ));
        assert!(matches!(
            api.submit(&id, &payload).await.unwrap_err(),
            ApiError::AlreadyCompleted
        ));
        let completed = api.completed_exams().await.unwrap();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].forced_submission);
    }

    #[tokio::test]
    async fn completed_exams_drop_out_of_the_available_list() {
        let api = seeded();
        assert_eq!(api.available_exams().await.unwrap().len(), 1);
        let payload = SubmissionPayload {
            answers: HashMap::new(),
            forced: false,
            warnings: 0,
        };
        api.submit(&ExamId::new("exam-1"), &payload).await.unwrap();
        assert!(api.available_exams().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn login_requires_a_registered_user() {
        let api = InMemoryApi::new();
        api.seed_user(NewUser {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            password: "pw".into(),
            role: Role::Student,
        });

        let err = api
            .login(&Credentials {
                email: "ada@example.com".into(),
                password: "wrong".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));

        let session = api
            .login(&Credentials {
                email: "ada@example.com".into(),
                password: "pw".into(),
            })
            .await
            .unwrap();
        assert_eq!(session.user.name, "Ada");
        assert_eq!(api.verify().await.unwrap().email, "ada@example.com");

        api.logout();
        assert!(matches!(api.verify().await.unwrap_err(), ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn create_exam_assigns_ids_and_answer_key() {
        let api = InMemoryApi::new();
        let draft = ExamDraft {
            name: "Quiz".into(),
            description: Some("intro".into()),
            duration_minutes: 5,
            questions: vec![exam_core::model::QuestionDraft {
                text: "pick b".into(),
                options: vec!["a".into(), "b".into()],
                correct_answer: 1,
            }],
        };
        let id = api.create_exam(&draft).await.unwrap();

        let questions = api.fetch_questions(&id).await.unwrap();
        assert_eq!(questions.len(), 1);

        let payload = SubmissionPayload {
            answers: HashMap::from([(questions[0].id.clone(), 1)]),
            forced: false,
            warnings: 0,
        };
        let receipt = api.submit(&id, &payload).await.unwrap();
        assert!((receipt.score - 100.0).abs() < f64::EPSILON);
    }
}
