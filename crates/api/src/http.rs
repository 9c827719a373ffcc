//! HTTP adapter for the Exam API: JSON over `reqwest` with bearer-token auth.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::sync::{PoisonError, RwLock};

use exam_core::model::{
    ActiveStudent, CompletedExam, Credentials, Exam, ExamDraft, ExamId, ExamSummary,
    MonitorSnapshot, NewUser, Question, QuestionId, Role, SubmissionPayload, User,
};

use crate::contract::{
    ALREADY_COMPLETED_MESSAGE, AdminApi, ApiError, AuthApi, AuthSession, ExamApi, MonitoringApi,
    SubmissionReceipt,
};

#[derive(Clone, Debug)]
pub struct HttpConfig {
    pub base_url: String,
}

impl HttpConfig {
    /// Read the backend location from `EXAM_API_BASE_URL`, defaulting to a
    /// local development server.
    #[must_use]
    pub fn from_env() -> Self {
        let base_url = env::var("EXAM_API_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:5000/api".into());
        Self { base_url }
    }
}

/// Exam API client. Cheap to share behind an `Arc`; `login` installs the
/// bearer token used by every later request.
pub struct HttpApi {
    client: Client,
    base_url: String,
    token: RwLock<Option<String>>,
}

impl HttpApi {
    #[must_use]
    pub fn new(config: HttpConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            token: RwLock::new(None),
        }
    }

    /// Install a token obtained elsewhere (for example from a saved session).
    pub fn set_token(&self, token: impl Into<String>) {
        *self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(token.into());
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.get(self.url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.post(self.url(path)))
    }

    fn put(&self, path: &str) -> RequestBuilder {
        self.authorized(self.client.put(self.url(path)))
    }

    async fn expect_success(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let message = response
            .json::<ErrorBody>()
            .await
            .map(|body| body.message)
            .unwrap_or_default();
        Err(classify(status, message))
    }
}

/// Map a non-success response to the error taxonomy. The already-completed
/// case is recognized by the backend's exact 403 message.
fn classify(status: StatusCode, message: String) -> ApiError {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::FORBIDDEN if message == ALREADY_COMPLETED_MESSAGE => {
            ApiError::AlreadyCompleted
        }
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl AuthApi for HttpApi {
    async fn login(&self, credentials: &Credentials) -> Result<AuthSession, ApiError> {
        let response = self
            .post("/auth/login")
            .json(credentials)
            .send()
            .await?;
        let body: AuthResponse = Self::expect_success(response).await?.json().await?;
        self.set_token(body.token.clone());
        Ok(AuthSession {
            token: body.token,
            user: body.user.into(),
        })
    }

    async fn register(&self, new_user: &NewUser) -> Result<(), ApiError> {
        let response = self
            .post("/auth/register")
            .json(new_user)
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn verify(&self) -> Result<User, ApiError> {
        let response = self.get("/auth/verify").send().await?;
        let body: VerifyResponse = Self::expect_success(response).await?.json().await?;
        Ok(body.user.into())
    }

    fn logout(&self) {
        *self
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

#[async_trait]
impl ExamApi for HttpApi {
    async fn available_exams(&self) -> Result<Vec<ExamSummary>, ApiError> {
        let response = self.get("/exams/available").send().await?;
        let body: Vec<ExamSummaryDto> = Self::expect_success(response).await?.json().await?;
        Ok(body.into_iter().map(Into::into).collect())
    }

    async fn completed_exams(&self) -> Result<Vec<CompletedExam>, ApiError> {
        let response = self.get("/exams/completed").send().await?;
        let body: Vec<CompletedExamDto> = Self::expect_success(response).await?.json().await?;
        Ok(body.into_iter().map(Into::into).collect())
    }

    async fn fetch_exam(&self, id: &ExamId) -> Result<Exam, ApiError> {
        let response = self.get(&format!("/exams/{id}")).send().await?;
        let body: ExamDto = Self::expect_success(response).await?.json().await?;
        Ok(body.into())
    }

    async fn fetch_questions(&self, id: &ExamId) -> Result<Vec<Question>, ApiError> {
        let response = self.get(&format!("/exams/{id}/questions")).send().await?;
        let body: Vec<QuestionDto> = Self::expect_success(response).await?.json().await?;
        Ok(body.into_iter().map(Into::into).collect())
    }

    async fn save_answer(
        &self,
        id: &ExamId,
        question_id: &QuestionId,
        answer: usize,
    ) -> Result<(), ApiError> {
        let response = self
            .post(&format!("/exams/{id}/answer"))
            .json(&AnswerRequest {
                question_id: question_id.as_str().to_owned(),
                answer,
            })
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn submit(
        &self,
        id: &ExamId,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, ApiError> {
        let response = self
            .post(&format!("/exams/{id}/submit"))
            .json(&SubmitRequest::from(payload))
            .send()
            .await?;
        let body: SubmitResponse = Self::expect_success(response).await?.json().await?;
        Ok(SubmissionReceipt { score: body.score })
    }
}

#[async_trait]
impl MonitoringApi for HttpApi {
    async fn start(&self, exam_id: &ExamId) -> Result<(), ApiError> {
        let response = self
            .post("/monitoring/start")
            .json(&MonitoringRef {
                exam_id: exam_id.as_str().to_owned(),
            })
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn update(&self, exam_id: &ExamId, snapshot: MonitorSnapshot) -> Result<(), ApiError> {
        let response = self
            .post("/monitoring/update")
            .json(&MonitorUpdateRequest {
                exam_id: exam_id.as_str().to_owned(),
                time_left: snapshot.time_left_seconds,
                warnings: snapshot.warning_count,
                current_question: u32::try_from(snapshot.current_question).unwrap_or(u32::MAX),
            })
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn warning(&self, exam_id: &ExamId, message: &str) -> Result<(), ApiError> {
        let response = self
            .post("/monitoring/warning")
            .json(&WarningRequest {
                exam_id: exam_id.as_str().to_owned(),
                message: message.to_owned(),
            })
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn end(&self, exam_id: &ExamId) -> Result<(), ApiError> {
        let response = self
            .post("/monitoring/end")
            .json(&MonitoringRef {
                exam_id: exam_id.as_str().to_owned(),
            })
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn active_students(&self, exam_id: &ExamId) -> Result<Vec<ActiveStudent>, ApiError> {
        let response = self.get(&format!("/monitoring/{exam_id}")).send().await?;
        let body: Vec<ActiveStudentDto> = Self::expect_success(response).await?.json().await?;
        Ok(body.into_iter().map(Into::into).collect())
    }
}

#[async_trait]
impl AdminApi for HttpApi {
    async fn list_exams(&self) -> Result<Vec<Exam>, ApiError> {
        let response = self.get("/exams").send().await?;
        let body: Vec<ExamDto> = Self::expect_success(response).await?.json().await?;
        Ok(body.into_iter().map(Into::into).collect())
    }

    async fn create_exam(&self, draft: &ExamDraft) -> Result<ExamId, ApiError> {
        let response = self
            .post("/exams")
            .json(&CreateExamRequest::from(draft))
            .send()
            .await?;
        let body: CreatedExamResponse = Self::expect_success(response).await?.json().await?;
        Ok(ExamId::new(body.id))
    }

    async fn set_exam_active(&self, id: &ExamId, active: bool) -> Result<(), ApiError> {
        let response = self
            .put(&format!("/exams/{id}"))
            .json(&SetActiveRequest { active })
            .send()
            .await?;
        Self::expect_success(response).await?;
        Ok(())
    }
}

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//
// The backend speaks camelCase and hands out Mongo-style `_id` fields; the
// aliases keep both spellings readable.

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    user: UserDto,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    user: UserDto,
}

#[derive(Debug, Deserialize)]
struct UserDto {
    #[serde(alias = "_id")]
    id: String,
    name: String,
    email: String,
    role: Role,
}

impl From<UserDto> for User {
    fn from(dto: UserDto) -> Self {
        Self {
            id: dto.id,
            name: dto.name,
            email: dto.email,
            role: dto.role,
        }
    }
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ExamDto {
    #[serde(alias = "_id")]
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    /// Minutes.
    duration: u32,
    #[serde(default = "default_active")]
    active: bool,
}

impl From<ExamDto> for Exam {
    fn from(dto: ExamDto) -> Self {
        Self {
            id: ExamId::new(dto.id),
            name: dto.name,
            description: dto.description,
            duration_minutes: dto.duration,
            active: dto.active,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExamSummaryDto {
    #[serde(alias = "_id")]
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    duration: u32,
    question_count: u32,
}

impl From<ExamSummaryDto> for ExamSummary {
    fn from(dto: ExamSummaryDto) -> Self {
        Self {
            id: ExamId::new(dto.id),
            name: dto.name,
            description: dto.description,
            duration_minutes: dto.duration,
            question_count: dto.question_count,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletedExamDto {
    #[serde(alias = "_id")]
    exam_id: String,
    exam_name: String,
    score: f64,
    completed_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    forced_submission: bool,
}

impl From<CompletedExamDto> for CompletedExam {
    fn from(dto: CompletedExamDto) -> Self {
        Self {
            exam_id: ExamId::new(dto.exam_id),
            exam_name: dto.exam_name,
            score: dto.score,
            completed_at: dto.completed_at,
            forced_submission: dto.forced_submission,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuestionDto {
    #[serde(alias = "_id")]
    id: String,
    text: String,
    options: Vec<String>,
}

impl From<QuestionDto> for Question {
    fn from(dto: QuestionDto) -> Self {
        Self {
            id: QuestionId::new(dto.id),
            text: dto.text,
            options: dto.options,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    question_id: String,
    answer: usize,
}

#[derive(Debug, Serialize)]
struct SubmitRequest {
    answers: HashMap<String, usize>,
    forced: bool,
    warnings: u32,
}

impl From<&SubmissionPayload> for SubmitRequest {
    fn from(payload: &SubmissionPayload) -> Self {
        Self {
            answers: payload
                .answers
                .iter()
                .map(|(question_id, answer)| (question_id.as_str().to_owned(), *answer))
                .collect(),
            forced: payload.forced,
            warnings: payload.warnings,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    score: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MonitoringRef {
    exam_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MonitorUpdateRequest {
    exam_id: String,
    time_left: u32,
    warnings: u32,
    current_question: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WarningRequest {
    exam_id: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct SetActiveRequest {
    active: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveStudentDto {
    student_name: String,
    time_left: u32,
    warnings: u32,
    current_question: u32,
}

impl From<ActiveStudentDto> for ActiveStudent {
    fn from(dto: ActiveStudentDto) -> Self {
        Self {
            student_name: dto.student_name,
            time_left_seconds: dto.time_left,
            warning_count: dto.warnings,
            current_question: dto.current_question,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QuestionDraftDto {
    text: String,
    options: Vec<String>,
    correct_answer: usize,
}

#[derive(Debug, Serialize)]
struct CreateExamRequest {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    /// Minutes.
    duration: u32,
    questions: Vec<QuestionDraftDto>,
}

impl From<&ExamDraft> for CreateExamRequest {
    fn from(draft: &ExamDraft) -> Self {
        Self {
            name: draft.name.clone(),
            description: draft.description.clone(),
            duration: draft.duration_minutes,
            questions: draft
                .questions
                .iter()
                .map(|q| QuestionDraftDto {
                    text: q.text.clone(),
                    options: q.options.clone(),
                    correct_answer: q.correct_answer,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedExamResponse {
    #[serde(alias = "_id")]
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_with_the_known_message_is_already_completed() {
        let err = classify(
            StatusCode::FORBIDDEN,
            ALREADY_COMPLETED_MESSAGE.to_owned(),
        );
        assert!(matches!(err, ApiError::AlreadyCompleted));
    }

    #[test]
    fn other_forbidden_messages_stay_status_errors() {
        let err = classify(StatusCode::FORBIDDEN, "exam is not active".to_owned());
        assert!(matches!(err, ApiError::Status { status: 403, .. }));
    }

    #[test]
    fn unauthorized_and_not_found_are_distinguished() {
        assert!(matches!(
            classify(StatusCode::UNAUTHORIZED, String::new()),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            classify(StatusCode::NOT_FOUND, String::new()),
            ApiError::NotFound
        ));
    }

    #[test]
    fn monitor_update_uses_camel_case_fields() {
        let body = serde_json::to_value(MonitorUpdateRequest {
            exam_id: "exam-1".into(),
            time_left: 120,
            warnings: 2,
            current_question: 4,
        })
        .unwrap();
        assert_eq!(body["examId"], "exam-1");
        assert_eq!(body["timeLeft"], 120);
        assert_eq!(body["warnings"], 2);
        assert_eq!(body["currentQuestion"], 4);
    }

    #[test]
    fn submit_request_flattens_answer_map() {
        let payload = SubmissionPayload {
            answers: HashMap::from([(QuestionId::new("q1"), 2)]),
            forced: true,
            warnings: 3,
        };
        let body = serde_json::to_value(SubmitRequest::from(&payload)).unwrap();
        assert_eq!(body["answers"]["q1"], 2);
        assert_eq!(body["forced"], true);
        assert_eq!(body["warnings"], 3);
    }

    #[test]
    fn exam_dto_accepts_mongo_style_ids() {
        let dto: ExamDto =
            serde_json::from_str(r#"{"_id":"abc","name":"Quiz","duration":15}"#).unwrap();
        let exam = Exam::from(dto);
        assert_eq!(exam.id, ExamId::new("abc"));
        assert_eq!(exam.duration_minutes, 15);
        assert!(exam.active);
    }

    #[test]
    fn question_dto_accepts_plain_ids() {
        let dto: QuestionDto =
            serde_json::from_str(r#"{"id":"q9","text":"?","options":["a","b"]}"#).unwrap();
        assert_eq!(Question::from(dto).id, QuestionId::new("q9"));
    }
}
