use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use super::{Exam, ExamId, Question, QuestionId, WARNING_LIMIT, WarningEvent};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionStateError {
    #[error("attempt is already completed")]
    Completed,

    #[error("attempt failed and can no longer be mutated")]
    Errored,

    #[error("attempt has not started yet")]
    NotStarted,

    #[error("attempt has already started")]
    AlreadyStarted,

    #[error("unknown question: {0}")]
    UnknownQuestion(QuestionId),

    #[error("option {option} is out of range ({available} options)")]
    OptionOutOfRange { option: usize, available: usize },

    #[error("question index {index} is out of range ({total} questions)")]
    QuestionOutOfRange { index: usize, total: usize },
}

/// Lifecycle of an attempt. Transitions only move forward: `Loading` →
/// `InProgress` → `Completed`, with `Errored` reachable from the two
/// non-terminal states. `Completed` suppresses all further mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Loading,
    InProgress,
    Completed,
    Errored,
}

/// What a one-second countdown tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Time was decremented and the attempt continues.
    Ticked { seconds_left: u32 },
    /// Time just reached zero; the caller must submit with `forced = false`.
    Expired,
    /// The attempt is no longer in progress; nothing changed.
    Ignored,
}

/// What registering a suspicious-activity event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningOutcome {
    /// Warning recorded; the attempt continues.
    Recorded { count: u32 },
    /// The count just reached the limit; the caller must submit with
    /// `forced = true`. Returned exactly once per attempt.
    ThresholdReached { count: u32 },
    /// The attempt is no longer in progress; nothing changed.
    Ignored,
}

/// Snapshot reported by the periodic monitoring heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSnapshot {
    pub time_left_seconds: u32,
    pub warning_count: u32,
    pub current_question: usize,
}

/// Body of the final submission. Local answers are authoritative; the
/// per-answer saves made during the attempt are advisory.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionPayload {
    pub answers: HashMap<QuestionId, usize>,
    pub forced: bool,
    pub warnings: u32,
}

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One student's attempt at one exam, from load to submission.
///
/// This is a plain state machine: every mutation is a transition guarded by
/// the current [`SessionStatus`], so timer callbacks and user actions can be
/// applied in any interleaving. Escalation outcomes (`Expired`,
/// `ThresholdReached`) are each produced at most once per attempt; acting on
/// them is the caller's job.
pub struct ExamSession {
    exam_id: ExamId,
    exam: Option<Exam>,
    questions: Vec<Question>,
    started_at: Option<DateTime<Utc>>,
    time_left_seconds: u32,
    current_question: usize,
    answers: HashMap<QuestionId, usize>,
    warnings: Vec<WarningEvent>,
    status: SessionStatus,
    forced: Option<bool>,
    score: Option<f64>,
}

impl ExamSession {
    /// Create a session in `Loading` for the exam the student navigated to.
    #[must_use]
    pub fn new(exam_id: ExamId) -> Self {
        Self {
            exam_id,
            exam: None,
            questions: Vec::new(),
            started_at: None,
            time_left_seconds: 0,
            current_question: 0,
            answers: HashMap::new(),
            warnings: Vec::new(),
            status: SessionStatus::Loading,
            forced: None,
            score: None,
        }
    }

    /// Move to `InProgress` with the fetched exam and questions.
    ///
    /// `started_at` should come from the services layer clock.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::AlreadyStarted` unless the session is
    /// still `Loading`.
    pub fn begin(
        &mut self,
        exam: Exam,
        questions: Vec<Question>,
        started_at: DateTime<Utc>,
    ) -> Result<(), SessionStateError> {
        if self.status != SessionStatus::Loading {
            return Err(SessionStateError::AlreadyStarted);
        }
        self.time_left_seconds = exam.duration_seconds();
        self.exam = Some(exam);
        self.questions = questions;
        self.started_at = Some(started_at);
        self.status = SessionStatus::InProgress;
        Ok(())
    }

    /// Move to `Errored`. Load and setup failures land here.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::Completed` if the attempt already
    /// finished; a completed attempt stays completed.
    pub fn mark_errored(&mut self) -> Result<(), SessionStateError> {
        match self.status {
            SessionStatus::Completed => Err(SessionStateError::Completed),
            _ => {
                self.status = SessionStatus::Errored;
                Ok(())
            }
        }
    }

    fn ensure_in_progress(&self) -> Result<(), SessionStateError> {
        match self.status {
            SessionStatus::InProgress => Ok(()),
            SessionStatus::Loading => Err(SessionStateError::NotStarted),
            SessionStatus::Completed => Err(SessionStateError::Completed),
            SessionStatus::Errored => Err(SessionStateError::Errored),
        }
    }

    /// Apply one second of countdown.
    ///
    /// `Expired` is returned only on the transition to zero, so a caller
    /// that submits on `Expired` submits exactly once even if stray ticks
    /// keep arriving.
    pub fn tick(&mut self) -> TickOutcome {
        if self.status != SessionStatus::InProgress || self.time_left_seconds == 0 {
            return TickOutcome::Ignored;
        }
        self.time_left_seconds -= 1;
        if self.time_left_seconds == 0 {
            TickOutcome::Expired
        } else {
            TickOutcome::Ticked {
                seconds_left: self.time_left_seconds,
            }
        }
    }

    /// Register a suspicious-activity event.
    ///
    /// No-op once the attempt is out of `InProgress`, which prevents
    /// double-counting signals that race the forced submission.
    pub fn record_warning(&mut self, message: impl Into<String>, at: DateTime<Utc>) -> WarningOutcome {
        if self.status != SessionStatus::InProgress {
            return WarningOutcome::Ignored;
        }
        self.warnings.push(WarningEvent::new(message, at));
        let count = self.warning_count();
        if count == WARNING_LIMIT {
            WarningOutcome::ThresholdReached { count }
        } else {
            WarningOutcome::Recorded { count }
        }
    }

    /// Record the selected option for a question (optimistic; local state is
    /// authoritative for the final submission).
    ///
    /// # Errors
    ///
    /// Returns a status-guard error outside `InProgress`, or
    /// `UnknownQuestion`/`OptionOutOfRange` for a bad selection.
    pub fn select_answer(
        &mut self,
        question_id: &QuestionId,
        option: usize,
    ) -> Result<(), SessionStateError> {
        self.ensure_in_progress()?;
        let question = self
            .questions
            .iter()
            .find(|q| &q.id == question_id)
            .ok_or_else(|| SessionStateError::UnknownQuestion(question_id.clone()))?;
        if option >= question.options.len() {
            return Err(SessionStateError::OptionOutOfRange {
                option,
                available: question.options.len(),
            });
        }
        self.answers.insert(question_id.clone(), option);
        Ok(())
    }

    /// Jump to a question by index.
    ///
    /// # Errors
    ///
    /// Returns a status-guard error outside `InProgress`, or
    /// `QuestionOutOfRange`.
    pub fn goto_question(&mut self, index: usize) -> Result<(), SessionStateError> {
        self.ensure_in_progress()?;
        if index >= self.questions.len() {
            return Err(SessionStateError::QuestionOutOfRange {
                index,
                total: self.questions.len(),
            });
        }
        self.current_question = index;
        Ok(())
    }

    /// Advance to the next question, clamped at the last one.
    ///
    /// # Errors
    ///
    /// Returns a status-guard error outside `InProgress`.
    pub fn next_question(&mut self) -> Result<usize, SessionStateError> {
        self.ensure_in_progress()?;
        if self.current_question + 1 < self.questions.len() {
            self.current_question += 1;
        }
        Ok(self.current_question)
    }

    /// Go back to the previous question, clamped at the first one.
    ///
    /// # Errors
    ///
    /// Returns a status-guard error outside `InProgress`.
    pub fn previous_question(&mut self) -> Result<usize, SessionStateError> {
        self.ensure_in_progress()?;
        self.current_question = self.current_question.saturating_sub(1);
        Ok(self.current_question)
    }

    /// Single-shot transition to `Completed`, returning the submission body.
    ///
    /// The status flips before any network call is made, so concurrent
    /// triggers (timer expiry racing a third warning, a double-clicked
    /// submit) collapse to exactly one winner; the rest get `Completed`.
    ///
    /// # Errors
    ///
    /// Returns the status-guard error for anything but `InProgress`.
    pub fn begin_submission(&mut self, forced: bool) -> Result<SubmissionPayload, SessionStateError> {
        self.ensure_in_progress()?;
        self.status = SessionStatus::Completed;
        self.forced = Some(forced);
        Ok(SubmissionPayload {
            answers: self.answers.clone(),
            forced,
            warnings: self.warning_count(),
        })
    }

    /// Record the score returned by the backend after submission.
    ///
    /// # Errors
    ///
    /// Returns `SessionStateError::NotStarted` if no submission began.
    pub fn record_score(&mut self, score: f64) -> Result<(), SessionStateError> {
        if self.status != SessionStatus::Completed {
            return Err(SessionStateError::NotStarted);
        }
        self.score = Some(score);
        Ok(())
    }

    /// Heartbeat payload, or `None` once the attempt is no longer running.
    #[must_use]
    pub fn monitor_snapshot(&self) -> Option<MonitorSnapshot> {
        if self.status != SessionStatus::InProgress {
            return None;
        }
        Some(MonitorSnapshot {
            time_left_seconds: self.time_left_seconds,
            warning_count: self.warning_count(),
            current_question: self.current_question,
        })
    }

    // ─── Accessors ─────────────────────────────────────────────────────────

    #[must_use]
    pub fn exam_id(&self) -> &ExamId {
        &self.exam_id
    }

    #[must_use]
    pub fn exam(&self) -> Option<&Exam> {
        self.exam.as_ref()
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn current_question(&self) -> usize {
        self.current_question
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn time_left_seconds(&self) -> u32 {
        self.time_left_seconds
    }

    #[must_use]
    pub fn answers(&self) -> &HashMap<QuestionId, usize> {
        &self.answers
    }

    #[must_use]
    pub fn answer_for(&self, question_id: &QuestionId) -> Option<usize> {
        self.answers.get(question_id).copied()
    }

    #[must_use]
    pub fn warnings(&self) -> &[WarningEvent] {
        &self.warnings
    }

    #[must_use]
    pub fn warning_count(&self) -> u32 {
        u32::try_from(self.warnings.len()).unwrap_or(u32::MAX)
    }

    /// Whether the submission was system-forced. `None` before submission.
    #[must_use]
    pub fn forced(&self) -> Option<bool> {
        self.forced
    }

    #[must_use]
    pub fn score(&self) -> Option<f64> {
        self.score
    }
}

impl fmt::Debug for ExamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExamSession")
            .field("exam_id", &self.exam_id)
            .field("status", &self.status)
            .field("time_left_seconds", &self.time_left_seconds)
            .field("current_question", &self.current_question)
            .field("answers_len", &self.answers.len())
            .field("warnings", &self.warnings.len())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn exam(duration_minutes: u32) -> Exam {
        Exam {
            id: ExamId::new("exam-1"),
            name: "Sample".into(),
            description: None,
            duration_minutes,
            active: true,
        }
    }

    fn question(id: &str) -> Question {
        Question {
            id: QuestionId::new(id),
            text: format!("Question {id}"),
            options: vec!["a".into(), "b".into(), "c".into(), "d".into()],
        }
    }

    fn started(duration_minutes: u32) -> ExamSession {
        let mut session = ExamSession::new(ExamId::new("exam-1"));
        session
            .begin(
                exam(duration_minutes),
                vec![question("q1"), question("q2")],
                fixed_now(),
            )
            .unwrap();
        session
    }

    #[test]
    fn begin_sets_time_from_duration() {
        let session = started(1);
        assert_eq!(session.status(), SessionStatus::InProgress);
        assert_eq!(session.time_left_seconds(), 60);
        assert_eq!(session.started_at(), Some(fixed_now()));
    }

    #[test]
    fn begin_twice_is_rejected() {
        let mut session = started(1);
        let err = session
            .begin(exam(1), vec![question("q1")], fixed_now())
            .unwrap_err();
        assert_eq!(err, SessionStateError::AlreadyStarted);
    }

    #[test]
    fn countdown_expires_exactly_once() {
        let mut session = started(1);
        for expected in (1..60).rev() {
            assert_eq!(
                session.tick(),
                TickOutcome::Ticked {
                    seconds_left: expected
                }
            );
        }
        assert_eq!(session.tick(), TickOutcome::Expired);
        // stray ticks after expiry do nothing
        assert_eq!(session.tick(), TickOutcome::Ignored);
        assert_eq!(session.time_left_seconds(), 0);
    }

    #[test]
    fn warnings_count_up_and_hit_threshold_once() {
        let mut session = started(5);
        assert_eq!(
            session.record_warning("Tab switching detected!", fixed_now()),
            WarningOutcome::Recorded { count: 1 }
        );
        assert_eq!(
            session.record_warning("Tab switching detected!", fixed_now()),
            WarningOutcome::Recorded { count: 2 }
        );
        assert_eq!(
            session.record_warning("Application switching detected!", fixed_now()),
            WarningOutcome::ThresholdReached { count: 3 }
        );
        assert_eq!(session.warning_count(), 3);
        assert_eq!(session.warnings().len(), 3);
    }

    #[test]
    fn warnings_after_completion_are_ignored() {
        let mut session = started(5);
        session.begin_submission(false).unwrap();
        assert_eq!(
            session.record_warning("Tab switching detected!", fixed_now()),
            WarningOutcome::Ignored
        );
        assert_eq!(session.warning_count(), 0);
    }

    #[test]
    fn select_answer_validates_question_and_option() {
        let mut session = started(5);
        session.select_answer(&QuestionId::new("q1"), 2).unwrap();
        assert_eq!(session.answer_for(&QuestionId::new("q1")), Some(2));

        let err = session
            .select_answer(&QuestionId::new("missing"), 0)
            .unwrap_err();
        assert_eq!(err, SessionStateError::UnknownQuestion(QuestionId::new("missing")));

        let err = session.select_answer(&QuestionId::new("q2"), 4).unwrap_err();
        assert_eq!(
            err,
            SessionStateError::OptionOutOfRange {
                option: 4,
                available: 4
            }
        );
    }

    #[test]
    fn reselecting_overwrites_previous_answer() {
        let mut session = started(5);
        session.select_answer(&QuestionId::new("q1"), 0).unwrap();
        session.select_answer(&QuestionId::new("q1"), 3).unwrap();
        assert_eq!(session.answer_for(&QuestionId::new("q1")), Some(3));
        assert_eq!(session.answers().len(), 1);
    }

    #[test]
    fn navigation_clamps_at_both_ends() {
        let mut session = started(5);
        assert_eq!(session.previous_question().unwrap(), 0);
        assert_eq!(session.next_question().unwrap(), 1);
        assert_eq!(session.next_question().unwrap(), 1);
        session.goto_question(0).unwrap();
        assert_eq!(session.current_question(), 0);
        let err = session.goto_question(2).unwrap_err();
        assert_eq!(err, SessionStateError::QuestionOutOfRange { index: 2, total: 2 });
    }

    #[test]
    fn submission_is_single_shot() {
        let mut session = started(5);
        session.select_answer(&QuestionId::new("q1"), 1).unwrap();
        session.record_warning("Tab switching detected!", fixed_now());

        let payload = session.begin_submission(true).unwrap();
        assert!(payload.forced);
        assert_eq!(payload.warnings, 1);
        assert_eq!(payload.answers.get(&QuestionId::new("q1")), Some(&1));
        assert!(session.is_complete());

        // the loser of any race observes Completed
        assert_eq!(
            session.begin_submission(false).unwrap_err(),
            SessionStateError::Completed
        );
        assert_eq!(session.forced(), Some(true));
    }

    #[test]
    fn completed_suppresses_every_mutation() {
        let mut session = started(5);
        session.begin_submission(false).unwrap();

        assert_eq!(session.tick(), TickOutcome::Ignored);
        assert_eq!(
            session.record_warning("Tab switching detected!", fixed_now()),
            WarningOutcome::Ignored
        );
        assert_eq!(
            session.select_answer(&QuestionId::new("q1"), 0).unwrap_err(),
            SessionStateError::Completed
        );
        assert_eq!(session.next_question().unwrap_err(), SessionStateError::Completed);
        assert_eq!(session.mark_errored().unwrap_err(), SessionStateError::Completed);
        assert_eq!(session.monitor_snapshot(), None);
    }

    #[test]
    fn errored_is_reachable_from_loading_and_in_progress() {
        let mut loading = ExamSession::new(ExamId::new("exam-1"));
        loading.mark_errored().unwrap();
        assert_eq!(loading.status(), SessionStatus::Errored);

        let mut running = started(5);
        running.mark_errored().unwrap();
        assert_eq!(running.status(), SessionStatus::Errored);
        assert_eq!(running.tick(), TickOutcome::Ignored);
    }

    #[test]
    fn score_is_recorded_after_submission_only() {
        let mut session = started(5);
        assert_eq!(session.record_score(80.0).unwrap_err(), SessionStateError::NotStarted);
        session.begin_submission(false).unwrap();
        session.record_score(80.0).unwrap();
        assert_eq!(session.score(), Some(80.0));
    }

    #[test]
    fn snapshot_reflects_live_state() {
        let mut session = started(1);
        session.tick();
        session.record_warning("Tab switching detected!", fixed_now());
        session.next_question().unwrap();

        let snapshot = session.monitor_snapshot().unwrap();
        assert_eq!(snapshot.time_left_seconds, 59);
        assert_eq!(snapshot.warning_count, 1);
        assert_eq!(snapshot.current_question, 1);
    }
}
