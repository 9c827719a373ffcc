//! Drives one timed, monitored exam attempt.
//!
//! The runtime owns an [`ExamSession`] behind a mutex and three scheduled
//! tasks: a 1 Hz countdown, a 10 s monitoring heartbeat, and a one-shot
//! warning-dismissal timer re-armed on each new warning. Every state change
//! goes through a status-guarded transition on the session, so timer fires
//! and user actions tolerate any interleaving; in particular the countdown
//! reaching zero and a third warning can race and still produce exactly one
//! submission. All timer handles are cancelled on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{debug, warn};

use exam_api::{ApiError, ExamApi, MonitoringApi, SubmissionReceipt};
use exam_core::Clock;
use exam_core::model::{
    Exam, ExamId, ExamSession, Question, QuestionId, SessionStatus, TickOutcome, WarningOutcome,
};

use crate::error::SessionError;
use crate::monitoring::ActivityKind;
use crate::session::SessionEvent;

const COUNTDOWN_PERIOD: Duration = Duration::from_secs(1);
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(10);
const WARNING_DISPLAY: Duration = Duration::from_secs(3);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Tasks {
    countdown: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    warning_dismiss: Option<JoinHandle<()>>,
    activity: Option<JoinHandle<()>>,
}

struct RuntimeInner {
    exam_id: ExamId,
    exams: Arc<dyn ExamApi>,
    monitoring: Arc<dyn MonitoringApi>,
    clock: Clock,
    state: Mutex<ExamSession>,
    events: mpsc::UnboundedSender<SessionEvent>,
    tasks: Mutex<Tasks>,
    closed: AtomicBool,
}

/// Handle to one running exam attempt.
///
/// Obtained from [`ExamSessionRuntime::start`]; dropping it (or calling
/// [`close`](Self::close)) cancels every outstanding timer.
pub struct ExamSessionRuntime {
    inner: Arc<RuntimeInner>,
}

impl ExamSessionRuntime {
    /// Load the exam and begin a monitored attempt.
    ///
    /// Fetches metadata and questions, starts the session clock, then tells
    /// the backend that monitoring began (non-fatal if that fails) and
    /// spawns the countdown and heartbeat. The returned receiver yields
    /// [`SessionEvent`]s until submission.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyCompleted` when the backend reports
    /// the attempt as finished (terminal, do not retry), or
    /// `SessionError::Load` for any other load failure. No timers are
    /// running when an error is returned.
    pub async fn start(
        exams: Arc<dyn ExamApi>,
        monitoring: Arc<dyn MonitoringApi>,
        clock: Clock,
        exam_id: ExamId,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SessionEvent>), SessionError> {
        let mut session = ExamSession::new(exam_id.clone());

        let loaded = Self::load(exams.as_ref(), &exam_id).await;
        let (exam, questions) = match loaded {
            Ok(parts) => parts,
            Err(err) => {
                let _ = session.mark_errored();
                return Err(err);
            }
        };
        session.begin(exam, questions, clock.now())?;

        let (events, receiver) = mpsc::unbounded_channel();
        let inner = Arc::new(RuntimeInner {
            exam_id: exam_id.clone(),
            exams,
            monitoring,
            clock,
            state: Mutex::new(session),
            events,
            tasks: Mutex::new(Tasks::default()),
            closed: AtomicBool::new(false),
        });

        if let Err(err) = inner.monitoring.start(&exam_id).await {
            // monitoring is advisory; the attempt proceeds regardless
            warn!(exam_id = %exam_id, error = %err, "failed to start monitoring");
        }

        let runtime = Self { inner };
        runtime.resume();
        Ok((runtime, receiver))
    }

    async fn load(
        exams: &dyn ExamApi,
        exam_id: &ExamId,
    ) -> Result<(Exam, Vec<Question>), SessionError> {
        let exam = exams
            .fetch_exam(exam_id)
            .await
            .map_err(SessionError::from_load)?;
        let questions = exams
            .fetch_questions(exam_id)
            .await
            .map_err(SessionError::from_load)?;
        Ok((exam, questions))
    }

    /// (Re)spawn the countdown and heartbeat if the attempt is in progress.
    ///
    /// Idempotent; a canceled timer must be restarted whenever the attempt
    /// is still running, and this is the restart point.
    pub fn resume(&self) {
        if lock(&self.inner.state).status() != SessionStatus::InProgress {
            return;
        }
        let mut tasks = lock(&self.inner.tasks);
        if tasks
            .countdown
            .as_ref()
            .is_none_or(JoinHandle::is_finished)
        {
            tasks.countdown = Some(spawn_countdown(Arc::clone(&self.inner)));
        }
        if tasks
            .heartbeat
            .as_ref()
            .is_none_or(JoinHandle::is_finished)
        {
            tasks.heartbeat = Some(spawn_heartbeat(Arc::clone(&self.inner)));
        }
    }

    /// Record the selected option locally and persist it in the background.
    ///
    /// The local selection is authoritative; a failed save is logged and
    /// never rolled back, since the final submission carries all answers.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::State` for a bad selection or an attempt that
    /// is no longer in progress.
    pub fn select_answer(
        &self,
        question_id: &QuestionId,
        option: usize,
    ) -> Result<(), SessionError> {
        lock(&self.inner.state).select_answer(question_id, option)?;

        let inner = Arc::clone(&self.inner);
        let question_id = question_id.clone();
        tokio::spawn(async move {
            if let Err(err) = inner
                .exams
                .save_answer(&inner.exam_id, &question_id, option)
                .await
            {
                warn!(
                    exam_id = %inner.exam_id,
                    question_id = %question_id,
                    error = %err,
                    "failed to save answer"
                );
            }
        });
        Ok(())
    }

    /// Feed one suspicious-activity signal into the attempt.
    ///
    /// Ignored once the attempt is completed; the third warning forces a
    /// submission before this call returns.
    pub async fn report_activity(&self, kind: ActivityKind) {
        self.inner.handle_activity(kind).await;
    }

    /// Forward signals from a push-style activity source until it closes.
    pub fn attach_activity_source(&self, mut signals: mpsc::UnboundedReceiver<ActivityKind>) {
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            while let Some(kind) = signals.recv().await {
                inner.handle_activity(kind).await;
            }
        });
        if let Some(previous) = lock(&self.inner.tasks).activity.replace(handle) {
            previous.abort();
        }
    }

    /// Submit the attempt on the student's request.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::State` if another trigger already submitted,
    /// or `SessionError::Submission` if the backend rejected the call (the
    /// attempt stays locally completed either way).
    pub async fn submit(&self) -> Result<SubmissionReceipt, SessionError> {
        self.inner.finish(false).await
    }

    /// Tear the attempt down without submitting (navigation away).
    ///
    /// Cancels all timers and, when the attempt never completed, tells the
    /// backend the monitored session ended (best-effort).
    pub async fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.cancel_timers();
        if lock(&self.inner.state).status() == SessionStatus::InProgress {
            if let Err(err) = self.inner.monitoring.end(&self.inner.exam_id).await {
                warn!(exam_id = %self.inner.exam_id, error = %err, "failed to end monitoring");
            }
        }
    }

    // ─── Navigation ────────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns `SessionError::State` if the attempt is not in progress.
    pub fn next_question(&self) -> Result<usize, SessionError> {
        Ok(lock(&self.inner.state).next_question()?)
    }

    /// # Errors
    ///
    /// Returns `SessionError::State` if the attempt is not in progress.
    pub fn previous_question(&self) -> Result<usize, SessionError> {
        Ok(lock(&self.inner.state).previous_question()?)
    }

    /// # Errors
    ///
    /// Returns `SessionError::State` for an out-of-range index or an
    /// attempt that is not in progress.
    pub fn goto_question(&self, index: usize) -> Result<(), SessionError> {
        Ok(lock(&self.inner.state).goto_question(index)?)
    }

    // ─── Read access ───────────────────────────────────────────────────────

    #[must_use]
    pub fn exam_id(&self) -> ExamId {
        self.inner.exam_id.clone()
    }

    #[must_use]
    pub fn exam(&self) -> Option<Exam> {
        lock(&self.inner.state).exam().cloned()
    }

    #[must_use]
    pub fn questions(&self) -> Vec<Question> {
        lock(&self.inner.state).questions().to_vec()
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        lock(&self.inner.state).status()
    }

    #[must_use]
    pub fn time_left_seconds(&self) -> u32 {
        lock(&self.inner.state).time_left_seconds()
    }

    #[must_use]
    pub fn warning_count(&self) -> u32 {
        lock(&self.inner.state).warning_count()
    }

    #[must_use]
    pub fn current_question(&self) -> usize {
        lock(&self.inner.state).current_question()
    }

    #[must_use]
    pub fn answer_for(&self, question_id: &QuestionId) -> Option<usize> {
        lock(&self.inner.state).answer_for(question_id)
    }

    #[must_use]
    pub fn score(&self) -> Option<f64> {
        lock(&self.inner.state).score()
    }
}

impl Drop for ExamSessionRuntime {
    fn drop(&mut self) {
        self.inner.cancel_timers();
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if lock(&self.inner.state).status() != SessionStatus::InProgress {
            return;
        }
        // abandoned mid-attempt; best-effort end notification
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let inner = Arc::clone(&self.inner);
            handle.spawn(async move {
                if let Err(err) = inner.monitoring.end(&inner.exam_id).await {
                    warn!(exam_id = %inner.exam_id, error = %err, "failed to end monitoring");
                }
            });
        }
    }
}

impl RuntimeInner {
    async fn handle_activity(self: &Arc<Self>, kind: ActivityKind) {
        let message = kind.message();
        let outcome = lock(&self.state).record_warning(message, self.clock.now());
        match outcome {
            WarningOutcome::Ignored => {}
            WarningOutcome::Recorded { count } => {
                self.raise_warning(message, count);
            }
            WarningOutcome::ThresholdReached { count } => {
                self.raise_warning(message, count);
                if let Err(err) = self.finish(true).await {
                    warn!(exam_id = %self.exam_id, error = %err, "forced submission failed");
                }
            }
        }
    }

    fn raise_warning(self: &Arc<Self>, message: &'static str, count: u32) {
        let _ = self.events.send(SessionEvent::WarningRaised {
            message: message.to_owned(),
            count,
        });

        // report to the proctor; advisory, never blocks the attempt
        let reporter = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = reporter.monitoring.warning(&reporter.exam_id, message).await {
                warn!(exam_id = %reporter.exam_id, error = %err, "failed to report warning");
            }
        });

        // re-arm the transient banner timer
        let dismisser = Arc::clone(self);
        let handle = tokio::spawn(async move {
            time::sleep(WARNING_DISPLAY).await;
            let _ = dismisser.events.send(SessionEvent::WarningDismissed);
        });
        if let Some(previous) = lock(&self.tasks).warning_dismiss.replace(handle) {
            previous.abort();
        }
    }

    /// Single-shot submission path shared by the student's submit button,
    /// countdown expiry (`forced = false`), and the warning threshold
    /// (`forced = true`). The session flips to `Completed` before the
    /// network call, so concurrent triggers collapse to one winner.
    ///
    /// The activity task is aborted only after the submit resolves: a third
    /// warning arriving through the attached source runs this very function
    /// on that task, and aborting it earlier would cancel the submission at
    /// the `submit` await. Signals that land in between hit the `Completed`
    /// guard and are ignored.
    async fn finish(self: &Arc<Self>, forced: bool) -> Result<SubmissionReceipt, SessionError> {
        let payload = lock(&self.state).begin_submission(forced)?;
        self.cancel_schedule();

        let outcome = match self.exams.submit(&self.exam_id, &payload).await {
            Ok(receipt) => {
                if let Err(err) = lock(&self.state).record_score(receipt.score) {
                    debug!(exam_id = %self.exam_id, error = %err, "score not recorded");
                }
                let _ = self.events.send(SessionEvent::Submitted {
                    score: receipt.score,
                    forced,
                });
                Ok(receipt)
            }
            Err(err) => {
                // submission intent is final: Completed is not reverted,
                // otherwise a retry could double-submit
                let _ = self.events.send(SessionEvent::SubmissionFailed {
                    message: err.to_string(),
                });
                Err(SessionError::Submission(err))
            }
        };
        // possibly a self-abort; nothing below this point may await
        if let Some(activity) = lock(&self.tasks).activity.take() {
            activity.abort();
        }
        outcome
    }

    /// Stop the countdown, heartbeat, and banner timers. Leaves the
    /// activity task alone; see [`RuntimeInner::finish`].
    fn cancel_schedule(&self) {
        let mut tasks = lock(&self.tasks);
        let handles = [
            tasks.countdown.take(),
            tasks.heartbeat.take(),
            tasks.warning_dismiss.take(),
        ];
        for handle in handles.into_iter().flatten() {
            handle.abort();
        }
    }

    fn cancel_timers(&self) {
        self.cancel_schedule();
        if let Some(activity) = lock(&self.tasks).activity.take() {
            activity.abort();
        }
    }
}

fn spawn_countdown(inner: Arc<RuntimeInner>) -> JoinHandle<()> {
    // anchored here, not at the task's first poll, so the first tick is one
    // period after spawning no matter when the task gets scheduled
    let mut ticker = time::interval_at(Instant::now() + COUNTDOWN_PERIOD, COUNTDOWN_PERIOD);
    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            let outcome = lock(&inner.state).tick();
            match outcome {
                TickOutcome::Ticked { seconds_left } => {
                    let _ = inner.events.send(SessionEvent::Tick { seconds_left });
                }
                TickOutcome::Expired => {
                    let _ = inner.events.send(SessionEvent::Tick { seconds_left: 0 });
                    // natural time expiry is system-initiated but not a
                    // violation, so it submits unforced
                    let submitter = Arc::clone(&inner);
                    tokio::spawn(async move {
                        if let Err(err) = submitter.finish(false).await {
                            warn!(
                                exam_id = %submitter.exam_id,
                                error = %err,
                                "time-expiry submission failed"
                            );
                        }
                    });
                    break;
                }
                TickOutcome::Ignored => break,
            }
        }
    })
}

fn spawn_heartbeat(inner: Arc<RuntimeInner>) -> JoinHandle<()> {
    let mut ticker = time::interval_at(Instant::now() + HEARTBEAT_PERIOD, HEARTBEAT_PERIOD);
    tokio::spawn(async move {
        loop {
            ticker.tick().await;
            let Some(snapshot) = lock(&inner.state).monitor_snapshot() else {
                break;
            };
            if let Err(err) = inner.monitoring.update(&inner.exam_id, snapshot).await {
                warn!(exam_id = %inner.exam_id, error = %err, "monitoring heartbeat failed");
            }
        }
    })
}
