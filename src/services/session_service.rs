// src/services/session_service.rs

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::{
    error::AppError,
    models::{
        exam::{Exam, clamp_index},
        session::{
            DetailView, QuestionState, ResultSummary, Session, SessionKey, SessionResult,
            SessionStatus, SessionSummary, SessionView,
        },
        submission::{AnswerChange, Submission},
        user::Requester,
    },
    repository::{EnrollmentCheck, ExamCatalog, SessionStore, SubmissionLedger},
    services::{clock::Clock, locks::SessionLocks, review, scoring},
    utils::time::format_hms,
};

/// How many times an operation is replayed after losing an optimistic-lock race.
const MAX_CONFLICT_ATTEMPTS: usize = 3;

/// Lifecycle of a student's attempt at an exam.
///
/// Sessions move from `IN_PROGRESS` to `COMPLETED` either through
/// [`submit_exam`](Self::submit_exam) or when a request notices the deadline
/// has passed. There is no timer: expiry is detected lazily. Every mutating
/// operation runs under the per-session lock.
pub struct ExamSessionService {
    catalog: Arc<dyn ExamCatalog>,
    enrollment: Arc<dyn EnrollmentCheck>,
    sessions: Arc<dyn SessionStore>,
    submissions: Arc<dyn SubmissionLedger>,
    clock: Arc<dyn Clock>,
    locks: SessionLocks,
}

impl ExamSessionService {
    pub fn new(
        catalog: Arc<dyn ExamCatalog>,
        enrollment: Arc<dyn EnrollmentCheck>,
        sessions: Arc<dyn SessionStore>,
        submissions: Arc<dyn SubmissionLedger>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            enrollment,
            sessions,
            submissions,
            clock,
            locks: SessionLocks::new(),
        }
    }

    /// Wires every seam to the same store.
    pub fn with_store<S>(store: Arc<S>, clock: Arc<dyn Clock>) -> Self
    where
        S: ExamCatalog + EnrollmentCheck + SessionStore + SubmissionLedger + 'static,
    {
        Self::new(store.clone(), store.clone(), store.clone(), store, clock)
    }

    /// Starts an attempt, or resumes the one already in progress.
    ///
    /// Repeated calls before the deadline return the same session.
    pub async fn start_exam(
        &self,
        exam_id: i64,
        student_id: i64,
        password: &str,
    ) -> Result<SessionView, AppError> {
        let exam = self.load_exam(exam_id).await?;

        if !self.enrollment.is_enrolled(student_id, exam.class_id).await? {
            return Err(AppError::Forbidden("Student is not in class".to_string()));
        }
        if password != exam.password {
            return Err(AppError::InvalidCredential("Wrong password".to_string()));
        }
        let now = self.clock.now();
        if !exam.is_open_at(now) {
            let reason = if now < exam.start_at {
                "The exam has not started yet"
            } else {
                "The exam has already ended"
            };
            return Err(AppError::WindowClosed(reason.to_string()));
        }

        let key = SessionKey::new(student_id, exam_id);
        let exam = &exam;
        let _guard = self.locks.acquire(key).await;
        retry_on_conflict(key, move || self.try_start_exam(exam, key)).await
    }

    async fn try_start_exam(&self, exam: &Exam, key: SessionKey) -> Result<SessionView, AppError> {
        let now = self.clock.now();

        let Some(mut session) = self.sessions.find(key).await? else {
            let session = self.sessions.insert(&Session::start(key, exam, now)).await?;
            tracing::info!(
                "Session created for {}, deadline {}",
                key,
                session.finish_at_estimate
            );
            return Ok(session_view(exam, &session, &HashMap::new(), 0, now));
        };

        match session.status {
            SessionStatus::Completed => Err(AppError::AlreadyCompleted(
                "Exam already completed".to_string(),
            )),
            SessionStatus::InProgress => {
                if session.seconds_remaining(now) <= 0 {
                    session.expire();
                    self.sessions.save(&session).await?;
                    tracing::info!("Session {} expired on resume", key);
                    return Err(AppError::Expired(
                        "Time's up! Exam already completed".to_string(),
                    ));
                }

                let index = clamp_index(
                    i64::from(session.current_question_index),
                    exam.total_questions(),
                );
                if index as i32 != session.current_question_index {
                    session.current_question_index = index as i32;
                    session = self.sessions.save(&session).await?;
                }

                let latest = self.latest_submissions(key).await?;
                tracing::info!("Session {} resumed at question {}", key, index);
                Ok(session_view(exam, &session, &latest, index, now))
            }
        }
    }

    /// Records (or clears, when blank) the answer to one question and moves
    /// the cursor to `requested_index`, or to the answered question.
    pub async fn submit_answer(
        &self,
        key: SessionKey,
        question_id: i64,
        answer: Option<&str>,
        requested_index: Option<i64>,
    ) -> Result<SessionView, AppError> {
        let _guard = self.locks.acquire(key).await;
        retry_on_conflict(key, move || {
            self.try_submit_answer(key, question_id, answer, requested_index)
        })
        .await
    }

    async fn try_submit_answer(
        &self,
        key: SessionKey,
        question_id: i64,
        answer: Option<&str>,
        requested_index: Option<i64>,
    ) -> Result<SessionView, AppError> {
        let mut session = self.load_session(key).await?;
        let exam = self.load_exam(key.exam_id).await?;

        let question_index = exam.index_of(question_id).ok_or_else(|| {
            AppError::InvalidQuestion(format!(
                "Question {} does not belong to exam {}",
                question_id, exam.id
            ))
        })?;

        let now = self.clock.now();
        self.ensure_open(&mut session, now).await?;

        let question = &exam.questions[question_index];
        let change = match answer.map(str::trim).filter(|a| !a.is_empty()) {
            Some(answer) => AnswerChange::Set {
                answer: answer.to_string(),
                is_correct: scoring::is_correct(question, answer),
            },
            None => AnswerChange::Clear,
        };

        let mut latest = self.latest_submissions(key).await?;
        change.apply(key, question_id, &mut latest);
        let target = requested_index.map_or(question_index, |i| {
            clamp_index(i, exam.total_questions())
        });
        session.score = scoring::score(&exam, &latest);
        session.current_question_index = target as i32;
        let session = self
            .sessions
            .save_with_answer(&session, question_id, &change)
            .await?;
        if change == AnswerChange::Clear {
            tracing::debug!("Answer to question {} cleared in {}", question_id, key);
        }

        Ok(session_view(&exam, &session, &latest, target, now))
    }

    /// Moves the cursor without answering.
    pub async fn get_question(&self, key: SessionKey, index: i64) -> Result<SessionView, AppError> {
        let _guard = self.locks.acquire(key).await;
        retry_on_conflict(key, move || self.try_get_question(key, index)).await
    }

    async fn try_get_question(&self, key: SessionKey, index: i64) -> Result<SessionView, AppError> {
        let mut session = self.load_session(key).await?;
        let exam = self.load_exam(key.exam_id).await?;

        let now = self.clock.now();
        self.ensure_open(&mut session, now).await?;

        let index = clamp_index(index, exam.total_questions());
        if index as i32 != session.current_question_index {
            session.current_question_index = index as i32;
            session = self.sessions.save(&session).await?;
        }

        let latest = self.latest_submissions(key).await?;
        Ok(session_view(&exam, &session, &latest, index, now))
    }

    /// Notes that the student left the exam tab. Recorded whatever the status.
    pub async fn switch_tab(&self, key: SessionKey) -> Result<(), AppError> {
        let _guard = self.locks.acquire(key).await;
        retry_on_conflict(key, move || self.try_switch_tab(key)).await
    }

    async fn try_switch_tab(&self, key: SessionKey) -> Result<(), AppError> {
        let mut session = self.load_session(key).await?;
        session.switch_tab_log.push(self.clock.now());
        let session = self.sessions.save(&session).await?;
        tracing::info!(
            "Tab switch recorded for {} ({} so far)",
            key,
            session.switch_tab_log.len()
        );
        Ok(())
    }

    /// Final submit. Unanswered questions count as wrong.
    pub async fn submit_exam(&self, key: SessionKey) -> Result<ResultSummary, AppError> {
        let _guard = self.locks.acquire(key).await;
        retry_on_conflict(key, move || self.try_submit_exam(key)).await
    }

    async fn try_submit_exam(&self, key: SessionKey) -> Result<ResultSummary, AppError> {
        let mut session = self.load_session(key).await?;
        if session.is_completed() {
            return Err(AppError::AlreadyCompleted(
                "Exam already completed".to_string(),
            ));
        }
        let exam = self.load_exam(key.exam_id).await?;

        let latest = self.latest_submissions(key).await?;
        let total_questions = exam.total_questions();
        let correct_count = scoring::count_correct(&exam, &latest);
        let score = scoring::calculate_score(correct_count, total_questions);

        session.complete(self.clock.now(), score);
        let session = self.sessions.save(&session).await?;

        let elapsed = session
            .finish_at
            .map_or(chrono::Duration::zero(), |f| f - session.start_at);
        tracing::info!(
            "Session {} submitted: {}/{} correct, score {:.2}",
            key,
            correct_count,
            total_questions,
            score
        );

        Ok(ResultSummary {
            correct_count,
            wrong_count: total_questions - correct_count,
            total_questions,
            score,
            elapsed: format_hms(elapsed),
            elapsed_seconds: elapsed.num_seconds(),
        })
    }

    /// Graded review of a session.
    ///
    /// Teachers and admins get everything at any time. Students only see
    /// their own finished attempt, filtered by the exam's disclosure mode.
    pub async fn get_detail(
        &self,
        key: SessionKey,
        requester: Requester,
    ) -> Result<DetailView, AppError> {
        if let Requester::Student(student_id) = requester {
            if student_id != key.student_id {
                return Err(AppError::Forbidden(
                    "Not your exam session".to_string(),
                ));
            }
        }

        let _guard = self.locks.acquire(key).await;
        retry_on_conflict(key, move || self.try_get_detail(key, requester)).await
    }

    async fn try_get_detail(
        &self,
        key: SessionKey,
        requester: Requester,
    ) -> Result<DetailView, AppError> {
        let mut session = self.load_session(key).await?;
        let exam = self.load_exam(key.exam_id).await?;

        if !requester.is_privileged() && !session.is_completed() {
            if self.clock.now() > session.finish_at_estimate {
                session.expire();
                session = self.sessions.save(&session).await?;
                tracing::info!("Session {} expired on review", key);
            } else {
                return Err(AppError::NotReady(
                    "You have not completed the exam or it is not yet available for review"
                        .to_string(),
                ));
            }
        }

        let latest = self.latest_submissions(key).await?;
        Ok(review::build_detail(&requester, &exam, &session, &latest))
    }

    /// Persisted outcome with the effective status. Never mutates.
    pub async fn get_result(&self, key: SessionKey) -> Result<SessionResult, AppError> {
        let session = self.load_session(key).await?;
        Ok(SessionResult {
            session_id: session.key,
            score: session.score,
            start_at: session.start_at,
            finish_at: session.finish_at,
            consumed_minutes: session.consumed_minutes,
            status: session.effective_status(self.clock.now()),
        })
    }

    /// Every attempt at an exam, for monitoring. Privileged only.
    pub async fn list_sessions(
        &self,
        exam_id: i64,
        requester: Requester,
    ) -> Result<Vec<SessionSummary>, AppError> {
        if !requester.is_privileged() {
            return Err(AppError::Forbidden(
                "Only teachers and admins can list sessions".to_string(),
            ));
        }
        self.load_exam(exam_id).await?;

        let now = self.clock.now();
        let sessions = self.sessions.list_by_exam(exam_id).await?;
        Ok(sessions
            .into_iter()
            .map(|s| SessionSummary {
                session_id: s.key,
                student_id: s.key.student_id,
                status: s.effective_status(now),
                start_at: s.start_at,
                finish_at: s.finish_at,
                score: s.score,
                switch_tab_count: s.switch_tab_log.len(),
            })
            .collect())
    }

    /// Rejects writes to a finished attempt, expiring it first if its time ran out.
    async fn ensure_open(
        &self,
        session: &mut Session,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), AppError> {
        if session.is_completed() {
            return Err(AppError::AlreadyCompleted(
                "Exam already completed".to_string(),
            ));
        }
        if now > session.finish_at_estimate {
            session.expire();
            self.sessions.save(session).await?;
            tracing::info!("Session {} expired", session.key);
            return Err(AppError::Expired(
                "Time's up! Exam already completed".to_string(),
            ));
        }
        Ok(())
    }

    async fn load_exam(&self, exam_id: i64) -> Result<Exam, AppError> {
        self.catalog
            .find_exam(exam_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam {} not found", exam_id)))
    }

    async fn load_session(&self, key: SessionKey) -> Result<Session, AppError> {
        self.sessions
            .find(key)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Exam session for {} not found", key)))
    }

    async fn latest_submissions(
        &self,
        key: SessionKey,
    ) -> Result<HashMap<i64, Submission>, AppError> {
        Ok(scoring::latest_by_question(self.submissions.list(key).await?))
    }
}

/// Replays `op` when a concurrent writer won the optimistic-lock race.
async fn retry_on_conflict<T, F, Fut>(key: SessionKey, mut op: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(AppError::Conflict(msg)) if attempt < MAX_CONFLICT_ATTEMPTS => {
                tracing::warn!(
                    "Write conflict on session {} (attempt {}): {}",
                    key,
                    attempt,
                    msg
                );
                attempt += 1;
            }
            result => return result,
        }
    }
}

fn session_view(
    exam: &Exam,
    session: &Session,
    latest: &HashMap<i64, Submission>,
    index: usize,
    now: chrono::DateTime<chrono::Utc>,
) -> SessionView {
    let total_questions = exam.total_questions();
    let current_index = clamp_index(index as i64, total_questions);
    let current = exam.questions.get(current_index);

    let question_states = exam
        .questions
        .iter()
        .enumerate()
        .map(|(index, q)| {
            let submission = latest.get(&q.id);
            QuestionState {
                question_id: q.id,
                index,
                answered: submission.is_some(),
                correct: submission.map(|s| s.is_correct),
            }
        })
        .collect();

    SessionView {
        session_id: session.key,
        current_question: current.map(|q| q.to_public()),
        current_index,
        total_questions,
        student_answer: current
            .and_then(|q| latest.get(&q.id))
            .map(|s| s.answer.clone()),
        question_states,
        is_first: current_index == 0,
        is_last: total_questions == 0 || current_index == total_questions - 1,
        completed: session.is_completed(),
        seconds_remaining: session.seconds_remaining(now).max(0),
    }
}
