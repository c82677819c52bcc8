// src/models/session.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::{
    exam::Exam,
    question::{Choice, PublicQuestion, QuestionType},
};

/// Identity of a session: one student, one exam.
///
/// Kept as two fields rather than a joined string, so `(1, 23)` and `(12, 3)`
/// can never collide. Used as-is for storage lookups and for locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
pub struct SessionKey {
    pub student_id: i64,
    pub exam_id: i64,
}

impl SessionKey {
    pub fn new(student_id: i64, exam_id: i64) -> Self {
        Self { student_id, exam_id }
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "student {} / exam {}", self.student_id, self.exam_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "session_status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    InProgress,
    /// Terminal.
    Completed,
}

/// Represents the 'exam_sessions' table: a student's single attempt at an exam.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub key: SessionKey,
    /// 0..=10.
    pub score: f64,
    pub start_at: DateTime<Utc>,
    pub finish_at: Option<DateTime<Utc>>,
    /// `start_at + exam duration`, fixed at creation. The only deadline used for expiry.
    pub finish_at_estimate: DateTime<Utc>,
    pub consumed_minutes: i32,
    pub status: SessionStatus,
    pub current_question_index: i32,
    pub switch_tab_log: Vec<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped by every successful save.
    pub version: i64,
}

impl Session {
    /// A fresh attempt starting at `now`.
    pub fn start(key: SessionKey, exam: &Exam, now: DateTime<Utc>) -> Self {
        Self {
            key,
            score: 0.0,
            start_at: now,
            finish_at: None,
            finish_at_estimate: now + exam.duration(),
            consumed_minutes: exam.duration_minutes,
            status: SessionStatus::InProgress,
            current_question_index: 0,
            switch_tab_log: Vec::new(),
            version: 0,
        }
    }

    /// Status as observed at `now`, without mutating anything.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SessionStatus {
        if self.status == SessionStatus::Completed || now > self.finish_at_estimate {
            SessionStatus::Completed
        } else {
            self.status
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    /// Whole seconds left until the deadline. Negative once it has passed.
    pub fn seconds_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.finish_at_estimate - now).num_seconds()
    }

    /// Lazy expiry: the deadline passed while the session was still open.
    pub fn expire(&mut self) {
        self.status = SessionStatus::Completed;
        self.finish_at = Some(self.finish_at_estimate);
        self.consumed_minutes = minutes_between(self.start_at, self.finish_at_estimate);
    }

    /// Explicit completion. A late submit is capped at the deadline.
    pub fn complete(&mut self, now: DateTime<Utc>, score: f64) {
        let finish_at = now.min(self.finish_at_estimate);
        self.score = score;
        self.status = SessionStatus::Completed;
        self.finish_at = Some(finish_at);
        self.consumed_minutes = minutes_between(self.start_at, finish_at);
    }
}

fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> i32 {
    i32::try_from((to - from).num_minutes().max(0)).unwrap_or(i32::MAX)
}

/// DTO for starting (or resuming) an exam.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct StartExamRequest {
    #[validate(length(min = 1, max = 128, message = "Password length must be between 1 and 128 characters."))]
    pub password: String,
}

/// Per-question progress shown in the navigation strip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuestionState {
    pub question_id: i64,
    pub index: usize,
    pub answered: bool,
    /// `None` while unanswered.
    pub correct: Option<bool>,
}

/// What a student sees while taking the exam. Never carries canonical answers.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionView {
    pub session_id: SessionKey,
    pub current_question: Option<PublicQuestion>,
    pub current_index: usize,
    pub total_questions: usize,
    pub student_answer: Option<String>,
    pub question_states: Vec<QuestionState>,
    pub is_first: bool,
    pub is_last: bool,
    pub completed: bool,
    pub seconds_remaining: i64,
}

/// Returned by a final submit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResultSummary {
    pub correct_count: usize,
    pub wrong_count: usize,
    pub total_questions: usize,
    pub score: f64,
    /// `HH:MM:SS`.
    pub elapsed: String,
    pub elapsed_seconds: i64,
}

/// One row of a graded review.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct QuestionDetail {
    pub question_id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub choices: Vec<Choice>,
    /// Withheld according to the exam's disclosure mode.
    pub canonical_answer: Option<String>,
    pub student_answer: Option<String>,
    pub correct: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DetailView {
    pub session_id: SessionKey,
    pub switch_tab_log: Vec<DateTime<Utc>>,
    pub question_details: Vec<QuestionDetail>,
}

/// Persisted outcome of a session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionResult {
    pub session_id: SessionKey,
    pub score: f64,
    pub start_at: DateTime<Utc>,
    pub finish_at: Option<DateTime<Utc>>,
    pub consumed_minutes: i32,
    pub status: SessionStatus,
}

/// A line in the per-exam monitoring list.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionSummary {
    pub session_id: SessionKey,
    pub student_id: i64,
    pub status: SessionStatus,
    pub start_at: DateTime<Utc>,
    pub finish_at: Option<DateTime<Utc>>,
    pub score: f64,
    pub switch_tab_count: usize,
}
