// src/repository/mod.rs

//! Storage seams of the session engine.
//!
//! The catalog and enrollment traits are read-only views of data owned by
//! other parts of the platform. Sessions and submissions are owned here.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        exam::Exam,
        session::{Session, SessionKey},
        submission::{AnswerChange, Submission},
    },
};

pub use memory::InMemoryStore;
pub use postgres::PgStore;

/// Read-only source of exams with their questions in canonical order.
#[async_trait]
pub trait ExamCatalog: Send + Sync {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError>;
}

/// Answers "is this student enrolled in this class?".
#[async_trait]
pub trait EnrollmentCheck: Send + Sync {
    async fn is_enrolled(&self, student_id: i64, class_id: i64) -> Result<bool, AppError>;
}

/// One session per (student, exam).
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn find(&self, key: SessionKey) -> Result<Option<Session>, AppError>;

    /// Creates the session. `Conflict` if one already exists for the key.
    async fn insert(&self, session: &Session) -> Result<Session, AppError>;

    /// Writes the session back if nobody else wrote it since it was read
    /// (same `version`), returning the stored copy with the bumped version.
    /// `Conflict` otherwise.
    async fn save(&self, session: &Session) -> Result<Session, AppError>;

    /// Same version check as [`save`](Self::save), committed together with
    /// the answer change. On `Conflict` neither is written.
    async fn save_with_answer(
        &self,
        session: &Session,
        question_id: i64,
        change: &AnswerChange,
    ) -> Result<Session, AppError>;

    /// All sessions of an exam, ordered by student id.
    async fn list_by_exam(&self, exam_id: i64) -> Result<Vec<Session>, AppError>;
}

/// Effective answers, unique per (session, question). Written only through
/// [`SessionStore::save_with_answer`].
#[async_trait]
pub trait SubmissionLedger: Send + Sync {
    /// All answers of a session in arrival (id) order.
    async fn list(&self, key: SessionKey) -> Result<Vec<Submission>, AppError>;
}
