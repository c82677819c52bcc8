// src/repository/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgExecutor, PgPool, types::Json};

use crate::{
    error::AppError,
    models::{
        exam::{DisclosureMode, Exam},
        question::{Choice, Question, QuestionType},
        session::{Session, SessionKey, SessionStatus},
        submission::{AnswerChange, Submission},
    },
    repository::{EnrollmentCheck, ExamCatalog, SessionStore, SubmissionLedger},
};

/// Postgres backed storage. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(FromRow)]
struct ExamRow {
    id: i64,
    class_id: i64,
    title: String,
    duration_minutes: i32,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    password: String,
    disclosure_mode: DisclosureMode,
}

#[derive(FromRow)]
struct QuestionRow {
    id: i64,
    title: String,
    question_type: QuestionType,
    choices: Json<Vec<Choice>>,
    answer: String,
    image: Option<String>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Question {
            id: row.id,
            title: row.title,
            question_type: row.question_type,
            choices: row.choices,
            answer: row.answer,
            image: row.image,
        }
    }
}

#[derive(FromRow)]
struct SessionRow {
    student_id: i64,
    exam_id: i64,
    score: f64,
    start_at: DateTime<Utc>,
    finish_at: Option<DateTime<Utc>>,
    finish_at_estimate: DateTime<Utc>,
    consumed_minutes: i32,
    status: SessionStatus,
    current_question_index: i32,
    switch_tab_log: Vec<DateTime<Utc>>,
    version: i64,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            key: SessionKey::new(row.student_id, row.exam_id),
            score: row.score,
            start_at: row.start_at,
            finish_at: row.finish_at,
            finish_at_estimate: row.finish_at_estimate,
            consumed_minutes: row.consumed_minutes,
            status: row.status,
            current_question_index: row.current_question_index,
            switch_tab_log: row.switch_tab_log,
            version: row.version,
        }
    }
}

#[derive(FromRow)]
struct SubmissionRow {
    id: i64,
    student_id: i64,
    exam_id: i64,
    question_id: i64,
    answer: String,
    is_correct: bool,
}

impl From<SubmissionRow> for Submission {
    fn from(row: SubmissionRow) -> Self {
        Submission {
            id: row.id,
            session: SessionKey::new(row.student_id, row.exam_id),
            question_id: row.question_id,
            answer: row.answer,
            is_correct: row.is_correct,
        }
    }
}

const SESSION_COLUMNS: &str = "student_id, exam_id, score, start_at, finish_at, finish_at_estimate, \
     consumed_minutes, status, current_question_index, switch_tab_log, version";

const SUBMISSION_COLUMNS: &str = "id, student_id, exam_id, question_id, answer, is_correct";

#[async_trait]
impl ExamCatalog for PgStore {
    async fn find_exam(&self, exam_id: i64) -> Result<Option<Exam>, AppError> {
        let exam = sqlx::query_as::<_, ExamRow>(
            r#"
            SELECT id, class_id, title, duration_minutes, start_at, end_at, password, disclosure_mode
            FROM exams
            WHERE id = $1
            "#,
        )
        .bind(exam_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch exam {}: {:?}", exam_id, e);
            AppError::from(e)
        })?;

        let Some(exam) = exam else {
            return Ok(None);
        };

        let questions = sqlx::query_as::<_, QuestionRow>(
            r#"
            SELECT id, title, type AS question_type, choices, answer, image
            FROM questions
            WHERE exam_id = $1
            ORDER BY id
            "#,
        )
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch questions of exam {}: {:?}", exam_id, e);
            AppError::from(e)
        })?;

        Ok(Some(Exam::new(
            exam.id,
            exam.class_id,
            exam.title,
            exam.duration_minutes,
            exam.start_at,
            exam.end_at,
            exam.password,
            exam.disclosure_mode,
            questions.into_iter().map(Question::from).collect(),
        )))
    }
}

#[async_trait]
impl EnrollmentCheck for PgStore {
    async fn is_enrolled(&self, student_id: i64, class_id: i64) -> Result<bool, AppError> {
        let enrolled: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM class_enrollments WHERE student_id = $1 AND class_id = $2)",
        )
        .bind(student_id)
        .bind(class_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(enrolled)
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn find(&self, key: SessionKey) -> Result<Option<Session>, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM exam_sessions WHERE student_id = $1 AND exam_id = $2",
            SESSION_COLUMNS
        ))
        .bind(key.student_id)
        .bind(key.exam_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to fetch session {}: {:?}", key, e);
            AppError::from(e)
        })?;

        Ok(row.map(Session::from))
    }

    async fn insert(&self, session: &Session) -> Result<Session, AppError> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            r#"
            INSERT INTO exam_sessions ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 0)
            ON CONFLICT (student_id, exam_id) DO NOTHING
            RETURNING {cols}
            "#,
            cols = SESSION_COLUMNS
        ))
        .bind(session.key.student_id)
        .bind(session.key.exam_id)
        .bind(session.score)
        .bind(session.start_at)
        .bind(session.finish_at)
        .bind(session.finish_at_estimate)
        .bind(session.consumed_minutes)
        .bind(session.status)
        .bind(session.current_question_index)
        .bind(&session.switch_tab_log)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert session {}: {:?}", session.key, e);
            AppError::from(e)
        })?;

        row.map(Session::from)
            .ok_or_else(|| AppError::Conflict(format!("Session for {} already exists", session.key)))
    }

    async fn save(&self, session: &Session) -> Result<Session, AppError> {
        let row = update_session(&self.pool, session).await.map_err(|e| {
            tracing::error!("Failed to save session {}: {:?}", session.key, e);
            AppError::from(e)
        })?;

        row.map(Session::from).ok_or_else(|| stale(session))
    }

    async fn save_with_answer(
        &self,
        session: &Session,
        question_id: i64,
        change: &AnswerChange,
    ) -> Result<Session, AppError> {
        let key = session.key;
        let mut tx = self.pool.begin().await?;

        // The versioned UPDATE locks the session row until commit.
        let Some(row) = update_session(&mut *tx, session).await? else {
            return Err(stale(session));
        };

        match change {
            AnswerChange::Set { answer, is_correct } => {
                sqlx::query(
                    r#"
                    INSERT INTO exam_submissions (student_id, exam_id, question_id, answer, is_correct)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (student_id, exam_id, question_id) DO UPDATE SET
                        answer = EXCLUDED.answer,
                        is_correct = EXCLUDED.is_correct
                    "#,
                )
                .bind(key.student_id)
                .bind(key.exam_id)
                .bind(question_id)
                .bind(answer)
                .bind(is_correct)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to upsert submission for {} q{}: {:?}", key, question_id, e);
                    AppError::from(e)
                })?;
            }
            AnswerChange::Clear => {
                sqlx::query(
                    "DELETE FROM exam_submissions WHERE student_id = $1 AND exam_id = $2 AND question_id = $3",
                )
                .bind(key.student_id)
                .bind(key.exam_id)
                .bind(question_id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(row.into())
    }

    async fn list_by_exam(&self, exam_id: i64) -> Result<Vec<Session>, AppError> {
        let rows = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {} FROM exam_sessions WHERE exam_id = $1 ORDER BY student_id",
            SESSION_COLUMNS
        ))
        .bind(exam_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Session::from).collect())
    }
}

#[async_trait]
impl SubmissionLedger for PgStore {
    async fn list(&self, key: SessionKey) -> Result<Vec<Submission>, AppError> {
        let rows = sqlx::query_as::<_, SubmissionRow>(&format!(
            "SELECT {} FROM exam_submissions WHERE student_id = $1 AND exam_id = $2 ORDER BY id",
            SUBMISSION_COLUMNS
        ))
        .bind(key.student_id)
        .bind(key.exam_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Submission::from).collect())
    }
}

/// Versioned write of the mutable session columns. `None` when the row moved on.
/// `finish_at_estimate` and `start_at` are never written after insert.
async fn update_session<'e, E>(executor: E, session: &Session) -> Result<Option<SessionRow>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, SessionRow>(&format!(
        r#"
        UPDATE exam_sessions SET
            score = $3,
            finish_at = $4,
            consumed_minutes = $5,
            status = $6,
            current_question_index = $7,
            switch_tab_log = $8,
            version = version + 1
        WHERE student_id = $1 AND exam_id = $2 AND version = $9
        RETURNING {}
        "#,
        SESSION_COLUMNS
    ))
    .bind(session.key.student_id)
    .bind(session.key.exam_id)
    .bind(session.score)
    .bind(session.finish_at)
    .bind(session.consumed_minutes)
    .bind(session.status)
    .bind(session.current_question_index)
    .bind(&session.switch_tab_log)
    .bind(session.version)
    .fetch_optional(executor)
    .await
}

fn stale(session: &Session) -> AppError {
    AppError::Conflict(format!("Session for {} was modified concurrently", session.key))
}
