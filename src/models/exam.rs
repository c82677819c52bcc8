// src/models/exam.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::question::Question;

/// How much of the answer key a student sees when reviewing a finished attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "disclosure_mode", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisclosureMode {
    /// No per-question detail at all.
    #[default]
    None,
    /// Canonical answers only for questions the student got wrong.
    IncorrectOnly,
    /// Canonical answers for every question.
    Full,
}

/// An exam as provided by the catalog.
///
/// `questions` is always in canonical order (ascending question id), which is
/// what every index in a session refers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exam {
    pub id: i64,
    pub class_id: i64,
    pub title: String,
    /// Minutes a student has once the session starts.
    pub duration_minutes: i32,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    #[serde(skip)]
    pub password: String,
    pub disclosure_mode: DisclosureMode,
    pub questions: Vec<Question>,
}

impl Exam {
    /// Builds an exam, putting the questions into canonical order.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: i64,
        class_id: i64,
        title: impl Into<String>,
        duration_minutes: i32,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        password: impl Into<String>,
        disclosure_mode: DisclosureMode,
        mut questions: Vec<Question>,
    ) -> Self {
        // Stable, so duplicate ids keep their catalog order.
        questions.sort_by_key(|q| q.id);
        Self {
            id,
            class_id,
            title: title.into(),
            duration_minutes,
            start_at,
            end_at,
            password: password.into(),
            disclosure_mode,
            questions,
        }
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    /// Position of a question in canonical order, `None` if it belongs to another exam.
    pub fn index_of(&self, question_id: i64) -> Option<usize> {
        self.questions.iter().position(|q| q.id == question_id)
    }

    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.start_at && now <= self.end_at
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// Clamps a client supplied index into `[0, total - 1]` (0 for an empty exam).
pub fn clamp_index(index: i64, total: usize) -> usize {
    if total == 0 || index <= 0 {
        return 0;
    }
    let last = total - 1;
    usize::try_from(index).map_or(last, |i| i.min(last))
}
