// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use utoipa::ToSchema;

/// Kind of question. Decides which correctness rule the scoring engine applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "question_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    Essay,
}

/// One selectable option of a choice question, e.g. `{ "option_key": "A", "option_value": "Paris" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Choice {
    pub option_key: String,
    pub option_value: String,
}

/// Represents a row of the 'questions' table (read-only for this service).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub title: String,

    /// Mapped from the database column 'type' since `type` is a reserved keyword in Rust.
    pub question_type: QuestionType,

    /// Stored as a JSON array in the database. Empty for essays.
    pub choices: Json<Vec<Choice>>,

    /// Canonical answer. For multiple choice: comma-joined option keys ("A,C").
    pub answer: String,

    pub image: Option<String>,
}

impl Question {
    /// Strips the canonical answer for sending to a student mid-exam.
    pub fn to_public(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id,
            title: self.title.clone(),
            question_type: self.question_type,
            choices: self.choices.0.clone(),
            image: self.image.clone(),
        }
    }
}

/// DTO for sending question to client (excludes answer).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublicQuestion {
    pub id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub choices: Vec<Choice>,
    pub image: Option<String>,
}
