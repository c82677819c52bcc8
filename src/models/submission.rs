// src/models/submission.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::session::SessionKey;

/// Represents the 'exam_submissions' table.
/// At most one row per (session, question); re-answering updates it in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub session: SessionKey,
    pub question_id: i64,
    /// Trimmed, never blank.
    pub answer: String,
    pub is_correct: bool,
}

/// DTO for answering (or clearing) one question.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitAnswerRequest {
    pub question_id: i64,
    /// Missing or blank clears the previous answer.
    #[validate(length(max = 5000, message = "Answer must be at most 5000 characters."))]
    pub answer: Option<String>,
    /// Where the client wants to go next. Defaults to the answered question.
    pub current_question_index: Option<i64>,
}

/// What a `submit_answer` call does to the stored answer of one question.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerChange {
    Set { answer: String, is_correct: bool },
    Clear,
}

impl AnswerChange {
    /// Applies the change to an in-memory view of the effective answers.
    /// A new entry keeps id 0 until the store assigns one.
    pub fn apply(&self, key: SessionKey, question_id: i64, latest: &mut HashMap<i64, Submission>) {
        match self {
            AnswerChange::Set { answer, is_correct } => {
                let id = latest.get(&question_id).map_or(0, |s| s.id);
                latest.insert(
                    question_id,
                    Submission {
                        id,
                        session: key,
                        question_id,
                        answer: answer.clone(),
                        is_correct: *is_correct,
                    },
                );
            }
            AnswerChange::Clear => {
                latest.remove(&question_id);
            }
        }
    }
}
