// src/docs.rs

use axum::Json;
use utoipa::OpenApi;

use crate::{
    handlers::{exams, sessions},
    models::{
        exam::DisclosureMode,
        question::{Choice, PublicQuestion, QuestionType},
        session::{
            DetailView, QuestionDetail, QuestionState, ResultSummary, SessionKey, SessionResult,
            SessionStatus, SessionSummary, SessionView, StartExamRequest,
        },
        submission::SubmitAnswerRequest,
    },
};

#[derive(OpenApi)]
#[openapi(
    info(title = "Exam Sessions API", description = "Timed exam attempts: start, answer, submit, review."),
    paths(
        exams::start_exam,
        exams::list_sessions,
        sessions::get_result,
        sessions::get_question,
        sessions::submit_answer,
        sessions::switch_tab,
        sessions::submit_exam,
        sessions::get_detail,
    ),
    components(schemas(
        StartExamRequest,
        SubmitAnswerRequest,
        SessionKey,
        SessionStatus,
        SessionView,
        QuestionState,
        PublicQuestion,
        Choice,
        QuestionType,
        DisclosureMode,
        ResultSummary,
        DetailView,
        QuestionDetail,
        SessionResult,
        SessionSummary,
    )),
    tags(
        (name = "exams", description = "Entry points keyed by exam"),
        (name = "sessions", description = "Operations on one student's attempt"),
    )
)]
pub struct ApiDoc;

/// Serves the OpenAPI document.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
