// src/handlers/sessions.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        session::{DetailView, ResultSummary, SessionKey, SessionResult, SessionView},
        submission::SubmitAnswerRequest,
        user::Requester,
    },
    services::ExamSessionService,
    utils::jwt::Claims,
};

/// Only the student who owns the session may drive it.
fn owned_session(claims: &Claims, student_id: i64, exam_id: i64) -> Result<SessionKey, AppError> {
    match claims.requester()? {
        Requester::Student(id) if id == student_id => Ok(SessionKey::new(student_id, exam_id)),
        _ => Err(AppError::Forbidden("Not your exam session".to_string())),
    }
}

/// Returns the stored outcome of a session.
/// Visible to its student and to teachers/admins.
#[utoipa::path(
    get,
    path = "/api/sessions/{student_id}/{exam_id}",
    params(
        ("student_id" = i64, Path, description = "Student id"),
        ("exam_id" = i64, Path, description = "Exam id"),
    ),
    responses(
        (status = 200, description = "Session outcome", body = SessionResult),
        (status = 403, description = "Another student's session"),
        (status = 404, description = "Session not found"),
    ),
    tag = "sessions"
)]
pub async fn get_result(
    State(service): State<Arc<ExamSessionService>>,
    Extension(claims): Extension<Claims>,
    Path((student_id, exam_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let key = if claims.requester()?.is_privileged() {
        SessionKey::new(student_id, exam_id)
    } else {
        owned_session(&claims, student_id, exam_id)?
    };

    Ok(Json(service.get_result(key).await?))
}

/// Navigates to a question without answering it.
#[utoipa::path(
    get,
    path = "/api/sessions/{student_id}/{exam_id}/questions/{index}",
    params(
        ("student_id" = i64, Path, description = "Student id"),
        ("exam_id" = i64, Path, description = "Exam id"),
        ("index" = i64, Path, description = "Question position, clamped to the exam"),
    ),
    responses(
        (status = 200, description = "View at the requested question", body = SessionView),
        (status = 409, description = "Session already completed"),
        (status = 410, description = "Time ran out"),
    ),
    tag = "sessions"
)]
pub async fn get_question(
    State(service): State<Arc<ExamSessionService>>,
    Extension(claims): Extension<Claims>,
    Path((student_id, exam_id, index)): Path<(i64, i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let key = owned_session(&claims, student_id, exam_id)?;
    Ok(Json(service.get_question(key, index).await?))
}

/// Answers (or clears) one question.
#[utoipa::path(
    post,
    path = "/api/sessions/{student_id}/{exam_id}/answers",
    params(
        ("student_id" = i64, Path, description = "Student id"),
        ("exam_id" = i64, Path, description = "Exam id"),
    ),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Updated view", body = SessionView),
        (status = 400, description = "Invalid payload, or question not in this exam"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session already completed"),
        (status = 410, description = "Time ran out"),
    ),
    tag = "sessions"
)]
pub async fn submit_answer(
    State(service): State<Arc<ExamSessionService>>,
    Extension(claims): Extension<Claims>,
    Path((student_id, exam_id)): Path<(i64, i64)>,
    Json(payload): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let key = owned_session(&claims, student_id, exam_id)?;

    let view = service
        .submit_answer(
            key,
            payload.question_id,
            payload.answer.as_deref(),
            payload.current_question_index,
        )
        .await?;

    Ok(Json(view))
}

/// Records that the student left the exam tab.
#[utoipa::path(
    put,
    path = "/api/sessions/{student_id}/{exam_id}/switch-tab",
    params(
        ("student_id" = i64, Path, description = "Student id"),
        ("exam_id" = i64, Path, description = "Exam id"),
    ),
    responses(
        (status = 200, description = "Recorded"),
        (status = 404, description = "Session not found"),
    ),
    tag = "sessions"
)]
pub async fn switch_tab(
    State(service): State<Arc<ExamSessionService>>,
    Extension(claims): Extension<Claims>,
    Path((student_id, exam_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let key = owned_session(&claims, student_id, exam_id)?;
    service.switch_tab(key).await?;
    Ok(Json(json!({ "recorded": true })))
}

/// Final submit.
#[utoipa::path(
    post,
    path = "/api/sessions/{student_id}/{exam_id}/submit",
    params(
        ("student_id" = i64, Path, description = "Student id"),
        ("exam_id" = i64, Path, description = "Exam id"),
    ),
    responses(
        (status = 200, description = "Graded result", body = ResultSummary),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session already completed"),
    ),
    tag = "sessions"
)]
pub async fn submit_exam(
    State(service): State<Arc<ExamSessionService>>,
    Extension(claims): Extension<Claims>,
    Path((student_id, exam_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let key = owned_session(&claims, student_id, exam_id)?;
    Ok(Json(service.submit_exam(key).await?))
}

/// Graded review. What is revealed depends on who asks.
#[utoipa::path(
    get,
    path = "/api/sessions/{student_id}/{exam_id}/detail",
    params(
        ("student_id" = i64, Path, description = "Student id"),
        ("exam_id" = i64, Path, description = "Exam id"),
    ),
    responses(
        (status = 200, description = "Review", body = DetailView),
        (status = 403, description = "Another student's session"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Attempt not finished yet"),
    ),
    tag = "sessions"
)]
pub async fn get_detail(
    State(service): State<Arc<ExamSessionService>>,
    Extension(claims): Extension<Claims>,
    Path((student_id, exam_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, AppError> {
    let detail = service
        .get_detail(SessionKey::new(student_id, exam_id), claims.requester()?)
        .await?;
    Ok(Json(detail))
}
