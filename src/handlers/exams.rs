// src/handlers/exams.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        session::{SessionSummary, SessionView, StartExamRequest},
        user::Requester,
    },
    services::ExamSessionService,
    utils::jwt::Claims,
};

/// Starts the exam for the calling student, or resumes their attempt.
///
/// The student id always comes from the token, never from the request.
#[utoipa::path(
    post,
    path = "/api/exams/{exam_id}/start",
    params(("exam_id" = i64, Path, description = "Exam id")),
    request_body = StartExamRequest,
    responses(
        (status = 200, description = "Session started or resumed", body = SessionView),
        (status = 403, description = "Not enrolled, or wrong exam password"),
        (status = 404, description = "Exam not found"),
        (status = 409, description = "Outside the exam window, or already completed"),
        (status = 410, description = "Time ran out; the session is now completed"),
    ),
    tag = "exams"
)]
pub async fn start_exam(
    State(service): State<Arc<ExamSessionService>>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
    Json(payload): Json<StartExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let Requester::Student(student_id) = claims.requester()? else {
        return Err(AppError::Forbidden("Only students can take exams".to_string()));
    };

    let view = service
        .start_exam(exam_id, student_id, &payload.password)
        .await?;

    Ok(Json(view))
}

/// Lists every attempt at an exam.
/// Teacher/admin only.
#[utoipa::path(
    get,
    path = "/api/exams/{exam_id}/sessions",
    params(("exam_id" = i64, Path, description = "Exam id")),
    responses(
        (status = 200, description = "Sessions ordered by student id", body = [SessionSummary]),
        (status = 403, description = "Requester is not a teacher or admin"),
        (status = 404, description = "Exam not found"),
    ),
    tag = "exams"
)]
pub async fn list_sessions(
    State(service): State<Arc<ExamSessionService>>,
    Extension(claims): Extension<Claims>,
    Path(exam_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let sessions = service.list_sessions(exam_id, claims.requester()?).await?;
    Ok(Json(sessions))
}
