// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post, put},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    docs,
    handlers::{exams, sessions},
    state::AppState,
    utils::jwt::{auth_middleware, privileged_middleware},
};

/// Assembles the main application router.
///
/// * Student and review routes sit behind `auth_middleware`.
/// * Monitoring routes additionally require a teacher/admin token.
/// * Applies global middleware (Trace, CORS).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let exam_routes = Router::new()
        .route("/{exam_id}/start", post(exams::start_exam))
        .merge(
            Router::new()
                .route("/{exam_id}/sessions", get(exams::list_sessions))
                .layer(middleware::from_fn(privileged_middleware)),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let session_routes = Router::new()
        .route("/{student_id}/{exam_id}", get(sessions::get_result))
        .route(
            "/{student_id}/{exam_id}/questions/{index}",
            get(sessions::get_question),
        )
        .route("/{student_id}/{exam_id}/answers", post(sessions::submit_answer))
        .route("/{student_id}/{exam_id}/switch-tab", put(sessions::switch_tab))
        .route("/{student_id}/{exam_id}/submit", post(sessions::submit_exam))
        .route("/{student_id}/{exam_id}/detail", get(sessions::get_detail))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .nest("/api/exams", exam_routes)
        .nest("/api/sessions", session_routes)
        .route("/api/openapi.json", get(docs::openapi_json))
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
