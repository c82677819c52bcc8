use std::sync::Arc;

use crate::config::Config;
use crate::services::ExamSessionService;
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<ExamSessionService>,
    pub config: Config,
}

impl FromRef<AppState> for Arc<ExamSessionService> {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
