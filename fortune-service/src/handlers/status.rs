use crate::models::StatusReport;
use crate::startup::AppState;
use axum::{extract::State, Json};

pub async fn ollama_status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.chat.status().await)
}
