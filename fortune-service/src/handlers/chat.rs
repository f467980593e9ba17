use crate::models::{ChatReply, ChatRequest};
use crate::startup::AppState;
use axum::{
    extract::State,
    http::{header, HeaderName},
    response::{
        sse::{Event, Sse},
        IntoResponse,
    },
    Json,
};
use futures::StreamExt;
use service_core::error::AppError;
use validator::Validate;

/// Asks reverse proxies such as nginx not to buffer the event stream.
const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// `POST /api/chat`. Upstream failures come back as the reply text, with 200.
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatReply>, AppError> {
    request.validate()?;

    tracing::info!(
        lot_id = request.lot.id,
        history_len = request.history.len(),
        "Chat request"
    );

    let reply = state.chat.reply(&request).await;
    Ok(Json(ChatReply { reply }))
}

/// `POST /api/chat/stream`. Relays model output as server-sent events.
pub async fn chat_stream(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<impl IntoResponse, AppError> {
    request.validate()?;

    tracing::info!(
        lot_id = request.lot.id,
        history_len = request.history.len(),
        "Chat stream request"
    );

    let events = state
        .chat
        .stream(&request)
        .await
        .map(|event| Event::default().json_data(event));

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (X_ACCEL_BUFFERING, "no"),
        ],
        Sse::new(events),
    ))
}
