use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info};

use super::session::lookup;
use crate::models::chat::{SessionId, StreamUpdate, SubmitMessageRequest};
use crate::state::AppState;
use crate::utils::error::ApiError;

/// Submit user text and stream the reply as SSE.
///
/// Event names follow `StreamUpdate::kind`: `thinking`, then `frame` per
/// fragment, then `completed` or `failed`. A second submission to the same
/// session waits until the first one has finished.
pub async fn submit_message(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<SubmitMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    let session = lookup(&state, session_id)?;

    info!(
        session_id = %session_id,
        message_len = request.message.len(),
        "Chat submission received"
    );

    let guard = session.lock_owned().await;
    debug!(session_id = %session_id, "Session acquired for submission");

    let stream = state
        .streamer
        .clone()
        .submit(guard, request.message)
        .map(|update| Ok(create_sse_event(&update)));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

// Helper: Create SSE event
fn create_sse_event(update: &StreamUpdate) -> Event {
    Event::default()
        .event(update.event_name())
        .data(serde_json::to_string(update).unwrap_or_else(|_| "{}".to_string()))
}
