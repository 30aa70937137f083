use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::models::chat::{SessionId, SessionView, UpdateConfigRequest};
use crate::services::conversation::SharedSession;
use crate::state::AppState;
use crate::utils::error::ApiError;

pub(crate) fn lookup(state: &AppState, session_id: SessionId) -> Result<SharedSession, ApiError> {
    state
        .sessions
        .get(session_id)
        .ok_or_else(|| ApiError::NotFound(format!("Session {} does not exist", session_id)))
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<SessionView>) {
    let session = state
        .sessions
        .create(&state.persona.system_prompt, state.default_session_config());
    let session = session.lock().await;

    info!(session_id = %session.id, active = state.sessions.len(), "Session started");

    (StatusCode::CREATED, Json(session.view(&state.persona)))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, session_id)?;
    let session = session.lock().await;
    Ok(Json(session.view(&state.persona)))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<SessionId>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .remove(session_id)
        .ok_or_else(|| ApiError::NotFound(format!("Session {} does not exist", session_id)))?;

    info!(session_id = %session_id, "Session ended");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<SessionId>,
    Json(request): Json<UpdateConfigRequest>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, session_id)?;
    let mut session = session.lock().await;

    session.update_config(request, &state.persona)?;
    info!(
        session_id = %session_id,
        temperature = session.config.temperature,
        model = %session.config.model,
        language = %session.config.language,
        "Session configuration updated"
    );

    Ok(Json(session.view(&state.persona)))
}

/// Clear the conversation back to the hidden system turn.
pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<SessionId>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, session_id)?;
    let mut session = session.lock().await;

    session.log.reset();
    session.touch();
    info!(session_id = %session_id, "Conversation cleared");

    Ok(Json(session.view(&state.persona)))
}
