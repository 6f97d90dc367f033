use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DeleteSessionQuery {
    /// Also erase the durable history.
    #[serde(default)]
    pub purge: bool,
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = match &state.history {
        Some(store) => store.list_sessions().await?,
        None => Vec::new(),
    };
    Ok(Json(json!({ "sessions": sessions })))
}

pub async fn create_session(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let (session_id, _) = state.sessions.create().await?;
    Ok((StatusCode::CREATED, Json(json!({ "session_id": session_id }))))
}

pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.sessions.get(&session_id).await?;
    let session = session.lock().await;
    Ok(Json(json!({
        "session_id": session_id,
        "turns": session.history().turns(),
    })))
}

pub async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(query): Query<DeleteSessionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.sessions.remove(&session_id, query.purge).await? {
        return Err(ApiError::NotFound("Session not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}
