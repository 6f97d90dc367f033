use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::chat::validate_question;
use crate::core::errors::ApiError;
use crate::rag::SourceRef;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatPayload {
    pub session_id: Option<String>,
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub session_id: String,
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatPayload>,
) -> Result<impl IntoResponse, ApiError> {
    // reject before a session is created or any model is called
    let question = validate_question(&payload.question)?;

    let (session_id, session) = match payload.session_id {
        Some(id) => {
            let session = state.sessions.get(&id).await?;
            (id, session)
        }
        None => state.sessions.create().await?,
    };

    let turn = session.lock().await.ask(question).await?;

    Ok(Json(ChatReply {
        session_id,
        answer: turn.answer,
        sources: turn.sources.sources(),
    }))
}
