use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let model_reachable = state.llm.health_check().await;
    let chunks = match state.documents.count().await {
        Ok(count) => Some(count),
        Err(e) => {
            tracing::warn!(error = %e, "document store unavailable during health check");
            None
        }
    };

    let status = if model_reachable && chunks.is_some() {
        "ok"
    } else {
        "degraded"
    };

    Json(json!({
        "status": status,
        "provider": state.llm.provider_name(),
        "model_reachable": model_reachable,
        "chunks": chunks,
        "blog": state.settings.persona.blog_name,
    }))
}
