use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct IngestPayload {
    /// Pages to ingest; the configured blog's sitemap when absent.
    pub urls: Option<Vec<String>>,
}

pub async fn ingest(
    State(state): State<Arc<AppState>>,
    payload: Option<Json<IngestPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = payload.map(|Json(p)| p).unwrap_or_default();

    let report = match payload.urls {
        Some(urls) => {
            if urls.iter().any(|u| url::Url::parse(u).is_err()) {
                return Err(ApiError::InvalidInput("urls must be absolute URLs".to_string()));
            }
            state.ingestion.ingest_urls(urls).await?
        }
        None => {
            state
                .ingestion
                .ingest_site(&state.settings.persona.blog_url)
                .await?
        }
    };

    Ok(Json(report))
}
