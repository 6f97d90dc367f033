use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

/// Message shown to users when a remote dependency fails mid-turn.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong, please try again.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn model<E: std::fmt::Display>(err: E) -> Self {
        ApiError::ModelInvocation(err.to_string())
    }

    pub fn store<E: std::fmt::Display>(err: E) -> Self {
        ApiError::StoreUnavailable(err.to_string())
    }

    /// Short stable name of the error kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::ModelInvocation(_) => "model_invocation",
            ApiError::StoreUnavailable(_) => "store_unavailable",
            ApiError::NotFound(_) => "not_found",
            ApiError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::ModelInvocation(_) => {
                (StatusCode::BAD_GATEWAY, GENERIC_FAILURE_MESSAGE.to_string())
            }
            ApiError::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                GENERIC_FAILURE_MESSAGE.to_string(),
            ),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                GENERIC_FAILURE_MESSAGE.to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
        } else {
            tracing::debug!(kind = self.kind(), error = %self, "request rejected");
        }

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn remote_failures_hide_details_behind_generic_message() {
        let (status, body) =
            body_json(ApiError::ModelInvocation("connection refused".into())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], GENERIC_FAILURE_MESSAGE);

        let (status, body) = body_json(ApiError::store("db locked")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], GENERIC_FAILURE_MESSAGE);
    }

    #[tokio::test]
    async fn invalid_input_keeps_its_message() {
        let (status, body) =
            body_json(ApiError::InvalidInput("question must not be empty".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "question must not be empty");
    }

    #[test]
    fn kind_names_are_stable() {
        assert_eq!(ApiError::model("x").kind(), "model_invocation");
        assert_eq!(ApiError::store("x").kind(), "store_unavailable");
        assert_eq!(ApiError::internal("x").kind(), "internal");
    }
}
