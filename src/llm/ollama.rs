use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// Native Ollama API (`/api/chat`, `/api/embed`).
#[derive(Clone)]
pub struct OllamaProvider {
    base_url: String,
    client: Client,
}

impl OllamaProvider {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }
}

fn chat_body(request: &ChatRequest, model_id: &str) -> Value {
    let mut options = Map::new();
    if let Some(t) = request.temperature { options.insert("temperature".to_string(), json!(t)); }
    if let Some(t) = request.top_p { options.insert("top_p".to_string(), json!(t)); }
    if let Some(t) = request.max_tokens { options.insert("num_predict".to_string(), json!(t)); }
    if let Some(s) = request.seed { options.insert("seed".to_string(), json!(s)); }
    if let Some(s) = &request.stop { options.insert("stop".to_string(), json!(s)); }

    json!({
        "model": model_id,
        "messages": request.messages,
        "stream": false,
        "options": Value::Object(options),
    })
}

fn parse_chat_payload(payload: &Value) -> Result<String, ApiError> {
    if let Some(err) = payload["error"].as_str() {
        return Err(ApiError::ModelInvocation(format!("ollama: {}", err)));
    }
    payload["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| ApiError::model("ollama chat response has no message content"))
}

fn parse_embed_payload(payload: &Value) -> Result<Vec<Vec<f32>>, ApiError> {
    if let Some(err) = payload["error"].as_str() {
        return Err(ApiError::ModelInvocation(format!("ollama: {}", err)));
    }
    let rows = payload["embeddings"]
        .as_array()
        .ok_or_else(|| ApiError::model("ollama embed response has no embeddings"))?;

    Ok(rows
        .iter()
        .map(|row| {
            row.as_array()
                .map(|vals| vals.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect())
                .unwrap_or_default()
        })
        .collect())
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = chat_body(&request, model_id);

        let res = self.client.post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::model)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::ModelInvocation(format!("ollama chat error {}: {}", status, text)));
        }

        let payload: Value = res.json().await.map_err(ApiError::model)?;
        parse_chat_payload(&payload)
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/api/embed", self.base_url);

        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let res = self.client.post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::model)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::ModelInvocation(format!("ollama embed error {}: {}", status, text)));
        }

        let payload: Value = res.json().await.map_err(ApiError::model)?;
        parse_embed_payload(&payload)
    }
}
