use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::ApiError;

/// Any server speaking the OpenAI `/v1/chat/completions` dialect
/// (LM Studio, llama.cpp server, vLLM, hosted APIs).
#[derive(Clone)]
pub struct OpenAiCompatProvider {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

impl OpenAiCompatProvider {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client: Client::new(),
        }
    }

    /// Resolve an endpoint whether or not the base URL already ends in `/v1`.
    fn endpoint(&self, path: &str) -> String {
        if self.base_url.ends_with("/v1") {
            format!("{}/{}", self.base_url, path)
        } else {
            format!("{}/v1/{}", self.base_url, path)
        }
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let req = self.client.post(url);
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }
}

fn chat_body(request: &ChatRequest, model_id: &str) -> Value {
    let mut body = json!({
        "model": model_id,
        "messages": request.messages,
        "stream": false,
    });

    if let Some(obj) = body.as_object_mut() {
        if let Some(t) = request.temperature { obj.insert("temperature".to_string(), json!(t)); }
        if let Some(t) = request.top_p { obj.insert("top_p".to_string(), json!(t)); }
        if let Some(t) = request.max_tokens { obj.insert("max_tokens".to_string(), json!(t)); }
        if let Some(s) = request.seed { obj.insert("seed".to_string(), json!(s)); }
        if let Some(s) = &request.stop { obj.insert("stop".to_string(), json!(s)); }
    }

    body
}

fn parse_chat_payload(payload: &Value) -> Result<String, ApiError> {
    payload["choices"]
        .get(0)
        .and_then(|c| c["message"]["content"].as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| ApiError::model("chat completion response has no message content"))
}

fn parse_embed_payload(payload: &Value) -> Result<Vec<Vec<f32>>, ApiError> {
    let data = payload["data"]
        .as_array()
        .ok_or_else(|| ApiError::model("embedding response has no data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let vals = item["embedding"]
            .as_array()
            .ok_or_else(|| ApiError::model("embedding entry has no vector"))?;
        let vec: Vec<f32> = vals.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect();
        let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(position);
        indexed.push((index, vec));
    }

    // servers may answer out of order; `index` is authoritative
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

#[async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        "openai_compatible"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = self.endpoint("models");
        let mut req = self.client.get(&url);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        match req.send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let url = self.endpoint("chat/completions");
        let body = chat_body(&request, model_id);

        let res = self.post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::model)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::ModelInvocation(format!("chat error {}: {}", status, text)));
        }

        let payload: Value = res.json().await.map_err(ApiError::model)?;
        parse_chat_payload(&payload)
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = self.endpoint("embeddings");

        let body = json!({
            "model": model_id,
            "input": inputs,
        });

        let res = self.post(&url)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::model)?;

        if !res.status().is_success() {
            let status = res.status();
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::ModelInvocation(format!("embed error {}: {}", status, text)));
        }

        let payload: Value = res.json().await.map_err(ApiError::model)?;
        parse_embed_payload(&payload)
    }
}
