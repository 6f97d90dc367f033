//! In-process model double for tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::ApiError;

pub const EMBEDDING_DIMS: usize = 64;

type ChatScript = dyn Fn(&ChatRequest) -> Result<String, ApiError> + Send + Sync;

/// Answers chat calls through a closure and embeds text as a hashed
/// bag of words, so texts sharing words land close together.
pub struct ScriptedProvider {
    script: Box<ChatScript>,
    delay: Option<Duration>,
    chat_calls: AtomicUsize,
    embed_calls: AtomicUsize,
    fail_embed: AtomicBool,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&ChatRequest) -> Result<String, ApiError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            delay: None,
            chat_calls: AtomicUsize::new(0),
            embed_calls: AtomicUsize::new(0),
            fail_embed: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replies with the same text to every chat call.
    pub fn constant(reply: &str) -> Self {
        let reply = reply.to_string();
        Self::new(move |_| Ok(reply.clone()))
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_embed_failure(&self, fail: bool) {
        self.fail_embed.store(fail, Ordering::SeqCst);
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn hashed_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIMS];
    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
    {
        let word = word.to_lowercase();
        // FNV-1a
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in word.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        vector[(hash % EMBEDDING_DIMS as u64) as usize] += 1.0;
    }
    vector
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        Ok(true)
    }

    async fn chat(&self, request: ChatRequest, _model_id: &str) -> Result<String, ApiError> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.requests.lock().unwrap().push(request.clone());
        (self.script)(&request)
    }

    async fn embed(&self, inputs: &[String], _model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_embed.load(Ordering::SeqCst) {
            return Err(ApiError::model("embedding server unreachable"));
        }
        Ok(inputs.iter().map(|text| hashed_embedding(text)).collect())
    }
}
