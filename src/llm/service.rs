use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{LlmSettings, ProviderKind};
use crate::core::errors::ApiError;
use crate::llm::ollama::OllamaProvider;
use crate::llm::openai_compat::OpenAiCompatProvider;
use crate::llm::provider::LlmProvider;
use crate::llm::types::{ChatMessage, ChatRequest};

/// Front door to the configured model server.
///
/// Every generation is deterministic (temperature 0 plus a fixed seed) and
/// every remote call is bounded by the configured timeout.
#[derive(Clone)]
pub struct LlmService {
    provider: Arc<dyn LlmProvider>,
    chat_model: String,
    embedding_model: String,
    timeout: Duration,
    seed: u64,
}

impl LlmService {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        chat_model: impl Into<String>,
        embedding_model: impl Into<String>,
        timeout: Duration,
        seed: u64,
    ) -> Self {
        Self {
            provider,
            chat_model: chat_model.into(),
            embedding_model: embedding_model.into(),
            timeout,
            seed,
        }
    }

    pub fn from_settings(settings: &LlmSettings) -> Self {
        let base_url = settings.resolved_base_url();
        let provider: Arc<dyn LlmProvider> = match settings.provider {
            ProviderKind::Ollama => Arc::new(OllamaProvider::new(base_url)),
            ProviderKind::OpenaiCompatible => {
                Arc::new(OpenAiCompatProvider::new(base_url, settings.api_key.clone()))
            }
        };
        Self::new(
            provider,
            settings.chat_model.clone(),
            settings.embedding_model.clone(),
            settings.request_timeout(),
            settings.seed,
        )
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub async fn health_check(&self) -> bool {
        match tokio::time::timeout(self.timeout, self.provider.health_check()).await {
            Ok(Ok(healthy)) => healthy,
            _ => false,
        }
    }

    /// Run one deterministic chat completion and return the trimmed reply.
    pub async fn generate(&self, messages: Vec<ChatMessage>) -> Result<String, ApiError> {
        let request = ChatRequest::new(messages).deterministic(self.seed);

        let started = std::time::Instant::now();
        let reply = tokio::time::timeout(self.timeout, self.provider.chat(request, &self.chat_model))
            .await
            .map_err(|_| {
                ApiError::ModelInvocation(format!(
                    "chat model '{}' timed out after {}s",
                    self.chat_model,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(into_model_error)?;

        tracing::debug!(
            provider = self.provider.name(),
            model = %self.chat_model,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "chat completion finished"
        );

        Ok(reply.trim().to_string())
    }

    /// Embed `inputs` with the embedding model, one vector per input.
    pub async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = tokio::time::timeout(
            self.timeout,
            self.provider.embed(inputs, &self.embedding_model),
        )
        .await
        .map_err(|_| {
            ApiError::ModelInvocation(format!(
                "embedding model '{}' timed out after {}s",
                self.embedding_model,
                self.timeout.as_secs()
            ))
        })?
        .map_err(into_model_error)?;

        if vectors.len() != inputs.len() {
            return Err(ApiError::ModelInvocation(format!(
                "embedding model returned {} vectors for {} inputs",
                vectors.len(),
                inputs.len()
            )));
        }
        if vectors.iter().any(|v| v.is_empty()) {
            return Err(ApiError::model("embedding model returned an empty vector"));
        }

        Ok(vectors)
    }
}

fn into_model_error(err: ApiError) -> ApiError {
    match err {
        ApiError::ModelInvocation(_) => err,
        other => ApiError::ModelInvocation(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::ScriptedProvider;

    #[tokio::test]
    async fn generate_is_deterministic_and_trimmed() {
        let provider = Arc::new(ScriptedProvider::new(|request| {
            assert!(request.is_deterministic());
            Ok("  answer \n".to_string())
        }));
        let service = LlmService::new(provider.clone(), "chat", "embed", Duration::from_secs(5), 9);

        let reply = service.generate(vec![ChatMessage::user("q")]).await.unwrap();
        assert_eq!(reply, "answer");
        assert_eq!(provider.chat_calls(), 1);
    }

    #[tokio::test]
    async fn provider_failures_become_model_errors() {
        let provider = Arc::new(ScriptedProvider::new(|_| Err(ApiError::internal("socket closed"))));
        let service = LlmService::new(provider, "chat", "embed", Duration::from_secs(5), 0);

        let err = service.generate(vec![ChatMessage::user("q")]).await.unwrap_err();
        assert!(matches!(err, ApiError::ModelInvocation(_)));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let provider = Arc::new(ScriptedProvider::new(|_| Ok("late".to_string()))
            .with_delay(Duration::from_millis(200)));
        let service = LlmService::new(provider, "chat", "embed", Duration::from_millis(20), 0);

        let err = service.generate(vec![ChatMessage::user("q")]).await.unwrap_err();
        assert!(matches!(err, ApiError::ModelInvocation(ref m) if m.contains("timed out")));
    }

    #[tokio::test]
    async fn embed_returns_one_vector_per_input() {
        let provider = Arc::new(ScriptedProvider::new(|_| Ok(String::new())));
        let service = LlmService::new(provider, "chat", "embed", Duration::from_secs(5), 0);

        let inputs = vec!["kubernetes pods".to_string(), "rust traits".to_string()];
        let vectors = service.embed(&inputs).await.unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(service.embed(&[]).await.unwrap().is_empty());
    }
}
