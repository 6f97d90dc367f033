//! Typed view over the merged YAML configuration.
//!
//! Every section is optional in `config.yml`; missing keys fall back to the
//! `Default` impls below.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chat::Persona;
use crate::rag::{ContextBuilderConfig, QueryOptions};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub persona: Persona,
    pub llm: LlmSettings,
    pub retrieval: RetrievalSettings,
    pub ingest: IngestSettings,
    pub store: StoreSettings,
    pub history: HistorySettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Ollama,
    OpenaiCompatible,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    /// Overrides the provider's default endpoint.
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub chat_model: String,
    pub embedding_model: String,
    pub request_timeout_secs: u64,
    /// Fixed sampling seed so zero-temperature generations repeat exactly.
    pub seed: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            base_url: None,
            api_key: None,
            chat_model: "mistral".to_string(),
            embedding_model: "mistral".to_string(),
            request_timeout_secs: 120,
            seed: 42,
        }
    }
}

impl LlmSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn resolved_base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/').to_string();
        }
        match self.provider {
            ProviderKind::Ollama => "http://localhost:11434".to_string(),
            ProviderKind::OpenaiCompatible => "http://localhost:1234".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub result_count: usize,
    pub fetch_count: usize,
    /// `None` disables diversity re-ranking.
    pub mmr_lambda: Option<f32>,
    pub score_threshold: f32,
    /// Character budget for the context block of the answer prompt.
    pub max_context_chars: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            result_count: 4,
            fetch_count: 20,
            mmr_lambda: Some(0.5),
            score_threshold: 0.0,
            max_context_chars: 8000,
        }
    }
}

impl RetrievalSettings {
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions {
            result_count: self.result_count,
            fetch_count: self.fetch_count,
            mmr_lambda: self.mmr_lambda,
            score_threshold: self.score_threshold,
        }
    }

    pub fn context_builder_config(&self) -> ContextBuilderConfig {
        ContextBuilderConfig {
            max_context_length: self.max_context_chars,
            ..ContextBuilderConfig::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub on_startup: bool,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_concurrent_fetches: usize,
    pub request_delay_ms: u64,
    pub fetch_timeout_secs: u64,
    pub max_pages: Option<usize>,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            on_startup: false,
            chunk_size: 1000,
            chunk_overlap: 200,
            max_concurrent_fetches: 4,
            request_delay_ms: 0,
            fetch_timeout_secs: 30,
            max_pages: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    pub persist: bool,
    pub path: Option<PathBuf>,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            persist: true,
            path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            cors_allowed_origins: Vec::new(),
        }
    }
}
