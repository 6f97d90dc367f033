use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::paths::AppPaths;
use super::settings::{ProviderKind, Settings};
use super::validation::validate_config;
use crate::core::errors::ApiError;

const REDACT_PLACEHOLDER: &str = "****";

const SENSITIVE_PATTERNS: [&str; 8] = [
    "api_key",
    "secret",
    "password",
    "_token",
    "token_",
    "credential",
    "auth_",
    "bearer",
];

const SENSITIVE_WHITELIST: [&str; 3] = ["max_tokens", "tokens", "token_count"];

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        if let Ok(path) = env::var("BLOGCHAT_CONFIG_PATH") {
            return PathBuf::from(path);
        }

        let user_config = self.paths.user_data_dir.join("config.yml");
        if user_config.exists() {
            return user_config;
        }

        self.paths.project_root.join("config.yml")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.paths.secrets_path.clone()
    }

    /// Public config deep-merged with the secrets file.
    pub fn load_config(&self) -> Result<Value, ApiError> {
        let public_config = load_yaml_file(&self.config_path())?;
        let secrets_config = load_yaml_file(&self.secrets_path())?;
        Ok(deep_merge(&public_config, &secrets_config))
    }

    pub fn load_settings(&self) -> Result<Settings, ApiError> {
        let merged = self.load_config()?;
        let mut settings = settings_from_value(&merged)?;
        apply_env_overrides(&mut settings, |key| env::var(key).ok());
        Ok(settings)
    }

    pub fn redact_sensitive_values(&self, value: &Value) -> Value {
        redact_sensitive_values(value)
    }
}

pub fn settings_from_value(config: &Value) -> Result<Settings, ApiError> {
    validate_config(config)?;
    serde_json::from_value(config.clone())
        .map_err(|e| ApiError::InvalidInput(format!("Invalid config: {}", e)))
}

fn apply_env_overrides<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("LLM_BASE_URL").filter(|v| !v.trim().is_empty()) {
        settings.llm.base_url = Some(url);
    } else if settings.llm.provider == ProviderKind::Ollama && settings.llm.base_url.is_none() {
        if let Some(host) = lookup("OLLAMA_HOST").filter(|v| !v.trim().is_empty()) {
            settings.llm.base_url = Some(ollama_url_from_host(&host));
        }
    }

    if let Some(key) = lookup("LLM_API_KEY").filter(|v| !v.is_empty()) {
        settings.llm.api_key = Some(key);
    }

    if let Some(port) = lookup("PORT").and_then(|v| v.parse::<u16>().ok()) {
        settings.server.port = port;
    }
}

fn ollama_url_from_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        return host.to_string();
    }
    if host.contains(':') {
        format!("http://{}", host)
    } else {
        format!("http://{}:11434", host)
    }
}

fn load_yaml_file(path: &Path) -> Result<Value, ApiError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(ApiError::internal)?;
    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let value = serde_yaml::from_str::<Value>(&contents).map_err(|e| {
        ApiError::InvalidInput(format!("Failed to parse {}: {}", path.display(), e))
    })?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ApiError::InvalidInput(format!(
            "{} must contain a mapping at the top level",
            path.display()
        ))),
    }
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}

fn redact_sensitive_values(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) && !val.is_null() {
                    redacted.insert(key.clone(), Value::String(REDACT_PLACEHOLDER.to_string()));
                } else {
                    redacted.insert(key.clone(), redact_sensitive_values(val));
                }
            }
            Value::Object(redacted)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_values).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    if SENSITIVE_WHITELIST
        .iter()
        .any(|allowed| *allowed == key_lower)
    {
        return false;
    }
    SENSITIVE_PATTERNS
        .iter()
        .any(|pattern| key_lower.contains(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service_in(dir: &Path) -> ConfigService {
        let paths = AppPaths::with_dirs(dir.to_path_buf(), dir.join("data"));
        ConfigService::new(Arc::new(paths))
    }

    #[test]
    fn deep_merge_merges_objects_and_overrides_scalars() {
        let base = json!({
            "a": 1,
            "b": { "c": 2, "d": 3 },
            "arr": [1, 2]
        });
        let override_value = json!({
            "b": { "c": 99 },
            "arr": [3],
            "e": "x"
        });

        let merged = deep_merge(&base, &override_value);

        assert_eq!(
            merged,
            json!({
                "a": 1,
                "b": { "c": 99, "d": 3 },
                "arr": [3],
                "e": "x"
            })
        );
    }

    #[test]
    fn redact_sensitive_values_replaces_secrets_only() {
        let input = json!({
            "llm": {
                "api_key": "sk-live",
                "chat_model": "mistral"
            },
            "items": [
                { "password": "pw", "max_tokens": 42 }
            ]
        });

        let redacted = redact_sensitive_values(&input);

        assert_eq!(
            redacted,
            json!({
                "llm": {
                    "api_key": "****",
                    "chat_model": "mistral"
                },
                "items": [
                    { "password": "****", "max_tokens": 42 }
                ]
            })
        );
    }

    #[test]
    fn load_settings_merges_secrets_over_public_config() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        fs::write(
            dir.path().join("config.yml"),
            "persona:\n  blog_name: Rustacean Notes\nllm:\n  provider: openai_compatible\n  chat_model: qwen\nretrieval:\n  result_count: 6\n",
        )
        .unwrap();
        fs::write(service.secrets_path(), "llm:\n  api_key: sk-test\n").unwrap();

        let merged = service.load_config().unwrap();
        let settings = settings_from_value(&merged).unwrap();

        assert_eq!(settings.persona.blog_name, "Rustacean Notes");
        assert_eq!(settings.llm.provider, ProviderKind::OpenaiCompatible);
        assert_eq!(settings.llm.chat_model, "qwen");
        assert_eq!(settings.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.retrieval.result_count, 6);
        assert_eq!(settings.ingest.chunk_size, 1000);
    }

    #[test]
    fn missing_files_load_as_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        assert_eq!(service.load_config().unwrap(), json!({}));
    }

    #[test]
    fn malformed_yaml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());
        fs::write(dir.path().join("config.yml"), "llm: [unclosed").unwrap();
        assert!(matches!(
            service.load_config(),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[test]
    fn env_overrides_resolve_ollama_host() {
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |key| match key {
            "OLLAMA_HOST" => Some("ollama".to_string()),
            "PORT" => Some("9100".to_string()),
            _ => None,
        });
        assert_eq!(settings.llm.base_url.as_deref(), Some("http://ollama:11434"));
        assert_eq!(settings.server.port, 9100);
    }

    #[test]
    fn explicit_base_url_wins_over_ollama_host() {
        let mut settings = Settings::default();
        apply_env_overrides(&mut settings, |key| match key {
            "OLLAMA_HOST" => Some("ollama".to_string()),
            "LLM_BASE_URL" => Some("http://10.0.0.5:11434".to_string()),
            _ => None,
        });
        assert_eq!(settings.llm.base_url.as_deref(), Some("http://10.0.0.5:11434"));
    }

    #[test]
    fn ollama_host_accepts_port_and_scheme() {
        assert_eq!(ollama_url_from_host("gpu:11500"), "http://gpu:11500");
        assert_eq!(ollama_url_from_host("https://llm.example/"), "https://llm.example");
    }
}
