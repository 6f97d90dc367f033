use serde_json::{Map, Value};

use crate::core::errors::ApiError;

const PROVIDERS: [&str; 2] = ["ollama", "openai_compatible"];
const STORE_BACKENDS: [&str; 2] = ["sqlite", "memory"];

pub fn validate_config(config: &Value) -> Result<(), ApiError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(persona) = expect_optional_object(root, "persona")? {
        for key in ["blog_name", "blog_writer", "blog_url", "contact_info"] {
            validate_optional_string_field(persona, &format!("persona.{}", key), key)?;
        }
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_enum_field(llm, "llm.provider", "provider", &PROVIDERS)?;
        validate_optional_string_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.chat_model", "chat_model")?;
        validate_optional_string_field(llm, "llm.embedding_model", "embedding_model")?;
        validate_u64_field(
            llm,
            "llm.request_timeout_secs",
            "request_timeout_secs",
            1,
            86_400,
        )?;
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_u64_field(retrieval, "retrieval.result_count", "result_count", 1, 100)?;
        validate_u64_field(retrieval, "retrieval.fetch_count", "fetch_count", 1, 1_000)?;
        validate_u64_field(
            retrieval,
            "retrieval.max_context_chars",
            "max_context_chars",
            200,
            1_000_000,
        )?;
        validate_optional_f64_field(retrieval, "retrieval.mmr_lambda", "mmr_lambda", 0.0, 1.0)?;
        validate_optional_f64_field(
            retrieval,
            "retrieval.score_threshold",
            "score_threshold",
            -1.0,
            1.0,
        )?;
    }

    if let Some(ingest) = expect_optional_object(root, "ingest")? {
        validate_bool_field(ingest, "ingest.on_startup", "on_startup")?;
        validate_u64_field(ingest, "ingest.chunk_size", "chunk_size", 50, 100_000)?;
        validate_u64_field(ingest, "ingest.chunk_overlap", "chunk_overlap", 0, 99_999)?;
        validate_u64_field(
            ingest,
            "ingest.max_concurrent_fetches",
            "max_concurrent_fetches",
            1,
            64,
        )?;
        validate_u64_field(
            ingest,
            "ingest.request_delay_ms",
            "request_delay_ms",
            0,
            600_000,
        )?;
        validate_u64_field(
            ingest,
            "ingest.fetch_timeout_secs",
            "fetch_timeout_secs",
            1,
            86_400,
        )?;

        let size = ingest.get("chunk_size").and_then(Value::as_u64).unwrap_or(1000);
        let overlap = ingest.get("chunk_overlap").and_then(Value::as_u64).unwrap_or(200);
        if overlap >= size {
            return Err(ApiError::InvalidInput(format!(
                "Invalid config at 'ingest.chunk_overlap': must be smaller than chunk_size ({})",
                size
            )));
        }
    }

    if let Some(store) = expect_optional_object(root, "store")? {
        validate_enum_field(store, "store.backend", "backend", &STORE_BACKENDS)?;
        validate_optional_string_field(store, "store.path", "path")?;
    }

    if let Some(history) = expect_optional_object(root, "history")? {
        validate_bool_field(history, "history.persist", "persist")?;
        validate_optional_string_field(history, "history.path", "path")?;
    }

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_optional_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65_535)?;
        validate_string_array_field(
            server,
            "server.cors_allowed_origins",
            "cors_allowed_origins",
        )?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ApiError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(ApiError::InvalidInput(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

/// A missing key or an explicit `null` both pass.
fn validate_optional_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(ApiError::InvalidInput(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key).filter(|v| !v.is_null()) else {
        return Ok(());
    };
    if value.as_str().is_none() {
        return Err(config_type_error(path, "string"));
    }
    Ok(())
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if !allowed.contains(&text) {
        return Err(ApiError::InvalidInput(format!(
            "Invalid config at '{}': expected one of {}",
            path,
            allowed.join(", ")
        )));
    }
    Ok(())
}

fn validate_string_array_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ApiError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(items) = value.as_array() else {
        return Err(config_type_error(path, "array of strings"));
    };
    for (index, item) in items.iter().enumerate() {
        let Some(text) = item.as_str() else {
            return Err(config_type_error(&format!("{}[{}]", path, index), "string"));
        };
        if text.trim().is_empty() {
            return Err(ApiError::InvalidInput(format!(
                "Invalid config at '{}[{}]': value cannot be empty",
                path, index
            )));
        }
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> ApiError {
    ApiError::InvalidInput(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_a_complete_config() {
        let config = json!({
            "persona": { "blog_name": "TechNibbana", "contact_info": "nitesh@technibbana.com" },
            "llm": { "provider": "ollama", "request_timeout_secs": 60 },
            "retrieval": { "result_count": 4, "fetch_count": 20, "mmr_lambda": 0.7 },
            "ingest": { "chunk_size": 1000, "chunk_overlap": 200, "on_startup": true },
            "store": { "backend": "memory" },
            "server": { "port": 8000, "cors_allowed_origins": ["http://localhost:5173"] }
        });
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = validate_config(&json!({ "llm": { "provider": "chroma" } })).unwrap_err();
        assert!(err.to_string().contains("llm.provider"));
    }

    #[test]
    fn rejects_lambda_out_of_range_but_allows_null() {
        assert!(validate_config(&json!({ "retrieval": { "mmr_lambda": 1.5 } })).is_err());
        assert!(validate_config(&json!({ "retrieval": { "mmr_lambda": null } })).is_ok());
    }

    #[test]
    fn rejects_tiny_context_budget() {
        let err = validate_config(&json!({ "retrieval": { "max_context_chars": 10 } })).unwrap_err();
        assert!(err.to_string().contains("retrieval.max_context_chars"));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        let err = validate_config(&json!({
            "ingest": { "chunk_size": 100, "chunk_overlap": 100 }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("chunk_overlap"));
    }

    #[test]
    fn rejects_non_object_sections() {
        let err = validate_config(&json!({ "server": "localhost" })).unwrap_err();
        assert!(err.to_string().contains("expected object"));
    }
}
