//! Serializes retrieved chunks into the context block of the answer prompt.

use serde::{Deserialize, Serialize};

use super::document_store::RetrievalResult;

/// Configuration for context building.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextBuilderConfig {
    /// Maximum total context length in characters
    pub max_context_length: usize,
    /// Whether to number chunks and show their relevance
    pub include_citations: bool,
}

impl Default for ContextBuilderConfig {
    fn default() -> Self {
        Self {
            max_context_length: 8000,
            include_citations: true,
        }
    }
}

/// Prompt text plus the chunks that made it into the text.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltContext {
    pub text: String,
    pub used: RetrievalResult,
}

pub struct ContextBuilder {
    config: ContextBuilderConfig,
}

impl ContextBuilder {
    pub fn new(config: ContextBuilderConfig) -> Self {
        Self { config }
    }

    /// Format chunks as title + URL + text, in retrieval order.
    ///
    /// The first chunk is always included; later chunks stop once the
    /// length budget would be exceeded. `used` is the kept prefix.
    pub fn build(&self, result: &RetrievalResult) -> BuiltContext {
        let mut context = String::new();
        let mut current_length = 0;
        let mut kept = 0;

        for (i, retrieved) in result.iter().enumerate() {
            let meta = &retrieved.chunk.metadata;
            let block = if self.config.include_citations {
                format!(
                    "[{}] (relevance: {:.2})\nTitle: {}\nURL: {}\n{}\n\n",
                    i + 1,
                    retrieved.score,
                    meta.title,
                    meta.url,
                    retrieved.chunk.content
                )
            } else {
                format!(
                    "Title: {}\nURL: {}\n{}\n\n",
                    meta.title, meta.url, retrieved.chunk.content
                )
            };

            let addition_length = block.chars().count();
            if i > 0 && current_length + addition_length > self.config.max_context_length {
                tracing::debug!(kept = i, total = result.len(), "context truncated");
                break;
            }

            context.push_str(&block);
            current_length += addition_length;
            kept += 1;
        }

        BuiltContext {
            text: context.trim().to_string(),
            used: result.prefix(kept),
        }
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(ContextBuilderConfig::default())
    }
}
