//! Document store adapter: the text-level face of the vector index.
//!
//! Callers hand it chunks and query strings; it owns embedding, chunk ids
//! and diversity re-ranking.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::engine::TextChunk;
use super::mmr::select_mmr;
use super::store::{ChunkSearchResult, RagStore, StoredChunk};
use crate::core::errors::ApiError;
use crate::llm::LlmService;

/// Texts embedded per provider call during `add`.
const EMBED_BATCH_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub result_count: usize,
    /// Nearest candidates considered before re-ranking.
    pub fetch_count: usize,
    /// `None` means plain similarity order.
    pub mmr_lambda: Option<f32>,
    /// Candidates scoring below this are dropped.
    pub score_threshold: f32,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            result_count: 4,
            fetch_count: 20,
            mmr_lambda: Some(0.5),
            score_threshold: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub chunk: StoredChunk,
    pub score: f32,
}

/// Ordered chunks for one query, in relevance/MMR order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RetrievalResult(Vec<RetrievedChunk>);

/// A page cited by an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub url: String,
    pub title: String,
}

impl RetrievalResult {
    pub fn new(chunks: Vec<RetrievedChunk>) -> Self {
        Self(chunks)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RetrievedChunk> {
        self.0.iter()
    }

    /// The first `n` chunks.
    pub fn prefix(&self, n: usize) -> Self {
        Self(self.0.iter().take(n).cloned().collect())
    }

    /// Distinct pages behind the chunks, first occurrence wins.
    pub fn sources(&self) -> Vec<SourceRef> {
        let mut seen = HashSet::new();
        self.0
            .iter()
            .filter(|r| seen.insert(r.chunk.metadata.url.clone()))
            .map(|r| SourceRef {
                url: r.chunk.metadata.url.clone(),
                title: r.chunk.metadata.title.clone(),
            })
            .collect()
    }
}

pub fn chunk_id(url: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hasher.update(b"\n");
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
pub struct DocumentStore {
    store: Arc<dyn RagStore>,
    llm: LlmService,
}

impl DocumentStore {
    pub fn new(store: Arc<dyn RagStore>, llm: LlmService) -> Self {
        Self { store, llm }
    }

    /// Clear the index if it was built with another embedding model.
    ///
    /// Returns true when a reset happened.
    pub async fn ensure_embedding_model(&self) -> Result<bool, ApiError> {
        let wanted = self.llm.embedding_model();
        match self.store.embedding_model().await? {
            Some(recorded) if recorded == wanted => Ok(false),
            recorded => {
                if let Some(previous) = &recorded {
                    tracing::warn!(
                        previous = %previous,
                        current = %wanted,
                        "embedding model changed, clearing index"
                    );
                }
                self.store.reindex_with_model(wanted).await?;
                Ok(recorded.is_some())
            }
        }
    }

    /// Embed and store `chunks`. Returns the number of chunks written.
    pub async fn add(&self, chunks: Vec<TextChunk>) -> Result<usize, ApiError> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut items = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.llm.embed(&texts).await?;
            for (chunk, vector) in batch.iter().zip(vectors) {
                let stored = StoredChunk {
                    chunk_id: chunk_id(&chunk.metadata.url, &chunk.text),
                    content: chunk.text.clone(),
                    metadata: chunk.metadata.clone(),
                };
                items.push((stored, vector));
            }
        }

        let written = items.len();
        self.store.insert_batch(items).await?;
        Ok(written)
    }

    /// Chunks relevant to `text`, diversified when `mmr_lambda` is set.
    ///
    /// An empty store or nothing above the threshold yields an empty result.
    /// Failing to embed the query is reported as `StoreUnavailable`.
    pub async fn query(&self, text: &str, options: &QueryOptions) -> Result<RetrievalResult, ApiError> {
        if options.result_count == 0 || self.store.count().await? == 0 {
            return Ok(RetrievalResult::empty());
        }

        let query_embedding = self
            .llm
            .embed(&[text.to_string()])
            .await
            .map_err(|e| ApiError::StoreUnavailable(format!("query embedding failed: {}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::store("query embedding missing"))?;

        let fetch = options.fetch_count.max(options.result_count);
        let candidates: Vec<ChunkSearchResult> = self
            .store
            .search(&query_embedding, fetch)
            .await?
            .into_iter()
            .filter(|c| c.score >= options.score_threshold)
            .collect();

        let picked: Vec<usize> = match options.mmr_lambda {
            Some(lambda) => select_mmr(&candidates, options.result_count, lambda),
            None => (0..candidates.len().min(options.result_count)).collect(),
        };

        let chunks = picked
            .into_iter()
            .map(|idx| RetrievedChunk {
                chunk: candidates[idx].chunk.clone(),
                score: candidates[idx].score,
            })
            .collect();

        Ok(RetrievalResult::new(chunks))
    }

    pub async fn count(&self) -> Result<usize, ApiError> {
        self.store.count().await
    }
}
