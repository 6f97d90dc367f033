//! RagStore trait: abstract interface for the blog's vector index.
//!
//! Backends: `SqliteRagStore` (persistent) and `MemoryRagStore` (ephemeral).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;

/// Page-level facts attached to every chunk cut from that page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub url: String,
    pub title: String,
    pub description: String,
    pub keywords: String,
}

/// A stored chunk. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// sha256 of `url + "\n" + content`.
    pub chunk_id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Result of a similarity search.
#[derive(Debug, Clone)]
pub struct ChunkSearchResult {
    pub chunk: StoredChunk,
    /// Cosine similarity to the query (higher = better).
    pub score: f32,
    /// The stored vector, needed for diversity re-ranking.
    pub embedding: Vec<f32>,
}

#[async_trait]
pub trait RagStore: Send + Sync {
    /// Insert chunks with their embeddings in one unit of work.
    ///
    /// A chunk whose id already exists replaces the stored row.
    async fn insert_batch(
        &self,
        items: Vec<(StoredChunk, Vec<f32>)>,
    ) -> Result<(), ApiError>;

    /// Up to `limit` chunks most similar to `query_embedding`, best first.
    /// Equal scores keep insertion order.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, ApiError>;

    async fn count(&self) -> Result<usize, ApiError>;

    /// Embedding model the stored vectors were produced with, if recorded.
    async fn embedding_model(&self) -> Result<Option<String>, ApiError>;

    /// Clear all data and record `embedding_model` as the new model.
    ///
    /// Used when the embedding model changes and all vectors are invalidated.
    async fn reindex_with_model(&self, embedding_model: &str) -> Result<(), ApiError>;
}
