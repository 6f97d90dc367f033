//! Process-local RagStore; contents vanish with the process.

use std::cmp::Ordering;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::store::{ChunkSearchResult, RagStore, StoredChunk};
use crate::core::errors::ApiError;
use crate::vector_math::cosine_similarity;

#[derive(Default)]
struct Inner {
    rows: Vec<(StoredChunk, Vec<f32>)>,
    embedding_model: Option<String>,
}

#[derive(Default)]
pub struct MemoryRagStore {
    inner: RwLock<Inner>,
}

impl MemoryRagStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RagStore for MemoryRagStore {
    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ApiError> {
        let mut inner = self.inner.write().await;
        for (chunk, embedding) in items {
            let existing = inner
                .rows
                .iter()
                .position(|(stored, _)| stored.chunk_id == chunk.chunk_id);
            match existing {
                Some(idx) => inner.rows[idx] = (chunk, embedding),
                None => inner.rows.push((chunk, embedding)),
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, ApiError> {
        let inner = self.inner.read().await;
        let mut scored: Vec<ChunkSearchResult> = inner
            .rows
            .iter()
            .filter_map(|(chunk, embedding)| {
                let score = cosine_similarity(query_embedding, embedding).ok()?;
                Some(ChunkSearchResult {
                    chunk: chunk.clone(),
                    score,
                    embedding: embedding.clone(),
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn count(&self) -> Result<usize, ApiError> {
        Ok(self.inner.read().await.rows.len())
    }

    async fn embedding_model(&self) -> Result<Option<String>, ApiError> {
        Ok(self.inner.read().await.embedding_model.clone())
    }

    async fn reindex_with_model(&self, embedding_model: &str) -> Result<(), ApiError> {
        let mut inner = self.inner.write().await;
        inner.rows.clear();
        inner.embedding_model = Some(embedding_model.to_string());
        Ok(())
    }
}
