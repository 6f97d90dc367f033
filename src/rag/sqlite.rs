//! SQLite-backed RAG store implementation.
//!
//! In-process vector store using SQLite for rows and
//! brute-force cosine similarity for search.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{ChunkMetadata, ChunkSearchResult, RagStore, StoredChunk};
use crate::core::errors::ApiError;
use crate::vector_math::cosine_similarity;

pub struct SqliteRagStore {
    pool: SqlitePool,
}

impl SqliteRagStore {
    pub async fn with_path(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(ApiError::store)?;

        tracing::info!(path = %db_path.display(), "rag store opened");
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_chunks (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                url TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                keywords TEXT NOT NULL DEFAULT '',
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::store)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_rag_url ON rag_chunks(url)")
            .execute(&self.pool)
            .await
            .map_err(ApiError::store)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rag_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::store)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> StoredChunk {
        StoredChunk {
            chunk_id: row.get("chunk_id"),
            content: row.get("content"),
            metadata: ChunkMetadata {
                url: row.get("url"),
                title: row.get("title"),
                description: row.get("description"),
                keywords: row.get("keywords"),
            },
        }
    }
}

#[async_trait]
impl RagStore for SqliteRagStore {
    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ApiError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await.map_err(ApiError::store)?;

        for (chunk, embedding) in &items {
            let blob = Self::serialize_embedding(embedding);

            sqlx::query(
                "INSERT OR REPLACE INTO rag_chunks (chunk_id, content, url, title, description, keywords, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.content)
            .bind(&chunk.metadata.url)
            .bind(&chunk.metadata.title)
            .bind(&chunk.metadata.description)
            .bind(&chunk.metadata.keywords)
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::store)?;
        }

        tx.commit().await.map_err(ApiError::store)?;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, ApiError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT chunk_id, content, url, title, description, keywords, embedding
             FROM rag_chunks
             ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::store)?;

        let mut scored: Vec<ChunkSearchResult> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let embedding = Self::deserialize_embedding(&embedding_bytes);
                // vectors from another model have another width
                let score = cosine_similarity(query_embedding, &embedding).ok()?;

                Some(ChunkSearchResult {
                    chunk: Self::row_to_chunk(row),
                    score,
                    embedding,
                })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);

        Ok(scored)
    }

    async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rag_chunks")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::store)?;

        Ok(count as usize)
    }

    async fn embedding_model(&self) -> Result<Option<String>, ApiError> {
        sqlx::query_scalar("SELECT value FROM rag_meta WHERE key = 'embedding_model'")
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::store)
    }

    async fn reindex_with_model(&self, embedding_model: &str) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::store)?;

        sqlx::query("DELETE FROM rag_chunks")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::store)?;

        sqlx::query(
            "INSERT OR REPLACE INTO rag_meta (key, value, updated_at)
             VALUES ('embedding_model', ?1, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(embedding_model)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::store)?;

        tx.commit().await.map_err(ApiError::store)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store(dir: &tempfile::TempDir) -> SqliteRagStore {
        SqliteRagStore::with_path(dir.path().join("rag.db")).await.unwrap()
    }

    fn make_chunk(id: &str, content: &str, url: &str) -> StoredChunk {
        StoredChunk {
            chunk_id: id.to_string(),
            content: content.to_string(),
            metadata: ChunkMetadata {
                url: url.to_string(),
                title: "Post".to_string(),
                description: "Post".to_string(),
                keywords: String::new(),
            },
        }
    }

    #[tokio::test]
    async fn insert_and_search() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        let embedding = vec![1.0, 0.0, 0.0];
        store
            .insert_batch(vec![
                (make_chunk("c1", "Hello world", "https://blog/a"), embedding.clone()),
                (make_chunk("c2", "Unrelated", "https://blog/b"), vec![0.0, 1.0, 0.0]),
            ])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        let results = store.search(&embedding, 10).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.chunk_id, "c1");
        assert_eq!(results[0].chunk.metadata.url, "https://blog/a");
        assert!(results[0].score > 0.99);
        assert_eq!(results[0].embedding, embedding);

        assert_eq!(store.search(&embedding, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_id_replaces_row() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;

        store
            .insert_batch(vec![(make_chunk("c1", "v1", "u"), vec![1.0])])
            .await
            .unwrap();
        store
            .insert_batch(vec![(make_chunk("c1", "v1", "u"), vec![1.0])])
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rows_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = test_store(&dir).await;
            store
                .insert_batch(vec![(make_chunk("c1", "persisted", "u"), vec![0.5, 0.5])])
                .await
                .unwrap();
        }
        let reopened = test_store(&dir).await;
        assert_eq!(reopened.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn reindex_with_model_clears_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        assert_eq!(store.embedding_model().await.unwrap(), None);

        store
            .insert_batch(vec![(make_chunk("c1", "data", "u"), vec![1.0])])
            .await
            .unwrap();

        store.reindex_with_model("embed-v2").await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(
            store.embedding_model().await.unwrap().as_deref(),
            Some("embed-v2")
        );
    }

    #[tokio::test]
    async fn mismatched_widths_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir).await;
        store
            .insert_batch(vec![
                (make_chunk("old", "old model", "u"), vec![1.0, 0.0]),
                (make_chunk("new", "new model", "u"), vec![1.0, 0.0, 0.0]),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.chunk_id, "new");
    }
}
