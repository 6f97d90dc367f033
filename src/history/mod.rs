//! Durable conversation history.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};

use crate::chat::Turn;
use crate::core::errors::ApiError;
use crate::rag::RetrievalResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub turn_count: i64,
}

/// Where sessions keep their turns beyond process lifetime.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    async fn create_session(&self, session_id: &str) -> Result<(), ApiError>;

    async fn session_exists(&self, session_id: &str) -> Result<bool, ApiError>;

    async fn append_turn(&self, session_id: &str, turn: &Turn) -> Result<(), ApiError>;

    /// All turns of the session, oldest first.
    async fn load_turns(&self, session_id: &str) -> Result<Vec<Turn>, ApiError>;

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError>;
}

#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| ApiError::store(format!("Failed to connect to history db: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::store(format!("Failed to init sessions table: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                question TEXT NOT NULL,
                condensed_question TEXT NOT NULL,
                answer TEXT NOT NULL,
                sources JSON NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::store(format!("Failed to init turns table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_turns_session_id ON turns(session_id)")
            .execute(&pool)
            .await
            .map_err(|e| ApiError::store(format!("Failed to create index: {}", e)))?;

        Ok(Self { pool })
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionInfo>, ApiError> {
        let rows = sqlx::query(
            "SELECT s.id, s.created_at, s.updated_at, COUNT(t.id) as turn_count \
             FROM sessions s \
             LEFT JOIN turns t ON s.id = t.session_id \
             GROUP BY s.id \
             ORDER BY s.updated_at DESC \
             LIMIT 100",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::store)?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(SessionInfo {
                id: row.try_get("id").map_err(ApiError::store)?,
                created_at: row.try_get("created_at").map_err(ApiError::store)?,
                updated_at: row.try_get("updated_at").map_err(ApiError::store)?,
                turn_count: row.try_get("turn_count").map_err(ApiError::store)?,
            });
        }
        Ok(sessions)
    }
}

#[async_trait]
impl HistoryBackend for HistoryStore {
    async fn create_session(&self, session_id: &str) -> Result<(), ApiError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("INSERT OR IGNORE INTO sessions (id, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(session_id)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::store(format!("Failed to create session: {}", e)))?;
        Ok(())
    }

    async fn session_exists(&self, session_id: &str) -> Result<bool, ApiError> {
        let row = sqlx::query("SELECT id FROM sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ApiError::store)?;
        Ok(row.is_some())
    }

    async fn append_turn(&self, session_id: &str, turn: &Turn) -> Result<(), ApiError> {
        let now = Utc::now().to_rfc3339();
        let sources = serde_json::to_string(&turn.sources).map_err(ApiError::internal)?;

        let mut tx = self.pool.begin().await.map_err(ApiError::store)?;

        // a purged session must not come back through a late append
        let touched = sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::store)?
            .rows_affected();
        if touched == 0 {
            return Err(ApiError::NotFound(format!("session {}", session_id)));
        }

        sqlx::query(
            "INSERT INTO turns (session_id, question, condensed_question, answer, sources, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(&turn.question)
        .bind(&turn.condensed_question)
        .bind(&turn.answer)
        .bind(sources)
        .bind(turn.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(ApiError::store)?;

        tx.commit().await.map_err(ApiError::store)?;
        Ok(())
    }

    async fn load_turns(&self, session_id: &str) -> Result<Vec<Turn>, ApiError> {
        let rows = sqlx::query(
            "SELECT question, condensed_question, answer, sources, created_at \
             FROM turns WHERE session_id = ? ORDER BY id ASC",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::store)?;

        let mut turns = Vec::with_capacity(rows.len());
        for row in rows {
            let sources: String = row.try_get("sources").map_err(ApiError::store)?;
            let created_at: String = row.try_get("created_at").map_err(ApiError::store)?;
            turns.push(Turn {
                question: row.try_get("question").map_err(ApiError::store)?,
                condensed_question: row.try_get("condensed_question").map_err(ApiError::store)?,
                answer: row.try_get("answer").map_err(ApiError::store)?,
                sources: serde_json::from_str::<RetrievalResult>(&sources).map_err(ApiError::store)?,
                created_at: DateTime::parse_from_rfc3339(&created_at)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(ApiError::store)?,
            });
        }
        Ok(turns)
    }

    async fn delete_session(&self, session_id: &str) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::store)?;
        Ok(())
    }
}
