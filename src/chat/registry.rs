use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::persona::Persona;
use super::session::{ChatPipeline, ConversationSession};
use super::turn::History;
use crate::core::errors::ApiError;
use crate::history::HistoryBackend;

pub type SharedSession = Arc<Mutex<ConversationSession>>;

/// Live sessions by id. Each session sits behind its own lock, so one slow
/// exchange never blocks another session.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, SharedSession>>,
    pipeline: Arc<ChatPipeline>,
    persona: Persona,
    durable: Option<Arc<dyn HistoryBackend>>,
}

impl SessionRegistry {
    pub fn new(
        pipeline: Arc<ChatPipeline>,
        persona: Persona,
        durable: Option<Arc<dyn HistoryBackend>>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            pipeline,
            persona,
            durable,
        }
    }

    pub async fn create(&self) -> Result<(String, SharedSession), ApiError> {
        let id = uuid::Uuid::new_v4().to_string();
        if let Some(durable) = &self.durable {
            durable.create_session(&id).await?;
        }

        let session = Arc::new(Mutex::new(ConversationSession::new(
            id.clone(),
            self.persona.clone(),
            self.pipeline.clone(),
            self.durable.clone(),
        )));
        self.sessions.write().await.insert(id.clone(), session.clone());
        tracing::info!(session_id = %id, "session created");
        Ok((id, session))
    }

    /// Live session, or one rebuilt from the durable store.
    pub async fn get(&self, id: &str) -> Result<SharedSession, ApiError> {
        if let Some(session) = self.sessions.read().await.get(id) {
            return Ok(session.clone());
        }

        let Some(durable) = &self.durable else {
            return Err(ApiError::NotFound(format!("session {}", id)));
        };
        if !durable.session_exists(id).await? {
            return Err(ApiError::NotFound(format!("session {}", id)));
        }

        let turns = durable.load_turns(id).await?;
        let mut sessions = self.sessions.write().await;
        // another request may have rehydrated it meanwhile
        let session = sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::info!(session_id = %id, turns = turns.len(), "session rehydrated");
                Arc::new(Mutex::new(ConversationSession::with_history(
                    id.to_string(),
                    self.persona.clone(),
                    History::from_turns(turns),
                    self.pipeline.clone(),
                    self.durable.clone(),
                )))
            })
            .clone();
        Ok(session)
    }

    /// Drop the live session; its durable copy stays unless `purge` is set.
    pub async fn remove(&self, id: &str, purge: bool) -> Result<bool, ApiError> {
        let removed = self.sessions.write().await.remove(id).is_some();
        let mut purged = false;
        if purge {
            if let Some(durable) = &self.durable {
                purged = durable.session_exists(id).await?;
                durable.delete_session(id).await?;
            }
        }
        Ok(removed || purged)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::session::tests::{harness, seed_k8s};
    use crate::history::HistoryStore;

    #[tokio::test]
    async fn sessions_are_independent() {
        let h = harness();
        seed_k8s(&h.documents).await;
        let registry = SessionRegistry::new(h.pipeline.clone(), Persona::default(), None);

        let (a, session_a) = registry.create().await.unwrap();
        let (b, _) = registry.create().await.unwrap();
        assert_ne!(a, b);

        session_a
            .lock()
            .await
            .ask("How does TechNibbana explain autoscaling?")
            .await
            .unwrap();

        let session_b = registry.get(&b).await.unwrap();
        assert!(session_b.lock().await.history().is_empty());
        assert_eq!(registry.get(&a).await.unwrap().lock().await.history().len(), 1);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let h = harness();
        let registry = SessionRegistry::new(h.pipeline.clone(), Persona::default(), None);
        assert!(matches!(registry.get("nope").await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn removed_session_is_rehydrated_from_durable_store() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn HistoryBackend> =
            Arc::new(HistoryStore::new(dir.path().join("history.db")).await.unwrap());
        let h = harness();
        seed_k8s(&h.documents).await;
        let registry = SessionRegistry::new(h.pipeline.clone(), Persona::default(), Some(store));

        let (id, session) = registry.create().await.unwrap();
        session
            .lock()
            .await
            .ask("How does TechNibbana explain autoscaling?")
            .await
            .unwrap();

        assert!(registry.remove(&id, false).await.unwrap());
        assert_eq!(registry.len().await, 0);

        let restored = registry.get(&id).await.unwrap();
        assert_eq!(restored.lock().await.history().len(), 1);

        assert!(registry.remove(&id, true).await.unwrap());
        assert!(matches!(registry.get(&id).await, Err(ApiError::NotFound(_))));
    }
}
