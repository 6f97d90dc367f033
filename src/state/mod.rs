use std::sync::Arc;
use std::time::Duration;

use crate::chat::{
    AnswerSynthesizer, ChatPipeline, ContextRetriever, QuestionCondenser, SessionRegistry,
};
use crate::core::config::{AppPaths, ConfigService, Settings, StoreBackend};
use crate::history::{HistoryBackend, HistoryStore};
use crate::llm::LlmService;
use crate::rag::{
    BlogCrawler, ContextBuilder, DocumentStore, IngestionPipeline, MemoryRagStore, PageSource,
    RagStore, SqliteRagStore,
};

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes and background tasks.
///
/// Contains references to:
/// - Configuration and paths
/// - The model service and the document index
/// - Live sessions and the durable history store
/// - The ingestion pipeline
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub settings: Settings,
    pub llm: LlmService,
    pub documents: DocumentStore,
    pub history: Option<Arc<HistoryStore>>,
    pub sessions: SessionRegistry,
    pub ingestion: IngestionPipeline,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Loading and validating configuration
    /// 2. Opening the document index and the history database
    /// 3. Clearing the index if the embedding model changed
    /// 4. Wiring the chat pipeline and the ingestion pipeline
    pub async fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config
            .load_settings()
            .map_err(|e| InitializationError::Config(e.into()))?;
        if let Ok(raw) = config.load_config() {
            tracing::debug!(config = %config.redact_sensitive_values(&raw), "effective configuration");
        }

        let llm = LlmService::from_settings(&settings.llm);

        let rag_store: Arc<dyn RagStore> = match settings.store.backend {
            StoreBackend::Sqlite => {
                let db_path = settings
                    .store
                    .path
                    .clone()
                    .unwrap_or_else(|| paths.rag_db_path.clone());
                Arc::new(
                    SqliteRagStore::with_path(db_path)
                        .await
                        .map_err(|e| InitializationError::Rag(e.into()))?,
                )
            }
            StoreBackend::Memory => Arc::new(MemoryRagStore::new()),
        };

        let history = if settings.history.persist {
            let db_path = settings
                .history
                .path
                .clone()
                .unwrap_or_else(|| paths.history_db_path.clone());
            Some(Arc::new(
                HistoryStore::new(db_path)
                    .await
                    .map_err(|e| InitializationError::History(e.into()))?,
            ))
        } else {
            None
        };

        let crawler = BlogCrawler::new(Duration::from_secs(settings.ingest.fetch_timeout_secs))
            .map_err(InitializationError::Crawler)?;

        let state = Self::from_parts(
            paths,
            config,
            settings,
            llm,
            rag_store,
            history,
            Arc::new(crawler),
        );

        if state
            .documents
            .ensure_embedding_model()
            .await
            .map_err(|e| InitializationError::Rag(e.into()))?
        {
            tracing::warn!("document index was cleared; run ingestion to rebuild it");
        }

        tracing::info!(
            provider = state.llm.provider_name(),
            chat_model = state.llm.chat_model(),
            store = ?state.settings.store.backend,
            persist_history = state.history.is_some(),
            "application state initialized"
        );

        Ok(Arc::new(state))
    }

    /// Wire the services from already-built handles.
    pub fn from_parts(
        paths: Arc<AppPaths>,
        config: ConfigService,
        settings: Settings,
        llm: LlmService,
        rag_store: Arc<dyn RagStore>,
        history: Option<Arc<HistoryStore>>,
        page_source: Arc<dyn PageSource>,
    ) -> Self {
        let documents = DocumentStore::new(rag_store, llm.clone());

        let pipeline = Arc::new(ChatPipeline {
            condenser: QuestionCondenser::new(llm.clone()),
            retriever: ContextRetriever::new(documents.clone(), settings.retrieval.query_options()),
            synthesizer: AnswerSynthesizer::new(
                llm.clone(),
                ContextBuilder::new(settings.retrieval.context_builder_config()),
            ),
        });

        let durable = history
            .clone()
            .map(|store| store as Arc<dyn HistoryBackend>);
        let sessions = SessionRegistry::new(pipeline, settings.persona.clone(), durable);

        let ingestion = IngestionPipeline::new(page_source, documents.clone(), &settings.ingest);

        Self {
            paths,
            config,
            settings,
            llm,
            documents,
            history,
            sessions,
            ingestion,
        }
    }
}
