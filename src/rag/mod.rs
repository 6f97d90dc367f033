//! Retrieval layer.
//!
//! - `BlogCrawler` / `IngestionPipeline`: pages into chunks into the index
//! - `DocumentStore`: embedding-aware adapter over a `RagStore` backend
//! - `ContextBuilder`: retrieved chunks into prompt context

mod context_builder;
pub mod crawler;
mod document_store;
mod engine;
pub mod ingest;
pub mod memory;
mod mmr;
pub mod sqlite;
pub mod store;

pub use context_builder::{BuiltContext, ContextBuilder, ContextBuilderConfig};
pub use crawler::{BlogCrawler, PageSource, WebPage};
pub use document_store::{
    chunk_id, DocumentStore, QueryOptions, RetrievalResult, RetrievedChunk, SourceRef,
};
pub use engine::{ChunkConfig, ChunkEngine, TextChunk};
pub use ingest::{IngestReport, IngestionPipeline};
pub use memory::MemoryRagStore;
pub use sqlite::SqliteRagStore;
pub use store::{ChunkMetadata, ChunkSearchResult, RagStore, StoredChunk};
