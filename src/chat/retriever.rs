use crate::core::errors::ApiError;
use crate::rag::{DocumentStore, QueryOptions, RetrievalResult};

/// Finds relevant, diverse chunks for a standalone question.
#[derive(Clone)]
pub struct ContextRetriever {
    documents: DocumentStore,
    options: QueryOptions,
}

impl ContextRetriever {
    pub fn new(documents: DocumentStore, options: QueryOptions) -> Self {
        Self { documents, options }
    }

    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult, ApiError> {
        let result = self.documents.query(query, &self.options).await?;
        tracing::debug!(chunks = result.len(), "context retrieved");
        Ok(result)
    }
}
