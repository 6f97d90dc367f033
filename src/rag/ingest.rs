//! Ingestion pipeline: crawl, parse, chunk, embed, store.

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{info, warn};

use super::crawler::{PageSource, WebPage};
use super::document_store::DocumentStore;
use super::engine::ChunkEngine;
use crate::core::config::IngestSettings;
use crate::core::errors::ApiError;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IngestReport {
    pub pages_seen: usize,
    pub pages_ingested: usize,
    pub chunks_stored: usize,
    pub failures: Vec<PageFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageFailure {
    pub url: String,
    pub error: String,
}

pub struct IngestionPipeline {
    source: Arc<dyn PageSource>,
    documents: DocumentStore,
    engine: ChunkEngine,
    max_concurrent_fetches: usize,
    request_delay: Duration,
    max_pages: Option<usize>,
}

impl IngestionPipeline {
    pub fn new(source: Arc<dyn PageSource>, documents: DocumentStore, settings: &IngestSettings) -> Self {
        Self {
            source,
            documents,
            engine: ChunkEngine::new(settings.into()),
            max_concurrent_fetches: settings.max_concurrent_fetches.max(1),
            request_delay: Duration::from_millis(settings.request_delay_ms),
            max_pages: settings.max_pages,
        }
    }

    /// Crawl the blog's sitemap and ingest every page found.
    pub async fn ingest_site(&self, blog_url: &str) -> Result<IngestReport, ApiError> {
        let urls = self
            .source
            .discover(blog_url)
            .await
            .map_err(|e| ApiError::Internal(format!("could not discover pages of {}: {}", blog_url, e)))?;
        self.ingest_urls(urls).await
    }

    /// Ingest the given pages. Pages that fail to download are skipped and
    /// reported; a store or embedding failure aborts the run.
    pub async fn ingest_urls(&self, mut urls: Vec<String>) -> Result<IngestReport, ApiError> {
        if let Some(max) = self.max_pages {
            urls.truncate(max);
        }

        let started = std::time::Instant::now();
        let mut report = IngestReport {
            pages_seen: urls.len(),
            ..IngestReport::default()
        };

        let source = self.source.clone();
        let pacer = self.pacer();
        let mut pages = stream::iter(urls.into_iter().map(|url| {
            let source = source.clone();
            let pacer = pacer.clone();
            async move {
                if let Some(pacer) = pacer {
                    pacer.lock().await.tick().await;
                }
                let page = source.fetch_page(&url).await;
                (url, page)
            }
        }))
        .buffered(self.max_concurrent_fetches);

        while let Some((url, page)) = pages.next().await {
            match page {
                Ok(page) => {
                    let stored = self.store_page(page).await?;
                    report.pages_ingested += 1;
                    report.chunks_stored += stored;
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "skipping page");
                    report.failures.push(PageFailure {
                        url,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            pages = report.pages_ingested,
            chunks = report.chunks_stored,
            failures = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ingestion finished"
        );
        Ok(report)
    }

    /// Spaces fetch starts `request_delay` apart across all in-flight fetches.
    fn pacer(&self) -> Option<Arc<Mutex<Interval>>> {
        if self.request_delay.is_zero() {
            return None;
        }
        let mut interval = tokio::time::interval(self.request_delay);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(Arc::new(Mutex::new(interval)))
    }

    async fn store_page(&self, page: WebPage) -> Result<usize, ApiError> {
        let chunks = self.engine.collect_from_text(&page.text, &page.metadata);
        self.documents.add(chunks).await.map_err(|e| match e {
            ApiError::ModelInvocation(msg) => ApiError::StoreUnavailable(format!("embedding failed: {}", msg)),
            other => other,
        })
    }
}
