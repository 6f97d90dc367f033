use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use blogchat_backend::core::{self, config::AppPaths};
use blogchat_backend::server;
use blogchat_backend::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    core::logging::init(&paths);

    let state = AppState::initialize(paths).await?;

    if state.settings.ingest.on_startup {
        let blog_url = state.settings.persona.blog_url.clone();
        match state.ingestion.ingest_site(&blog_url).await {
            Ok(report) => tracing::info!(
                pages = report.pages_ingested,
                chunks = report.chunks_stored,
                failures = report.failures.len(),
                "startup ingestion finished"
            ),
            Err(err) => tracing::error!("Startup ingestion failed: {}", err),
        }
    }

    let bind_addr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    );
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;

    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
