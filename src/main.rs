mod catalog;
mod config;
mod error;
mod gemini;
mod models;
mod openai;
mod prompt;
mod provider;
mod routes;
mod service;

use anyhow::Context;
use routes::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{catalog::InMemoryCatalog, config::AutofillSettings, service::GenerationService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let settings = AutofillSettings::from_env().context("loading autofill settings")?;
    tracing::info!(
        enabled = settings.enabled,
        provider = %settings.provider,
        schema = ?settings.schema_version,
        timeout_secs = settings.timeout.as_secs(),
        "Autofill settings loaded"
    );
    if settings.api_key(settings.provider).is_none() {
        tracing::warn!("No API key configured for {}; requests will return the fallback", settings.provider);
    }

    let catalog = match std::env::var("AUTOFILL_CATALOG") {
        Ok(path) => {
            let catalog = InMemoryCatalog::from_json_file(&path)?;
            let (products, categories) = catalog.counts();
            tracing::info!(%path, products, categories, "Catalog seeded");
            Arc::new(catalog)
        }
        Err(_) => Arc::new(InMemoryCatalog::new()),
    };

    let service = GenerationService::new(Arc::new(settings), catalog.clone(), catalog.clone());
    let app = routes::router(AppState { service: Arc::new(service), catalog });

    let port: u16 = std::env::var("PORT").ok().and_then(|v| v.parse().ok()).unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutting down");
    }
}
