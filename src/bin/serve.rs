// src/bin/serve.rs
//! Read-only search/analytics API over the pipeline outputs.

use std::net::SocketAddr;
use std::sync::Arc;

use ansscraper::api::{serve, ApiState, SearchService};
use ansscraper::config::PipelineConfig;
use ansscraper::registry;
use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cfg = PipelineConfig::from_env();

    let service = match registry::load_registry(&cfg.registry_csv()) {
        Ok(operators) => SearchService::new(operators),
        Err(err) => {
            warn!(%err, "registry unavailable; /search will return no results");
            SearchService::new(Vec::new())
        }
    };
    info!(operators = service.len(), "search index ready");

    let state = Arc::new(ApiState {
        service,
        consolidated_csv: cfg.consolidated_csv(),
    });

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    serve(state, addr).await
}
