mod api;
mod config;
mod errors;
mod repl;
mod session;
mod workflow;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::api::{ApiClient, ResumeService};
use crate::config::Config;
use crate::repl::Repl;
use crate::session::SessionStore;
use crate::workflow::engine::WorkflowEngine;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting OptiCV client v{}", env!("CARGO_PKG_VERSION"));

    // Session credential cell, shared by the API client and the engine
    let session = Arc::new(SessionStore::new());

    // The only component that performs network I/O
    let service: Arc<dyn ResumeService> = Arc::new(ApiClient::new(
        config.api_url.clone(),
        Duration::from_secs(config.request_timeout_secs),
        Arc::clone(&session),
    ));
    info!("API client initialized ({})", config.api_url);

    // One engine instance owns the workflow state for this session
    let engine = Arc::new(WorkflowEngine::new(
        Arc::clone(&service),
        Arc::clone(&session),
    ));

    Repl::new(engine, service, session).run().await
}
