use std::sync::Arc;

use anyhow::{Context, Result};
use facefind_api::{FaceServiceClient, FaceServiceConfig, RateLimiter};
use facefindd::config::Config;
use facefindd::pipeline::MatchEngine;
use facefindd::store::SqliteStore;
use facefindd::{build_router, AppState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facefindd starting");

    let config = Config::from_env();
    if config.api_key.is_empty() || config.api_secret.is_empty() {
        tracing::warn!("FACEFIND_API_KEY / FACEFIND_API_SECRET not set; remote calls will be rejected");
    }

    if let Some(dir) = config.db_path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating data directory {}", dir.display()))?;
    }
    let store = SqliteStore::open(&config.db_path)
        .await
        .with_context(|| format!("opening database {}", config.db_path.display()))?;
    tracing::info!(db = %config.db_path.display(), "store opened");

    let client = FaceServiceClient::new(FaceServiceConfig {
        base_url: config.api_base_url.clone(),
        api_key: config.api_key.clone(),
        api_secret: config.api_secret.clone(),
        timeout: config.http_timeout,
    })?;

    // One limiter per credential; every run in this process funnels
    // through it.
    let limiter = Arc::new(RateLimiter::new(config.rate_limit));

    let engine = Arc::new(MatchEngine::new(
        store.clone(),
        client,
        limiter,
        config.match_threshold,
        config.candidate_cap,
    ));
    tracing::info!(
        threshold = config.match_threshold,
        candidate_cap = config.candidate_cap,
        rate_limit_ms = config.rate_limit.as_millis() as u64,
        "match engine ready"
    );

    let app = build_router(AppState {
        engine,
        store,
        started_at: chrono::Utc::now(),
    });

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "facefindd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("facefindd shutting down");
        })
        .await?;

    Ok(())
}
