//! HTTP front end: Slack Events API intake and health check.

mod handlers;
mod state;
pub mod verify;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::RecorderConfig;
use crate::dedup::DedupCache;
use crate::pipeline::ReactionPipeline;
use crate::sheet_store::GoogleSheetStore;
use crate::slack_api::SlackWebClient;

pub use state::GatewayState;

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/slack/events", post(handlers::ingest_slack))
        .with_state(state)
}

/// Wire the Slack and Sheets clients into a pipeline sharing `cache`.
pub fn build_pipeline(
    config: &RecorderConfig,
    cache: Arc<DedupCache>,
) -> Result<ReactionPipeline, Box<dyn std::error::Error + Send + Sync>> {
    let slack = Arc::new(SlackWebClient::new(config.slack_bot_token.clone()));
    let store = GoogleSheetStore::from_config(&config.sheets)?;
    Ok(ReactionPipeline::new(
        config.target_reaction.clone(),
        config.sheets.settings.record_defaults()?,
        cache,
        slack.clone(),
        slack,
        Arc::new(store),
    ))
}

/// Periodically drop expired dedup entries.
pub fn spawn_dedup_sweeper(cache: Arc<DedupCache>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = cache.sweep_expired();
            if removed > 0 {
                debug!("dedup sweep removed {} entries, {} left", removed, cache.len());
            }
        }
    })
}

pub async fn run_server<F>(
    config: RecorderConfig,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let retention = config.sheets.settings.dedup_retention();
    let cache = Arc::new(DedupCache::with_system_clock(retention));
    let pipeline = Arc::new(build_pipeline(&config, cache.clone())?);

    if config.slack_signing_secret.is_none() {
        warn!("SLACK_SIGNING_SECRET not set; request signatures will not be checked");
    }
    let state = Arc::new(GatewayState::new(
        pipeline,
        config.slack_signing_secret.clone(),
    ));
    let sweeper = spawn_dedup_sweeper(cache, SWEEP_INTERVAL);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        "reaction gateway listening on {} target_reaction={} spreadsheet={}",
        addr, config.target_reaction, config.sheets.spreadsheet_id
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    sweeper.abort();
    info!("reaction gateway stopped");
    Ok(())
}
