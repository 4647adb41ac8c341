// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `nagare serve` command implementation.
//!
//! Wires storage, the LINE platform adapter, and the reply strategy into
//! the gateway, spawns the scheduled delivery poller, and serves HTTP
//! until a shutdown signal arrives.

use std::sync::Arc;
use std::time::Duration;

use nagare_ai::AiReplyPipeline;
use nagare_anthropic::AnthropicProvider;
use nagare_config::NagareConfig;
use nagare_core::traits::platform::PlatformAdapter;
use nagare_core::types::ReplyMode;
use nagare_core::NagareError;
use nagare_engine::ReplyStrategy;
use nagare_gateway::{start_server, AppState};
use nagare_line::LinePlatform;
use nagare_storage::Database;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::shutdown;

/// Runs the `nagare serve` command.
pub async fn run_serve(config: NagareConfig) -> Result<(), NagareError> {
    init_tracing(&config.app.log_level);

    info!(name = config.app.name.as_str(), "starting nagare");

    let db = Database::open(&config.storage.database_path).await?;
    info!(
        path = config.storage.database_path.as_str(),
        "database ready"
    );

    let platform: Arc<dyn PlatformAdapter> = Arc::new(LinePlatform::new(&config).map_err(|e| {
        error!(error = %e, "failed to initialize LINE platform adapter");
        e
    })?);

    let strategy = build_reply_strategy(&config, &db)?;

    if config.line.channel_secret.is_none() {
        warn!("line.channel_secret is not set, all webhook deliveries will be rejected");
    }

    let state = AppState::new(
        db,
        platform,
        strategy,
        config.line.channel_secret.clone(),
        config.poller.batch_size,
    );

    let cancel = shutdown::install_signal_handler();

    spawn_delivery_poller(&state, &config, cancel.clone());

    start_server(&config.server, state, cancel).await?;

    info!("nagare shutdown complete");
    Ok(())
}

/// Picks the inbound reply strategy from `ai.reply_mode`.
///
/// Echo mode needs nothing; ai mode requires an Anthropic API key and
/// fails startup without one.
fn build_reply_strategy(
    config: &NagareConfig,
    db: &Database,
) -> Result<ReplyStrategy, NagareError> {
    match config.ai.reply_mode {
        ReplyMode::Echo => {
            info!("reply mode: echo");
            Ok(ReplyStrategy::Echo)
        }
        ReplyMode::Ai => {
            let provider = AnthropicProvider::new(config).map_err(|e| {
                error!(error = %e, "failed to initialize the Anthropic provider");
                e
            })?;
            info!(model = config.anthropic.model.as_str(), "reply mode: ai");
            let pipeline = AiReplyPipeline::new(db.clone(), Arc::new(provider), config);
            Ok(ReplyStrategy::Ai(Arc::new(pipeline)))
        }
    }
}

/// Spawns the background task that drains due deliveries on an interval.
///
/// The task polls until the cancellation token fires. Poll errors are
/// logged and the loop keeps going; the next tick retries.
fn spawn_delivery_poller(state: &AppState, config: &NagareConfig, cancel: CancellationToken) {
    let poller = state.poller.clone();
    let interval_secs = config.poller.interval_secs;
    let batch_size = config.poller.batch_size;

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        // Skip the first immediate tick.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match poller.run_once().await {
                        Ok(outcome) if outcome.processed > 0 => {
                            info!(
                                processed = outcome.processed,
                                sent = outcome.sent,
                                failed = outcome.failed,
                                "delivery poll finished"
                            );
                        }
                        Ok(_) => {
                            debug!("delivery poll found nothing due");
                        }
                        Err(e) => {
                            warn!(error = %e, "delivery poll failed, will retry next tick");
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("delivery poller shutting down");
                    break;
                }
            }
        }
    });

    info!(interval_secs, batch_size, "delivery poller started");
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` wins if set; otherwise nagare crates log at the configured
/// level and everything else at warn.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("nagare={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
