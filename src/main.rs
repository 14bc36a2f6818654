use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use stakewatch_history::api::{self, AppState};
use stakewatch_history::config::Config;
use stakewatch_history::indexer::source::RpcLogSource;
use stakewatch_history::tracker::HistoryTracker;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Initialize structured logging (set RUST_LOG=info for output)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    tracing::info!("Stakewatch history service starting");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path)?;
    let contract = config.chain.staking_contract_address()?;
    tracing::info!(
        chain = %config.chain.name,
        chain_id = config.chain.chain_id,
        contract = %contract,
        lookback_blocks = config.history.lookback_blocks,
        "Configuration loaded from {}",
        config_path
    );

    let source = Arc::new(RpcLogSource::connect(&config.chain)?);
    tracing::info!(chain = %source.chain(), rpc = %config.chain.rpc_http, "Log source ready");

    let tracker: HistoryTracker<RpcLogSource> =
        HistoryTracker::new(contract, config.history.clone());
    tracker.set_source(Some(source)).await;

    if let Some(account) = config.initial_account()? {
        tracing::info!(account = %account, "Watching account from config");
        tracker.set_account(Some(account)).await;
    }

    let shutdown = CancellationToken::new();
    let mut handles = Vec::new();

    if config.api.enabled {
        let state = AppState::new(tracker.clone(), config.chain.name.clone(), contract);
        let host = config.api.host.clone();
        let port = config.api.port;
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            if let Err(e) = api::serve(state, &host, port, shutdown).await {
                tracing::error!(error = %e, "API server failed");
            }
        }));
    }

    if let Some(secs) = config.history.refresh_interval_secs {
        let tracker = tracker.clone();
        let shutdown = shutdown.clone();
        handles.push(tokio::spawn(async move {
            refresh_loop(tracker, Duration::from_secs(secs), shutdown).await;
        }));
    }

    tracing::info!("History service running. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, stopping...");
    shutdown.cancel();

    for handle in handles {
        let _ = handle.await;
    }

    tracing::info!("Stakewatch history service stopped gracefully");
    Ok(())
}

/// Periodically re-run the history cycle for the tracked account.
async fn refresh_loop(
    tracker: HistoryTracker<RpcLogSource>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Periodic refresh active");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.cancelled() => {
                tracing::info!("Shutdown received, stopping refresh loop");
                break;
            }
        }

        if tracker.snapshot().is_loading {
            tracing::debug!("Previous cycle still running, skipping refresh");
            continue;
        }
        tracker.refresh().await;
    }
}
