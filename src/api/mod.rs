pub mod handlers;
pub mod types;

use alloy::primitives::Address;
use axum::{
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::indexer::source::LogSource;
use crate::tracker::HistoryTracker;

pub struct AppState<S: ?Sized> {
    pub tracker: HistoryTracker<S>,
    pub chain: String,
    pub contract: Address,
}

impl<S: ?Sized> AppState<S> {
    pub fn new(tracker: HistoryTracker<S>, chain: String, contract: Address) -> Self {
        Self {
            tracker,
            chain,
            contract,
        }
    }
}

pub fn router<S: LogSource + ?Sized + 'static>(state: AppState<S>) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/v1/health", get(handlers::health::<S>))
        .route("/api/v1/transactions", get(handlers::transactions::<S>))
        .route("/api/v1/account", put(handlers::set_account::<S>))
        .route("/api/v1/refresh", post(handlers::refresh::<S>))
        .route(
            "/api/v1/accounts/{address}/transactions",
            get(handlers::account_transactions::<S>),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn serve<S: LogSource + ?Sized + 'static>(
    state: AppState<S>,
    host: &str,
    port: u16,
    shutdown: CancellationToken,
) -> eyre::Result<()> {
    let app = router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "API server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
