use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

use super::types::*;
use super::AppState;
use crate::indexer::source::LogSource;
use crate::pipeline::fetch_or_empty;

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

fn api_error(status: StatusCode, msg: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: msg.into(),
        }),
    )
}

pub async fn health<S: LogSource + ?Sized + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HealthResponse> {
    let snapshot = state.tracker.snapshot();
    Json(HealthResponse {
        status: "ok".to_string(),
        chain: state.chain.clone(),
        contract: state.contract,
        account: snapshot.account,
        generation: snapshot.generation,
        is_loading: snapshot.is_loading,
    })
}

// ============================================================
// Tracked account
// ============================================================

pub async fn transactions<S: LogSource + ?Sized + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<HistoryResponse> {
    Json(state.tracker.snapshot().into())
}

pub async fn set_account<S: LogSource + ?Sized + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(body): Json<AccountRequest>,
) -> ApiResult<TriggerResponse> {
    let account = body
        .address
        .as_deref()
        .map(parse_address)
        .transpose()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    let started = state.tracker.set_account(account).await.is_some();
    tracing::info!(account = ?account, started, "Tracked account updated");

    Ok(Json(TriggerResponse {
        account,
        started,
        generation: state.tracker.snapshot().generation,
    }))
}

pub async fn refresh<S: LogSource + ?Sized + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<TriggerResponse> {
    let started = state.tracker.refresh().await.is_some();
    let snapshot = state.tracker.snapshot();
    Json(TriggerResponse {
        account: snapshot.account,
        started,
        generation: snapshot.generation,
    })
}

// ============================================================
// One-shot queries
// ============================================================

pub async fn account_transactions<S: LogSource + ?Sized + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(address): Path<String>,
) -> ApiResult<HistoryResponse> {
    let account = parse_address(&address).map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    let transactions = match state.tracker.pipeline().await {
        Some(pipeline) => fetch_or_empty(pipeline.as_ref(), account).await,
        None => {
            tracing::warn!(account = %account, "No log source connected");
            Vec::new()
        }
    };

    Ok(Json(HistoryResponse {
        account: Some(account),
        transactions: transactions.into_iter().map(Into::into).collect(),
        is_loading: false,
        generation: None,
    }))
}
