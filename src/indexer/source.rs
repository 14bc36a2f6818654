use alloy::primitives::B256;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, Log};
use async_trait::async_trait;
use std::time::Duration;

use super::types::LogQuery;
use crate::config::ChainConfig;
use crate::error::{HistoryError, HistoryResult};

/// Read-only view of a chain that the history pipeline pulls from.
#[async_trait]
pub trait LogSource: Send + Sync {
    /// Latest block number.
    async fn current_height(&self) -> HistoryResult<u64>;

    /// Logs emitted by `query.contract` whose topic0 is one of
    /// `query.signatures` and whose topic1 is `query.user`, within the
    /// inclusive range. Order is unspecified.
    async fn get_logs(&self, query: &LogQuery) -> HistoryResult<Vec<Log>>;

    /// Block time in seconds.
    async fn block_timestamp(&self, block_hash: B256) -> HistoryResult<u64>;
}

/// `LogSource` backed by a JSON-RPC node over HTTP.
pub struct RpcLogSource {
    chain: String,
    provider: DynProvider,
    max_retries: u32,
    backoff: Duration,
}

impl RpcLogSource {
    pub fn connect(config: &ChainConfig) -> eyre::Result<Self> {
        let provider = ProviderBuilder::new()
            .connect_http(
                config
                    .rpc_http
                    .parse()
                    .map_err(|e| eyre::eyre!("Invalid RPC URL '{}': {}", config.rpc_http, e))?,
            )
            .erased();

        Ok(Self {
            chain: config.name.clone(),
            provider,
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }
}

#[async_trait]
impl LogSource for RpcLogSource {
    async fn current_height(&self) -> HistoryResult<u64> {
        retry_rpc(self.max_retries, self.backoff, || self.provider.get_block_number())
            .await
            .map_err(|e| HistoryError::remote("eth_blockNumber", e))
    }

    async fn get_logs(&self, query: &LogQuery) -> HistoryResult<Vec<Log>> {
        let filter = Filter::new()
            .address(query.contract)
            .event_signature(query.signatures.clone())
            .topic1(query.user.into_word())
            .from_block(query.range.from)
            .to_block(query.range.to);

        retry_rpc(self.max_retries, self.backoff, || self.provider.get_logs(&filter))
            .await
            .map_err(|e| HistoryError::remote("eth_getLogs", e))
    }

    async fn block_timestamp(&self, block_hash: B256) -> HistoryResult<u64> {
        let block = retry_rpc(self.max_retries, self.backoff, || async move {
            self.provider.get_block_by_hash(block_hash).await
        })
        .await
        .map_err(|e| HistoryError::TimestampResolutionFailure {
            block_hash,
            message: e,
        })?;

        block
            .map(|b| b.header.timestamp)
            .ok_or_else(|| HistoryError::TimestampResolutionFailure {
                block_hash,
                message: "block not found".to_string(),
            })
    }
}

/// Retry an async operation with exponential backoff, at most
/// `max_retries` times after the first attempt. The last error is returned
/// as text.
pub async fn retry_rpc<F, Fut, T, E>(
    max_retries: u32,
    initial_delay: Duration,
    mut f: F,
) -> Result<T, String>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut delay = initial_delay;

    for attempt in 0..max_retries {
        match f().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    max_retries,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "RPC call failed, retrying..."
                );
                tokio::time::sleep(delay).await;
                delay = std::cmp::min(delay * 2, Duration::from_secs(30));
            }
        }
    }

    f().await.map_err(|e| e.to_string())
}
