use alloy::primitives::Address;
use std::sync::Arc;

use crate::config::HistoryConfig;
use crate::error::{HistoryError, HistoryResult};
use crate::indexer::amount::format_token_amount;
use crate::indexer::decoder::{self, DecodedLog};
use crate::indexer::source::LogSource;
use crate::indexer::timestamps::{self, TimestampPolicy};
use crate::indexer::types::{
    recency_order, BlockRange, LogQuery, TransactionRecord, TransactionStatus,
};

/// Counters from one fetch cycle, for logging.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleStats {
    pub logs_fetched: usize,
    pub foreign_contract: usize,
    pub removed: usize,
    pub out_of_range: usize,
    pub undecodable: usize,
    pub foreign_user: usize,
    pub missing_timestamp: usize,
    pub records: usize,
}

/// Rebuilds one account's staking history from the contract's event logs:
/// 1. Block range from the current tip
/// 2. One log query for all tracked events of the account
/// 3. Decode (unknown or malformed logs are dropped, as is anything the
///    source should have filtered out)
/// 4. Concurrent block timestamp resolution
/// 5. Records sorted newest first
pub struct HistoryPipeline<S: ?Sized> {
    source: Arc<S>,
    contract: Address,
    config: HistoryConfig,
}

impl<S: LogSource + ?Sized> HistoryPipeline<S> {
    pub fn new(source: Arc<S>, contract: Address, config: HistoryConfig) -> Self {
        Self {
            source,
            contract,
            config,
        }
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Run a full cycle for `account`. Read-only; nothing is cached between
    /// calls.
    pub async fn fetch(&self, account: Address) -> HistoryResult<Vec<TransactionRecord>> {
        self.fetch_with_stats(account).await.map(|(records, _)| records)
    }

    pub async fn fetch_with_stats(
        &self,
        account: Address,
    ) -> HistoryResult<(Vec<TransactionRecord>, CycleStats)> {
        let tip = self.source.current_height().await?;
        let range = BlockRange::lookback(
            tip,
            self.config.lookback_blocks,
            self.config.deployment_block.unwrap_or(0),
        );

        let query = LogQuery {
            contract: self.contract,
            signatures: decoder::tracked_signatures(),
            user: account,
            range,
        };

        tracing::debug!(
            account = %account,
            from = range.from,
            to = range.to,
            "Fetching staking logs"
        );

        let logs = self.source.get_logs(&query).await?;
        let mut stats = CycleStats {
            logs_fetched: logs.len(),
            ..Default::default()
        };

        let mut decoded: Vec<DecodedLog> = Vec::with_capacity(logs.len());
        for log in &logs {
            // The source is not trusted to have applied the query filter
            if log.inner.address != self.contract {
                stats.foreign_contract += 1;
                tracing::debug!(
                    account = %account,
                    address = %log.inner.address,
                    tx = ?log.transaction_hash,
                    "Dropping log from another contract"
                );
                continue;
            }
            if log.removed {
                stats.removed += 1;
                tracing::debug!(account = %account, tx = ?log.transaction_hash, "Dropping reorged log");
                continue;
            }

            match decoder::decode_staking_log(log) {
                Ok(entry) if !range.contains(entry.block_number) => {
                    stats.out_of_range += 1;
                    tracing::debug!(
                        account = %account,
                        block = entry.block_number,
                        tx = %entry.tx_hash,
                        "Dropping log outside the queried range"
                    );
                }
                Ok(entry) if entry.user != account => {
                    stats.foreign_user += 1;
                    tracing::debug!(
                        account = %account,
                        user = %entry.user,
                        tx = %entry.tx_hash,
                        "Dropping log for another user"
                    );
                }
                Ok(entry) => decoded.push(entry),
                Err(e) => {
                    stats.undecodable += 1;
                    tracing::warn!(
                        account = %account,
                        tx = ?log.transaction_hash,
                        kind = e.kind(),
                        error = %e,
                        "Skipping undecodable staking log"
                    );
                }
            }
        }

        let block_hashes: Vec<_> = decoded.iter().map(|d| d.block_hash).collect();
        let timestamps = timestamps::resolve_block_timestamps(
            self.source.as_ref(),
            &block_hashes,
            self.config.max_concurrent_requests,
            self.config.timestamp_policy,
        )
        .await?;

        let mut records = Vec::with_capacity(decoded.len());
        for entry in decoded {
            let Some(&secs) = timestamps.resolved.get(&entry.block_hash) else {
                // Only reachable under the partial policy
                stats.missing_timestamp += 1;
                continue;
            };
            records.push(self.to_record(&entry, secs));
        }
        records.sort_by(recency_order);
        stats.records = records.len();

        if self.config.timestamp_policy == TimestampPolicy::Partial && stats.missing_timestamp > 0 {
            tracing::warn!(
                account = %account,
                dropped = stats.missing_timestamp,
                "Published partial history, some block timestamps were unavailable"
            );
        }

        tracing::info!(
            account = %account,
            from = range.from,
            to = range.to,
            logs = stats.logs_fetched,
            records = stats.records,
            skipped = stats.logs_fetched - stats.records,
            "Transaction history rebuilt"
        );

        Ok((records, stats))
    }

    fn to_record(&self, entry: &DecodedLog, block_secs: u64) -> TransactionRecord {
        TransactionRecord {
            id: entry.tx_hash,
            kind: entry.event.kind(),
            amount: format_token_amount(
                entry.event.display_amount(),
                self.config.token_decimals,
                self.config.display_precision,
            ),
            timestamp: block_secs.saturating_mul(1000),
            status: TransactionStatus::Completed,
            block_number: entry.block_number,
            log_index: entry.log_index,
        }
    }
}

/// Failures are logged and collapse to an empty history; callers never see
/// an error.
pub async fn fetch_or_empty<S: LogSource + ?Sized>(
    pipeline: &HistoryPipeline<S>,
    account: Address,
) -> Vec<TransactionRecord> {
    match pipeline.fetch(account).await {
        Ok(records) => records,
        Err(e) => {
            log_cycle_failure(account, &e);
            Vec::new()
        }
    }
}

pub(crate) fn log_cycle_failure(account: Address, e: &HistoryError) {
    tracing::error!(
        account = %account,
        kind = e.kind(),
        error = %e,
        "Error fetching transaction history"
    );
}
