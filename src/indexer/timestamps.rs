use alloy::primitives::B256;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;

use super::source::LogSource;
use crate::error::{HistoryError, HistoryResult};

/// What to do when some block timestamps cannot be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampPolicy {
    /// One failure fails the whole cycle.
    #[default]
    AllOrNothing,
    /// Failed blocks are reported and their records dropped.
    Partial,
}

/// Outcome of resolving a batch of block timestamps.
#[derive(Debug, Default)]
pub struct ResolvedTimestamps {
    /// Block hash -> block time in seconds.
    pub resolved: HashMap<B256, u64>,
    pub failed: Vec<HistoryError>,
}

/// Resolve block timestamps concurrently, one request per distinct block
/// hash, with at most `max_in_flight` requests outstanding.
pub async fn resolve_block_timestamps<S: LogSource + ?Sized>(
    source: &S,
    block_hashes: &[B256],
    max_in_flight: usize,
    policy: TimestampPolicy,
) -> HistoryResult<ResolvedTimestamps> {
    let mut unique: Vec<B256> = block_hashes.to_vec();
    unique.sort_unstable();
    unique.dedup();

    let mut results = stream::iter(unique)
        .map(|hash| async move { (hash, source.block_timestamp(hash).await) })
        .buffer_unordered(max_in_flight.max(1));

    let mut out = ResolvedTimestamps::default();
    while let Some((hash, result)) = results.next().await {
        match result {
            Ok(secs) => {
                out.resolved.insert(hash, secs);
            }
            // Dropping the stream cancels the requests still in flight
            Err(e) if policy == TimestampPolicy::AllOrNothing => return Err(e),
            Err(e) => {
                tracing::warn!(block_hash = %hash, error = %e, "Block timestamp unavailable");
                out.failed.push(e);
            }
        }
    }

    Ok(out)
}
