//! In-memory `LogSource` for tests.

use alloy::primitives::{address, Address, Bytes, LogData, B256};
use alloy::rpc::types::Log;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use super::source::LogSource;
use super::types::LogQuery;
use crate::error::{HistoryError, HistoryResult};

pub const CONTRACT: Address = address!("0x5fbdb2315678afecb367f032d93f642f64180aa3");

pub fn block_hash_of(block_number: u64) -> B256 {
    B256::left_padding_from(&block_number.to_be_bytes())
}

/// A mined log from the staking contract at `block_number`.
pub fn raw_log(data: LogData, block_number: u64, tx_hash: B256, log_index: u64) -> Log {
    Log {
        inner: alloy::primitives::Log {
            address: CONTRACT,
            data,
        },
        block_hash: Some(block_hash_of(block_number)),
        block_number: Some(block_number),
        block_timestamp: None,
        transaction_hash: Some(tx_hash),
        transaction_index: Some(0),
        log_index: Some(log_index),
        removed: false,
    }
}

/// A log whose topic0 matches none of the staking events.
pub fn unknown_log(user: Address, block_number: u64, tx_hash: B256) -> Log {
    let data = LogData::new_unchecked(
        vec![B256::repeat_byte(0xab), user.into_word()],
        Bytes::from(vec![0u8; 32]),
    );
    raw_log(data, block_number, tx_hash, 0)
}

#[derive(Default)]
pub struct MockLogSource {
    pub height: u64,
    pub logs: Vec<Log>,
    pub timestamps: HashMap<B256, u64>,
    pub fail_height: bool,
    pub fail_logs: bool,
    pub failing_blocks: HashSet<B256>,
    /// Ignore the user topic filter, like a lax node.
    pub lax: bool,
    /// Ignore the query entirely and return every log.
    pub unfiltered: bool,
    /// Hold `get_logs` for this user until the notify is released.
    pub gate: Option<(Address, Arc<Notify>)>,
    pub log_calls: AtomicUsize,
    pub timestamp_calls: AtomicUsize,
    pub last_query: Mutex<Option<LogQuery>>,
}

impl MockLogSource {
    pub fn new(height: u64) -> Self {
        Self {
            height,
            ..Default::default()
        }
    }

    /// Add a log and record `timestamp_secs` for its block.
    pub fn with_log(mut self, log: Log, timestamp_secs: u64) -> Self {
        if let Some(hash) = log.block_hash {
            self.timestamps.insert(hash, timestamp_secs);
        }
        self.logs.push(log);
        self
    }
}

#[async_trait]
impl LogSource for MockLogSource {
    async fn current_height(&self) -> HistoryResult<u64> {
        if self.fail_height {
            return Err(HistoryError::remote("eth_blockNumber", "connection refused"));
        }
        Ok(self.height)
    }

    async fn get_logs(&self, query: &LogQuery) -> HistoryResult<Vec<Log>> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_query.lock() {
            *last = Some(query.clone());
        }

        if let Some((user, notify)) = &self.gate {
            if *user == query.user {
                notify.notified().await;
            }
        }

        if self.fail_logs {
            return Err(HistoryError::remote("eth_getLogs", "rate limited"));
        }

        if self.unfiltered {
            return Ok(self.logs.clone());
        }

        let user_topic = query.user.into_word();
        Ok(self
            .logs
            .iter()
            .filter(|log| log.inner.address == query.contract)
            .filter(|log| {
                let topics = log.inner.data.topics();
                let sig_ok = topics.first().is_some_and(|t| query.signatures.contains(t));
                let user_ok = self.lax || topics.get(1) == Some(&user_topic);
                // A lax node may also ignore topic0
                (self.lax || sig_ok) && user_ok
            })
            .filter(|log| log.block_number.is_some_and(|n| query.range.contains(n)))
            .cloned()
            .collect())
    }

    async fn block_timestamp(&self, block_hash: B256) -> HistoryResult<u64> {
        self.timestamp_calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.failing_blocks.contains(&block_hash) {
            return Err(HistoryError::TimestampResolutionFailure {
                block_hash,
                message: "header not found".to_string(),
            });
        }
        self.timestamps
            .get(&block_hash)
            .copied()
            .ok_or_else(|| HistoryError::TimestampResolutionFailure {
                block_hash,
                message: "unknown block".to_string(),
            })
    }
}
