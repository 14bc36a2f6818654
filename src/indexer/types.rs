use alloy::primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

/// Kind of staking action a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TransactionKind {
    Stake,
    Unstake,
    Claim,
    Compound,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stake => "Stake",
            Self::Unstake => "Unstake",
            Self::Claim => "Claim",
            Self::Compound => "Compound",
        }
    }
}

/// Only mined logs are observed, so every record is `Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionStatus {
    Completed,
}

/// One entry of a user's staking history, ready for the consumer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    /// Hash of the originating transaction.
    pub id: B256,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: String,
    /// Block time in milliseconds.
    pub timestamp: u64,
    pub status: TransactionStatus,
    pub block_number: u64,
    pub log_index: u64,
}

impl TransactionRecord {
    /// Unique key: one transaction can emit more than one tracked event.
    pub fn key(&self) -> (B256, u64) {
        (self.id, self.log_index)
    }

    /// `None` when the millisecond timestamp is outside chrono's range.
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.timestamp)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
    }
}

/// Newest first; equal timestamps fall back to block number, then log index.
pub fn recency_order(a: &TransactionRecord, b: &TransactionRecord) -> Ordering {
    b.timestamp
        .cmp(&a.timestamp)
        .then_with(|| b.block_number.cmp(&a.block_number))
        .then_with(|| b.log_index.cmp(&a.log_index))
}

/// Inclusive block range scanned by one fetch cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    /// `[tip - lookback, tip]`, never below `floor` or genesis.
    pub fn lookback(tip: u64, lookback: u64, floor: u64) -> Self {
        let from = tip.saturating_sub(lookback).max(floor).min(tip);
        Self { from, to: tip }
    }

    pub fn contains(&self, block: u64) -> bool {
        self.from <= block && block <= self.to
    }
}

/// Everything a log source needs to select one account's staking logs.
#[derive(Debug, Clone)]
pub struct LogQuery {
    pub contract: Address,
    pub signatures: Vec<B256>,
    pub user: Address,
    pub range: BlockRange,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp: u64, block_number: u64, log_index: u64) -> TransactionRecord {
        TransactionRecord {
            id: B256::repeat_byte(block_number as u8),
            kind: TransactionKind::Stake,
            amount: "1.0000".to_string(),
            timestamp,
            status: TransactionStatus::Completed,
            block_number,
            log_index,
        }
    }

    #[test]
    fn test_lookback_range() {
        assert_eq!(BlockRange::lookback(50_000, 10_000, 0), BlockRange { from: 40_000, to: 50_000 });
        // Young chains clamp at genesis instead of underflowing
        assert_eq!(BlockRange::lookback(500, 10_000, 0), BlockRange { from: 0, to: 500 });
        // Deployment block acts as a floor
        assert_eq!(BlockRange::lookback(50_000, 10_000, 45_000), BlockRange { from: 45_000, to: 50_000 });
        // A floor past the tip collapses to the tip
        assert_eq!(BlockRange::lookback(100, 10, 200), BlockRange { from: 100, to: 100 });
    }

    #[test]
    fn test_recency_order_breaks_ties() {
        let mut records = vec![record(1_000, 10, 0), record(2_000, 11, 0), record(1_000, 10, 3), record(1_000, 12, 0)];
        records.sort_by(recency_order);
        let keys: Vec<_> = records.iter().map(|r| (r.timestamp, r.block_number, r.log_index)).collect();
        assert_eq!(keys, vec![(2_000, 11, 0), (1_000, 12, 0), (1_000, 10, 3), (1_000, 10, 0)]);
    }

    #[test]
    fn test_occurred_at_out_of_range() {
        let date = record(1_700_000_000_000, 1, 0).occurred_at().unwrap();
        assert_eq!(date.to_rfc3339(), "2023-11-14T22:13:20+00:00");
        // Above i64::MAX, must not wrap around to a negative instant
        assert_eq!(record(u64::MAX, 1, 0).occurred_at(), None);
        assert_eq!(record(i64::MAX as u64 + 1, 1, 0).occurred_at(), None);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let json = serde_json::to_value(record(1_700_000_000_000, 7, 2)).unwrap();
        assert_eq!(json["type"], "Stake");
        assert_eq!(json["status"], "Completed");
        assert_eq!(json["blockNumber"], 7);
        assert_eq!(json["logIndex"], 2);
        assert_eq!(json["timestamp"], 1_700_000_000_000u64);
        assert!(json["id"].as_str().unwrap().starts_with("0x"));
    }
}
