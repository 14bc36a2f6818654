use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::indexer::types::TransactionRecord;
use crate::tracker::HistoryState;

pub fn parse_address(s: &str) -> Result<Address, String> {
    Address::from_str(s.trim()).map_err(|e| format!("Invalid address '{}': {}", s, e))
}

// ============================================================
// Requests
// ============================================================

#[derive(Debug, Deserialize)]
pub struct AccountRequest {
    /// `null` disconnects the account.
    pub address: Option<String>,
}

// ============================================================
// Responses
// ============================================================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub chain: String,
    pub contract: Address,
    pub account: Option<Address>,
    pub generation: u64,
    pub is_loading: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    #[serde(flatten)]
    pub record: TransactionRecord,
    /// `null` when the block time cannot be represented.
    pub date: Option<DateTime<Utc>>,
}

impl From<TransactionRecord> for TransactionView {
    fn from(record: TransactionRecord) -> Self {
        let date = record.occurred_at();
        Self { record, date }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub account: Option<Address>,
    pub transactions: Vec<TransactionView>,
    pub is_loading: bool,
    /// Absent for one-shot queries, which are not tracker cycles.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
}

impl From<HistoryState> for HistoryResponse {
    fn from(state: HistoryState) -> Self {
        Self {
            account: state.account,
            transactions: state.transactions.into_iter().map(Into::into).collect(),
            is_loading: state.is_loading,
            generation: Some(state.generation),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerResponse {
    pub account: Option<Address>,
    /// Whether a new fetch cycle was started.
    pub started: bool,
    pub generation: u64,
}
