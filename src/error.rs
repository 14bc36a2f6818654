use alloy::primitives::B256;
use thiserror::Error;

/// Failures that can end (or exclude part of) a history fetch cycle.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Node unreachable, transport error, or an unusable response.
    #[error("remote fetch failed during {operation}: {message}")]
    RemoteFetchFailure {
        operation: &'static str,
        message: String,
    },

    /// topic0 did not match any of the tracked staking events.
    #[error("unknown event kind with signature {signature}")]
    UnknownEventKind { signature: B256 },

    #[error("failed to resolve timestamp for block {block_hash}: {message}")]
    TimestampResolutionFailure { block_hash: B256, message: String },

    /// A log with a known signature whose payload or metadata is unusable.
    #[error("malformed log: {0}")]
    MalformedLog(String),
}

impl HistoryError {
    pub fn remote(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::RemoteFetchFailure {
            operation,
            message: err.to_string(),
        }
    }

    /// Short label for structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RemoteFetchFailure { .. } => "remote_fetch_failure",
            Self::UnknownEventKind { .. } => "unknown_event_kind",
            Self::TimestampResolutionFailure { .. } => "timestamp_resolution_failure",
            Self::MalformedLog(_) => "malformed_log",
        }
    }
}

pub type HistoryResult<T> = std::result::Result<T, HistoryError>;
