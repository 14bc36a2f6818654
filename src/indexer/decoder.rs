use alloy::primitives::{Address, B256, U256};
use alloy::rpc::types::Log;
use alloy::sol;
use alloy::sol_types::SolEvent;

use super::types::TransactionKind;
use crate::error::{HistoryError, HistoryResult};

// Staking contract events. `user` is the first indexed argument (topic1)
// on every one of them, which is what the log filter matches against.
sol! {
    event Staked(
        address indexed user,
        uint256 xfiAmount,
        uint256 sbftAmount,
        uint256 fee,
        uint256 unlockTime
    );

    event Unstaked(
        address indexed user,
        uint256 xfiAmount,
        uint256 sbftAmount
    );

    event RewardsClaimed(address indexed user, uint256 amount);

    event RewardsCompounded(address indexed user, uint256 amount);
}

/// topic0 values of every tracked event, in filter order.
pub fn tracked_signatures() -> Vec<B256> {
    vec![
        Staked::SIGNATURE_HASH,
        Unstaked::SIGNATURE_HASH,
        RewardsClaimed::SIGNATURE_HASH,
        RewardsCompounded::SIGNATURE_HASH,
    ]
}

/// Fully typed payload of a tracked event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakingEvent {
    Staked {
        xfi_amount: U256,
        sbft_amount: U256,
        fee: U256,
        unlock_time: U256,
    },
    Unstaked {
        xfi_amount: U256,
        sbft_amount: U256,
    },
    RewardsClaimed {
        amount: U256,
    },
    RewardsCompounded {
        amount: U256,
    },
}

impl StakingEvent {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Staked { .. } => TransactionKind::Stake,
            Self::Unstaked { .. } => TransactionKind::Unstake,
            Self::RewardsClaimed { .. } => TransactionKind::Claim,
            Self::RewardsCompounded { .. } => TransactionKind::Compound,
        }
    }

    /// The amount shown in history: XFI moved for stake/unstake, reward
    /// amount for claim/compound.
    pub fn display_amount(&self) -> U256 {
        match self {
            Self::Staked { xfi_amount, .. } | Self::Unstaked { xfi_amount, .. } => *xfi_amount,
            Self::RewardsClaimed { amount } | Self::RewardsCompounded { amount } => *amount,
        }
    }
}

/// A decoded log together with the chain position it came from.
#[derive(Debug, Clone)]
pub struct DecodedLog {
    pub user: Address,
    pub event: StakingEvent,
    pub tx_hash: B256,
    pub block_hash: B256,
    pub block_number: u64,
    pub log_index: u64,
}

/// Decode a raw log into one of the four tracked staking events.
///
/// Fails with `UnknownEventKind` when topic0 is not a tracked signature and
/// with `MalformedLog` when the payload or the log's position is unusable
/// (pending logs carry no block hash).
pub fn decode_staking_log(log: &Log) -> HistoryResult<DecodedLog> {
    let topics = log.inner.data.topics();
    let Some(&signature) = topics.first() else {
        return Err(HistoryError::MalformedLog("log has no topics".to_string()));
    };

    let (user, event) = if signature == Staked::SIGNATURE_HASH {
        let decoded = Staked::decode_log(&log.inner).map_err(|e| malformed("Staked", e))?;
        (
            decoded.user,
            StakingEvent::Staked {
                xfi_amount: decoded.xfiAmount,
                sbft_amount: decoded.sbftAmount,
                fee: decoded.fee,
                unlock_time: decoded.unlockTime,
            },
        )
    } else if signature == Unstaked::SIGNATURE_HASH {
        let decoded = Unstaked::decode_log(&log.inner).map_err(|e| malformed("Unstaked", e))?;
        (
            decoded.user,
            StakingEvent::Unstaked {
                xfi_amount: decoded.xfiAmount,
                sbft_amount: decoded.sbftAmount,
            },
        )
    } else if signature == RewardsClaimed::SIGNATURE_HASH {
        let decoded =
            RewardsClaimed::decode_log(&log.inner).map_err(|e| malformed("RewardsClaimed", e))?;
        (
            decoded.user,
            StakingEvent::RewardsClaimed {
                amount: decoded.amount,
            },
        )
    } else if signature == RewardsCompounded::SIGNATURE_HASH {
        let decoded = RewardsCompounded::decode_log(&log.inner)
            .map_err(|e| malformed("RewardsCompounded", e))?;
        (
            decoded.user,
            StakingEvent::RewardsCompounded {
                amount: decoded.amount,
            },
        )
    } else {
        return Err(HistoryError::UnknownEventKind { signature });
    };

    let tx_hash = log
        .transaction_hash
        .ok_or_else(|| HistoryError::MalformedLog("missing transaction hash".to_string()))?;
    let block_hash = log
        .block_hash
        .ok_or_else(|| HistoryError::MalformedLog(format!("missing block hash in tx {tx_hash}")))?;
    let block_number = log
        .block_number
        .ok_or_else(|| HistoryError::MalformedLog(format!("missing block number in tx {tx_hash}")))?;
    let log_index = log
        .log_index
        .ok_or_else(|| HistoryError::MalformedLog(format!("missing log index in tx {tx_hash}")))?;

    Ok(DecodedLog {
        user,
        event,
        tx_hash,
        block_hash,
        block_number,
        log_index,
    })
}

fn malformed(event: &str, err: impl std::fmt::Display) -> HistoryError {
    HistoryError::MalformedLog(format!("{event} payload did not decode: {err}"))
}
