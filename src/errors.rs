use alloy::primitives::{B256, U256};
use thiserror::Error;

/// Failures crossing the chain capability boundary.
#[derive(Error, Debug, Clone)]
pub enum ChainError {
    #[error("rpc transport error: {0}")]
    Network(String),
    #[error("abi encode/decode error: {0}")]
    Encode(String),
    #[error("signing failed: {0}")]
    Signer(String),
    #[error("transaction {tx_hash} reverted: {reason}")]
    Reverted { tx_hash: B256, reason: String },
    #[error("no receipt for {0} within timeout")]
    Timeout(B256),
    #[error("node state lagging: {0}")]
    StateLag(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("tick {0} outside the permitted range")]
    TickOutOfBounds(i32),
    #[error("sqrt price {0} outside the permitted range")]
    SqrtPriceOutOfBounds(U256),
    #[error("empty tick range {0}..{1}")]
    InvalidTickRange(i32, i32),
    #[error("slippage percent {0} outside 0..=100")]
    InvalidSlippage(u8),
    #[error("tick spacing {0} must be positive")]
    InvalidTickSpacing(i32),
    #[error("range width {0} must be positive")]
    InvalidRangeWidth(i32),
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
}

/// Failure of one on-chain operation pipeline. The surrounding
/// [`Execution`](crate::ops::Execution) still carries every transaction
/// attempted before the failure.
#[derive(Error, Debug, Clone)]
pub enum PipelineError {
    #[error("invalid argument: {0}")]
    Argument(String),
    #[error("precondition failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Math(#[from] MathError),
}

impl PipelineError {
    /// Errors that can never be resolved by retrying within the run.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            PipelineError::Chain(ChainError::Encode(_)) | PipelineError::Chain(ChainError::Signer(_))
        )
    }

    /// Errors counted by the circuit breaker's sliding window.
    pub fn counts_toward_breaker(&self) -> bool {
        matches!(
            self,
            PipelineError::Chain(ChainError::Network(_))
                | PipelineError::Chain(ChainError::Reverted { .. })
                | PipelineError::Chain(ChainError::Timeout(_))
                | PipelineError::Chain(ChainError::StateLag(_))
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PipelineError::Chain(ChainError::Timeout(_)))
    }

    pub fn is_revert(&self) -> bool {
        matches!(self, PipelineError::Chain(ChainError::Reverted { .. }))
    }

    /// Reverts whose cause clears on its own. STF surfaces when a token
    /// transfer races an approval or a lagging node; slippage guards fail
    /// only while the price is moving. Both are safe to retry on a later
    /// tick; any other revert is not.
    pub fn is_transient_revert(&self) -> bool {
        let PipelineError::Chain(ChainError::Reverted { reason, .. }) = self else {
            return false;
        };
        let reason = reason.to_ascii_lowercase();
        reason.contains("stf")
            || reason.contains("slippage")
            || reason.contains("too little received")
            || reason.contains("price slippage check")
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("{field} out of range: {reason}")]
    OutOfRange {
        field: &'static str,
        reason: String,
    },
}

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("strategy halted: {0}")]
    Halted(String),
    #[error("shutdown requested")]
    Canceled,
}

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("snapshot sink unavailable: {0}")]
    Unavailable(String),
}
