pub mod rpc;
#[cfg(test)]
pub mod scripted;

use std::time::Duration;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;

use crate::errors::ChainError;

/// One log emitted by a mined transaction.
#[derive(Debug, Clone, Default)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

/// The subset of a transaction receipt the strategy consumes.
#[derive(Debug, Clone, Default)]
pub struct Receipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub status: bool,
    pub gas_used: u128,
    pub effective_gas_price: u128,
    pub logs: Vec<LogEntry>,
}

impl Receipt {
    pub fn gas_cost(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

/// The strategy's only view of the chain. Implementations own transport,
/// signing and nonce discipline; callers never see key material.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Read-only eth_call against latest state.
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, ChainError>;

    /// Several read-only calls in a single round trip, results in input order.
    async fn batch_call(&self, calls: &[(Address, Bytes)]) -> Result<Vec<Bytes>, ChainError>;

    /// Signs and broadcasts a dynamic-fee transaction with a fresh nonce.
    async fn send(&self, to: Address, calldata: Bytes) -> Result<B256, ChainError>;

    /// Polls until the transaction is mined or `timeout` elapses. The receipt
    /// is returned whatever its status; callers inspect `Receipt::status`.
    async fn wait_for_receipt(
        &self,
        tx_hash: B256,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Receipt, ChainError>;

    async fn native_balance(&self, account: Address) -> Result<U256, ChainError>;
}
