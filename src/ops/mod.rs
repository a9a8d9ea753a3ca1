pub mod approve;
pub mod mint;
pub mod stake;
pub mod swap;
pub mod withdraw;

use std::{sync::Arc, time::Duration};

use alloy::{
    primitives::{Address, Bytes, B256, U256},
    sol_types::SolCall,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    adapter::{ChainClient, Receipt},
    config::AddressBook,
    errors::{ChainError, PipelineError},
    interfaces::{IAlgebraPool, IERC20, INonfungiblePositionManager},
};

pub use mint::{MintOutcome, MintRequest};
pub use stake::{IncentiveKey, StakeOutcome, UnstakeOutcome};
pub use swap::{SwapOutcome, SwapRequest};
pub use withdraw::WithdrawOutcome;

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(3);
// retries after the initial send, backing off 1s/2s/4s
const MAX_SEND_RETRIES: u32 = 3;
const STATE_LAG_PAUSE: Duration = Duration::from_secs(5);

/// One attempted on-chain transaction, recorded in submission order.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub tx_hash: B256,
    pub gas_used: u128,
    pub gas_price: u128,
    pub gas_cost: U256,
    pub timestamp: DateTime<Utc>,
    pub operation: String,
}

/// Outcome of a pipeline plus everything it put on chain along the way.
/// Transactions and gas are retained even when the outcome is an error.
#[derive(Debug)]
pub struct Execution<T> {
    pub outcome: Result<T, PipelineError>,
    pub transactions: Vec<TransactionRecord>,
    pub total_gas_cost: U256,
}

impl<T> Execution<T> {
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error_message(&self) -> Option<String> {
        self.outcome.as_ref().err().map(|e| e.to_string())
    }
}

/// Accumulates transaction records while a pipeline runs.
#[derive(Debug, Default)]
pub(crate) struct TxLog {
    transactions: Vec<TransactionRecord>,
    total_gas_cost: U256,
}

impl TxLog {
    fn push(&mut self, record: TransactionRecord) {
        self.total_gas_cost += record.gas_cost;
        self.transactions.push(record);
    }

    pub(crate) fn finish<T>(self, outcome: Result<T, PipelineError>) -> Execution<T> {
        Execution {
            outcome,
            transactions: self.transactions,
            total_gas_cost: self.total_gas_cost,
        }
    }
}

/// Snapshot of the pool as reported by `safelyGetStateOfAMM`.
#[derive(Debug, Clone)]
pub struct PoolState {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub last_fee: u16,
    pub plugin_config: u8,
    pub liquidity: u128,
    pub next_tick: i32,
    pub previous_tick: i32,
}

pub(crate) fn decode_err(err: alloy::sol_types::Error) -> ChainError {
    ChainError::Encode(err.to_string())
}

/// Executes the multi-step transaction pipelines against one fixed market.
#[derive(Debug)]
pub struct Executor<C> {
    client: Arc<C>,
    owner: Address,
    book: AddressBook,
    deadline_skew: Duration,
    receipt_timeout: Duration,
}

impl<C> Executor<C>
where
    C: ChainClient,
{
    pub fn new(
        client: Arc<C>,
        owner: Address,
        book: AddressBook,
        deadline_skew: Duration,
        receipt_timeout: Duration,
    ) -> Self {
        Self {
            client,
            owner,
            book,
            deadline_skew,
            receipt_timeout,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn book(&self) -> &AddressBook {
        &self.book
    }

    pub(crate) fn client(&self) -> &C {
        &self.client
    }

    /// Unix deadline for on-chain operations, skewed past the wall clock.
    pub(crate) fn deadline(&self) -> U256 {
        let now = Utc::now().timestamp().max(0) as u64;
        U256::from(now + self.deadline_skew.as_secs())
    }

    pub async fn pool_state(&self) -> Result<PoolState, PipelineError> {
        let calldata: Bytes = IAlgebraPool::safelyGetStateOfAMMCall {}.abi_encode().into();
        let data = self.client.call(self.book.pool, calldata).await?;
        let state = IAlgebraPool::safelyGetStateOfAMMCall::abi_decode_returns(&data, true)
            .map_err(decode_err)?;

        Ok(PoolState {
            sqrt_price_x96: U256::from(state.sqrtPrice),
            tick: i32::try_from(state.tick)
                .map_err(|_| ChainError::Encode("tick exceeds i32".into()))?,
            last_fee: state.lastFee,
            plugin_config: state.pluginConfig,
            liquidity: state.activeLiquidity,
            next_tick: i32::try_from(state.nextTick)
                .map_err(|_| ChainError::Encode("tick exceeds i32".into()))?,
            previous_tick: i32::try_from(state.previousTick)
                .map_err(|_| ChainError::Encode("tick exceeds i32".into()))?,
        })
    }

    /// Wallet balances of the managed pair, one round trip.
    pub async fn token_balances(&self) -> Result<(U256, U256), PipelineError> {
        let call: Bytes = IERC20::balanceOfCall {
            account: self.owner,
        }
        .abi_encode()
        .into();
        let results = self
            .client
            .batch_call(&[
                (self.book.token0, call.clone()),
                (self.book.token1, call),
            ])
            .await?;
        if results.len() != 2 {
            return Err(ChainError::Encode("short batch response".into()).into());
        }

        let balance0 = IERC20::balanceOfCall::abi_decode_returns(&results[0], true)
            .map_err(decode_err)?
            ._0;
        let balance1 = IERC20::balanceOfCall::abi_decode_returns(&results[1], true)
            .map_err(decode_err)?
            ._0;
        Ok((balance0, balance1))
    }

    pub async fn erc20_balance(&self, token: Address) -> Result<U256, PipelineError> {
        let calldata: Bytes = IERC20::balanceOfCall {
            account: self.owner,
        }
        .abi_encode()
        .into();
        let data = self.client.call(token, calldata).await?;
        Ok(IERC20::balanceOfCall::abi_decode_returns(&data, true)
            .map_err(decode_err)?
            ._0)
    }

    pub async fn native_balance(&self) -> Result<U256, PipelineError> {
        Ok(self.client.native_balance(self.owner).await?)
    }

    /// Liquidity currently recorded for a position receipt.
    pub async fn position_liquidity(&self, token_id: U256) -> Result<u128, PipelineError> {
        let calldata: Bytes = INonfungiblePositionManager::positionsCall { tokenId: token_id }
            .abi_encode()
            .into();
        let data = self.client.call(self.book.position_manager, calldata).await?;
        Ok(
            INonfungiblePositionManager::positionsCall::abi_decode_returns(&data, true)
                .map_err(decode_err)?
                .liquidity,
        )
    }

    /// Broadcasts with bounded retries, waits for the receipt and records the
    /// attempt. Reverted transactions are recorded before the error returns,
    /// with the revert reason recovered by re-simulating the calldata.
    pub(crate) async fn submit(
        &self,
        to: Address,
        calldata: Bytes,
        operation: &'static str,
        log: &mut TxLog,
    ) -> Result<Receipt, PipelineError> {
        let tx_hash = self
            .send_with_retry(to, calldata.clone(), operation)
            .await?;

        match self
            .client
            .wait_for_receipt(tx_hash, RECEIPT_POLL_INTERVAL, self.receipt_timeout)
            .await
        {
            Ok(receipt) => {
                log.push(TransactionRecord {
                    tx_hash,
                    gas_used: receipt.gas_used,
                    gas_price: receipt.effective_gas_price,
                    gas_cost: receipt.gas_cost(),
                    timestamp: Utc::now(),
                    operation: operation.to_owned(),
                });
                if receipt.status {
                    Ok(receipt)
                } else {
                    let reason = self.revert_reason(to, calldata).await;
                    tracing::warn!(operation, ?tx_hash, %reason, "transaction reverted");
                    Err(ChainError::Reverted { tx_hash, reason }.into())
                }
            }
            Err(err @ ChainError::Timeout(_)) => {
                // the transaction may still land; record the attempt
                log.push(TransactionRecord {
                    tx_hash,
                    gas_used: 0,
                    gas_price: 0,
                    gas_cost: U256::ZERO,
                    timestamp: Utc::now(),
                    operation: operation.to_owned(),
                });
                Err(err.into())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Recovers the revert reason of a failed transaction by replaying its
    /// calldata as an eth_call; nodes hand the revert payload back as the
    /// call error.
    async fn revert_reason(&self, to: Address, calldata: Bytes) -> String {
        match self.client.call(to, calldata).await {
            Ok(_) => "unknown".to_owned(),
            Err(ChainError::StateLag(msg)) | Err(ChainError::Network(msg)) => msg,
            Err(err) => err.to_string(),
        }
    }

    async fn send_with_retry(
        &self,
        to: Address,
        calldata: Bytes,
        operation: &'static str,
    ) -> Result<B256, PipelineError> {
        let mut retries: u32 = 0;
        let mut state_lag_retried = false;

        loop {
            match self.client.send(to, calldata.clone()).await {
                Ok(tx_hash) => return Ok(tx_hash),
                Err(ChainError::StateLag(msg)) => {
                    if state_lag_retried {
                        return Err(ChainError::Network(msg).into());
                    }
                    tracing::warn!(operation, %msg, "node state lag, pausing before resend");
                    state_lag_retried = true;
                    tokio::time::sleep(STATE_LAG_PAUSE).await;
                }
                Err(ChainError::Network(msg)) if retries < MAX_SEND_RETRIES => {
                    let backoff = Duration::from_secs(1u64 << retries);
                    tracing::warn!(operation, %msg, ?backoff, "transport error, retrying send");
                    retries += 1;
                    tokio::time::sleep(backoff).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
