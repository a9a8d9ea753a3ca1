use std::{
    collections::VecDeque,
    sync::Mutex,
    time::Duration,
};

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;

use super::{ChainClient, Receipt};
use crate::errors::ChainError;

/// Test double driven by queues of canned responses. Every request is
/// recorded so tests can assert on the exact calldata that was produced.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    calls: Mutex<VecDeque<Result<Bytes, ChainError>>>,
    batches: Mutex<VecDeque<Result<Vec<Bytes>, ChainError>>>,
    sends: Mutex<VecDeque<Result<B256, ChainError>>>,
    receipts: Mutex<VecDeque<Result<Receipt, ChainError>>>,
    balances: Mutex<VecDeque<Result<U256, ChainError>>>,

    pub queried: Mutex<Vec<(Address, Bytes)>>,
    pub submitted: Mutex<Vec<(Address, Bytes)>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_call(&self, response: Result<Bytes, ChainError>) {
        self.calls.lock().unwrap().push_back(response);
    }

    pub fn push_batch(&self, response: Result<Vec<Bytes>, ChainError>) {
        self.batches.lock().unwrap().push_back(response);
    }

    pub fn push_send(&self, response: Result<B256, ChainError>) {
        self.sends.lock().unwrap().push_back(response);
    }

    pub fn push_receipt(&self, response: Result<Receipt, ChainError>) {
        self.receipts.lock().unwrap().push_back(response);
    }

    pub fn push_balance(&self, response: Result<U256, ChainError>) {
        self.balances.lock().unwrap().push_back(response);
    }

    /// Scripts a send followed by a successful receipt for the same hash.
    pub fn push_mined_send(&self, tx_hash: B256, gas_used: u128, gas_price: u128) {
        self.push_send(Ok(tx_hash));
        self.push_receipt(Ok(Receipt {
            tx_hash,
            block_number: 1,
            status: true,
            gas_used,
            effective_gas_price: gas_price,
            logs: vec![],
        }));
    }

    pub fn submitted_calldata(&self) -> Vec<(Address, Bytes)> {
        self.submitted.lock().unwrap().clone()
    }

    fn unscripted(method: &str) -> ChainError {
        ChainError::Network(format!("no scripted response for {method}"))
    }
}

#[async_trait]
impl ChainClient for ScriptedClient {
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, ChainError> {
        self.queried.lock().unwrap().push((to, calldata));
        self.calls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted("call")))
    }

    async fn batch_call(&self, calls: &[(Address, Bytes)]) -> Result<Vec<Bytes>, ChainError> {
        let mut queried = self.queried.lock().unwrap();
        for (to, calldata) in calls {
            queried.push((*to, calldata.clone()));
        }
        drop(queried);
        self.batches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted("batch_call")))
    }

    async fn send(&self, to: Address, calldata: Bytes) -> Result<B256, ChainError> {
        self.submitted.lock().unwrap().push((to, calldata));
        self.sends
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted("send")))
    }

    async fn wait_for_receipt(
        &self,
        _tx_hash: B256,
        _poll_interval: Duration,
        _timeout: Duration,
    ) -> Result<Receipt, ChainError> {
        self.receipts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted("wait_for_receipt")))
    }

    async fn native_balance(&self, _account: Address) -> Result<U256, ChainError> {
        self.balances
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Self::unscripted("native_balance")))
    }
}
