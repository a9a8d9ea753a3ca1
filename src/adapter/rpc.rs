use std::{marker::PhantomData, sync::Arc, time::Duration};

use alloy::{
    network::{Ethereum, TransactionBuilder},
    primitives::{Address, Bytes, B256, U256},
    providers::Provider,
    rpc::types::eth::{BlockNumberOrTag, TransactionReceipt, TransactionRequest},
    transports::{RpcError, Transport, TransportErrorKind},
};
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{ChainClient, LogEntry, Receipt};
use crate::{
    consts::{MAX_FEE_BUMP_WEI, PRIORITY_TIP_WEI},
    errors::ChainError,
};

/// Live [`ChainClient`] over any alloy provider. The provider is expected to
/// carry a wallet filler so submitted transactions are signed locally.
#[derive(Debug)]
pub struct RpcClient<T, P> {
    provider: Arc<P>,
    owner: Address,
    // nonce allocation is serialized so concurrent sends cannot collide
    nonce_lock: Mutex<()>,
    transport: PhantomData<T>,
}

impl<T, P> RpcClient<T, P>
where
    T: Transport + Clone,
    P: Provider<T, Ethereum>,
{
    pub fn new(provider: Arc<P>, owner: Address) -> Self {
        Self {
            provider,
            owner,
            nonce_lock: Mutex::new(()),
            transport: PhantomData,
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }
}

fn map_rpc_error(err: RpcError<TransportErrorKind>) -> ChainError {
    match err {
        RpcError::SerError(e) => ChainError::Encode(e.to_string()),
        RpcError::DeserError { err, .. } => ChainError::Encode(err.to_string()),
        RpcError::LocalUsageError(e) => ChainError::Signer(e.to_string()),
        RpcError::ErrorResp(payload) if payload.message.contains("execution reverted") => {
            // Gas estimation against a node that has not caught up yet
            ChainError::StateLag(payload.message.to_string())
        }
        other => ChainError::Network(other.to_string()),
    }
}

fn convert_receipt(receipt: TransactionReceipt) -> Receipt {
    let logs = receipt
        .inner
        .logs()
        .iter()
        .map(|log| LogEntry {
            address: log.address(),
            topics: log.topics().to_vec(),
            data: log.inner.data.data.clone(),
        })
        .collect();

    Receipt {
        tx_hash: receipt.transaction_hash,
        block_number: receipt.block_number.unwrap_or_default(),
        status: receipt.status(),
        gas_used: receipt.gas_used,
        effective_gas_price: receipt.effective_gas_price,
        logs,
    }
}

#[async_trait]
impl<T, P> ChainClient for RpcClient<T, P>
where
    T: Transport + Clone,
    P: Provider<T, Ethereum> + 'static,
{
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, ChainError> {
        let tx = TransactionRequest::default()
            .with_to(to)
            .with_input(calldata);
        self.provider.call(&tx).await.map_err(map_rpc_error)
    }

    async fn batch_call(&self, calls: &[(Address, Bytes)]) -> Result<Vec<Bytes>, ChainError> {
        let mut batch = alloy::rpc::client::BatchRequest::new(self.provider.client());

        let mut waiters = Vec::with_capacity(calls.len());
        for (to, calldata) in calls {
            let tx = TransactionRequest::default()
                .with_to(*to)
                .with_input(calldata.clone());
            let waiter = batch
                .add_call::<_, Bytes>("eth_call", &(tx, BlockNumberOrTag::Latest))
                .map_err(map_rpc_error)?;
            waiters.push(waiter);
        }

        batch.send().await.map_err(map_rpc_error)?;

        futures::future::try_join_all(waiters)
            .await
            .map_err(map_rpc_error)
    }

    async fn send(&self, to: Address, calldata: Bytes) -> Result<B256, ChainError> {
        let _guard = self.nonce_lock.lock().await;

        let nonce = self
            .provider
            .get_transaction_count(self.owner)
            .await
            .map_err(map_rpc_error)?;

        let latest = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest, false)
            .await
            .map_err(map_rpc_error)?
            .ok_or_else(|| ChainError::Network("latest block unavailable".into()))?;
        let base_fee = latest.header.base_fee_per_gas.unwrap_or_default() as u128;

        let tx = TransactionRequest::default()
            .with_from(self.owner)
            .with_to(to)
            .with_input(calldata)
            .with_nonce(nonce)
            .with_max_fee_per_gas(base_fee + MAX_FEE_BUMP_WEI)
            .with_max_priority_fee_per_gas(PRIORITY_TIP_WEI);

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(map_rpc_error)?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: B256,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Receipt, ChainError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match self.provider.get_transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(convert_receipt(receipt)),
                Ok(None) => {}
                Err(e) => return Err(map_rpc_error(e)),
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(ChainError::Timeout(tx_hash));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    async fn native_balance(&self, account: Address) -> Result<U256, ChainError> {
        self.provider
            .get_balance(account)
            .await
            .map_err(map_rpc_error)
    }
}
