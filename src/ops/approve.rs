use alloy::{
    primitives::{Address, Bytes, B256, U256},
    sol_types::SolCall,
};

use super::{decode_err, Executor, TxLog};
use crate::{
    adapter::ChainClient,
    errors::PipelineError,
    interfaces::{IERC20, INonfungiblePositionManager},
};

impl<C> Executor<C>
where
    C: ChainClient,
{
    /// Grants `spender` an ERC-20 allowance of `required` unless the current
    /// allowance already covers it. Returns the zero hash when no transaction
    /// was needed, so repeated calls within a run are free.
    pub(crate) async fn ensure_allowance(
        &self,
        token: Address,
        spender: Address,
        required: U256,
        log: &mut TxLog,
    ) -> Result<B256, PipelineError> {
        let calldata: Bytes = IERC20::allowanceCall {
            owner: self.owner(),
            spender,
        }
        .abi_encode()
        .into();
        let data = self.client().call(token, calldata).await?;
        let current = IERC20::allowanceCall::abi_decode_returns(&data, true)
            .map_err(decode_err)?
            ._0;

        if current >= required {
            tracing::debug!(?token, ?spender, "allowance already sufficient");
            return Ok(B256::ZERO);
        }

        let approve: Bytes = IERC20::approveCall {
            spender,
            amount: required,
        }
        .abi_encode()
        .into();
        let receipt = self.submit(token, approve, "Approve", log).await?;
        Ok(receipt.tx_hash)
    }

    /// ERC-721 flavor of [`ensure_allowance`] for the position receipt.
    pub(crate) async fn ensure_nft_approval(
        &self,
        token_id: U256,
        spender: Address,
        log: &mut TxLog,
    ) -> Result<B256, PipelineError> {
        let calldata: Bytes = INonfungiblePositionManager::getApprovedCall { tokenId: token_id }
            .abi_encode()
            .into();
        let data = self
            .client()
            .call(self.book().position_manager, calldata)
            .await?;
        let approved = INonfungiblePositionManager::getApprovedCall::abi_decode_returns(&data, true)
            .map_err(decode_err)?
            ._0;

        if approved == spender {
            tracing::debug!(%token_id, ?spender, "position already approved");
            return Ok(B256::ZERO);
        }

        let approve: Bytes = INonfungiblePositionManager::approveCall {
            to: spender,
            tokenId: token_id,
        }
        .abi_encode()
        .into();
        let receipt = self
            .submit(self.book().position_manager, approve, "ApproveNft", log)
            .await?;
        Ok(receipt.tx_hash)
    }

    pub(crate) async fn owner_of(&self, token_id: U256) -> Result<Address, PipelineError> {
        let calldata: Bytes = INonfungiblePositionManager::ownerOfCall { tokenId: token_id }
            .abi_encode()
            .into();
        let data = self
            .client()
            .call(self.book().position_manager, calldata)
            .await?;
        Ok(
            INonfungiblePositionManager::ownerOfCall::abi_decode_returns(&data, true)
                .map_err(decode_err)?
                ._0,
        )
    }
}
