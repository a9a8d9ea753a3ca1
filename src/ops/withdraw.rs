use alloy::{
    primitives::{Bytes, B256, U256},
    sol_types::SolCall,
};

use super::{Executor, Execution, TxLog};
use crate::{adapter::ChainClient, errors::PipelineError, interfaces::INonfungiblePositionManager};

#[derive(Debug, Clone)]
pub struct WithdrawOutcome {
    pub tx_hash: B256,
    pub liquidity_removed: u128,
}

impl<C> Executor<C>
where
    C: ChainClient,
{
    /// Unwinds the position in one multicall: drain its liquidity, collect
    /// everything owed, burn the receipt.
    pub async fn withdraw(&self, token_id: U256) -> Execution<WithdrawOutcome> {
        let mut log = TxLog::default();
        let outcome = self.withdraw_inner(token_id, &mut log).await;
        log.finish(outcome)
    }

    async fn withdraw_inner(
        &self,
        token_id: U256,
        log: &mut TxLog,
    ) -> Result<WithdrawOutcome, PipelineError> {
        if token_id.is_zero() {
            return Err(PipelineError::Argument("token id must be positive".into()));
        }

        let holder = self.owner_of(token_id).await?;
        if holder != self.owner() {
            return Err(PipelineError::Validation(format!(
                "position {token_id} is held by {holder}, not the strategy owner"
            )));
        }

        let liquidity = self.position_liquidity(token_id).await?;

        let mut inner_calls: Vec<Bytes> = Vec::with_capacity(3);
        if liquidity > 0 {
            inner_calls.push(
                INonfungiblePositionManager::decreaseLiquidityCall {
                    params: INonfungiblePositionManager::DecreaseLiquidityParams {
                        tokenId: token_id,
                        liquidity,
                        amount0Min: U256::ZERO,
                        amount1Min: U256::ZERO,
                        deadline: self.deadline(),
                    },
                }
                .abi_encode()
                .into(),
            );
        }
        inner_calls.push(
            INonfungiblePositionManager::collectCall {
                params: INonfungiblePositionManager::CollectParams {
                    tokenId: token_id,
                    recipient: self.owner(),
                    amount0Max: u128::MAX,
                    amount1Max: u128::MAX,
                },
            }
            .abi_encode()
            .into(),
        );
        inner_calls.push(
            INonfungiblePositionManager::burnCall { tokenId: token_id }
                .abi_encode()
                .into(),
        );

        let multicall: Bytes = INonfungiblePositionManager::multicallCall { data: inner_calls }
            .abi_encode()
            .into();
        let receipt = self
            .submit(self.book().position_manager, multicall, "Withdraw", log)
            .await?;

        tracing::info!(
            %token_id,
            liquidity,
            tx_hash = ?receipt.tx_hash,
            "position withdrawn and burned"
        );
        Ok(WithdrawOutcome {
            tx_hash: receipt.tx_hash,
            liquidity_removed: liquidity,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use alloy::{
        primitives::{address, aliases::I24, Address},
        sol_types::SolValue,
    };

    use super::*;
    use crate::{adapter::scripted::ScriptedClient, config::AddressBook};

    const OWNER: Address = address!("00000000000000000000000000000000000000aa");

    fn executor(client: Arc<ScriptedClient>) -> Executor<ScriptedClient> {
        Executor::new(
            client,
            OWNER,
            AddressBook::default(),
            Duration::from_secs(1200),
            Duration::from_secs(300),
        )
    }

    fn encoded_position(liquidity: u128) -> Bytes {
        let book = AddressBook::default();
        (
            U256::ZERO,
            Address::ZERO,
            book.token0,
            book.token1,
            I24::try_from(-251800).unwrap(),
            I24::try_from(-250600).unwrap(),
            liquidity,
            U256::ZERO,
            U256::ZERO,
            0u128,
            0u128,
        )
            .abi_encode_params()
            .into()
    }

    #[tokio::test]
    async fn withdraw_composes_decrease_collect_burn() {
        let client = Arc::new(ScriptedClient::new());
        client.push_call(Ok(OWNER.abi_encode().into()));
        client.push_call(Ok(encoded_position(987_654_321)));
        client.push_mined_send(B256::repeat_byte(0x61), 380_000, 25_000_000_000);

        let executor = executor(client.clone());
        let execution = executor.withdraw(U256::from(8812u64)).await;

        let outcome = execution.outcome.unwrap();
        assert_eq!(outcome.liquidity_removed, 987_654_321);

        let submitted = client.submitted_calldata();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].0, executor.book().position_manager);

        let decoded =
            INonfungiblePositionManager::multicallCall::abi_decode(&submitted[0].1, true).unwrap();
        assert_eq!(decoded.data.len(), 3);

        let decrease =
            INonfungiblePositionManager::decreaseLiquidityCall::abi_decode(&decoded.data[0], true)
                .unwrap();
        assert_eq!(decrease.params.tokenId, U256::from(8812u64));
        assert_eq!(decrease.params.liquidity, 987_654_321);

        let collect =
            INonfungiblePositionManager::collectCall::abi_decode(&decoded.data[1], true).unwrap();
        assert_eq!(collect.params.recipient, OWNER);
        assert_eq!(collect.params.amount0Max, u128::MAX);
        assert_eq!(collect.params.amount1Max, u128::MAX);

        let burn =
            INonfungiblePositionManager::burnCall::abi_decode(&decoded.data[2], true).unwrap();
        assert_eq!(burn.tokenId, U256::from(8812u64));
    }

    #[tokio::test]
    async fn withdraw_of_an_empty_position_skips_decrease() {
        let client = Arc::new(ScriptedClient::new());
        client.push_call(Ok(OWNER.abi_encode().into()));
        client.push_call(Ok(encoded_position(0)));
        client.push_mined_send(B256::repeat_byte(0x62), 150_000, 25_000_000_000);

        let executor = executor(client.clone());
        let execution = executor.withdraw(U256::from(8812u64)).await;
        assert!(execution.success());

        let decoded = INonfungiblePositionManager::multicallCall::abi_decode(
            &client.submitted_calldata()[0].1,
            true,
        )
        .unwrap();
        assert_eq!(decoded.data.len(), 2);
    }

    #[tokio::test]
    async fn withdraw_refuses_a_foreign_position() {
        let client = Arc::new(ScriptedClient::new());
        client.push_call(Ok(address!("00000000000000000000000000000000000000cc")
            .abi_encode()
            .into()));

        let executor = executor(client.clone());
        let execution = executor.withdraw(U256::from(8812u64)).await;
        assert!(matches!(
            execution.outcome,
            Err(PipelineError::Validation(_))
        ));
        assert!(client.submitted_calldata().is_empty());
    }
}
