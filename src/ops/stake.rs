use alloy::{
    primitives::{Address, Bytes, B256, U256},
    sol_types::SolCall,
};

use super::{decode_err, Executor, Execution, TxLog};
use crate::{
    adapter::ChainClient,
    errors::PipelineError,
    interfaces::{IFarmingCenter, IGauge},
};

/// Identifies one farming incentive on the farming center.
#[derive(Debug, Clone)]
pub struct IncentiveKey {
    pub reward_token: Address,
    pub bonus_reward_token: Address,
    pub pool: Address,
    pub nonce: U256,
}

impl IncentiveKey {
    fn to_sol(&self) -> IFarmingCenter::IncentiveKey {
        IFarmingCenter::IncentiveKey {
            rewardToken: self.reward_token,
            bonusRewardToken: self.bonus_reward_token,
            pool: self.pool,
            nonce: self.nonce,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StakeOutcome {
    pub tx_hash: B256,
}

#[derive(Debug, Clone)]
pub struct UnstakeOutcome {
    pub tx_hash: B256,
    pub reward: U256,
    pub bonus_reward: U256,
}

impl<C> Executor<C>
where
    C: ChainClient,
{
    /// Deposits the position receipt into the gauge so it earns incentives.
    pub async fn stake(&self, token_id: U256) -> Execution<StakeOutcome> {
        let mut log = TxLog::default();
        let outcome = self.stake_inner(token_id, &mut log).await;
        log.finish(outcome)
    }

    async fn stake_inner(
        &self,
        token_id: U256,
        log: &mut TxLog,
    ) -> Result<StakeOutcome, PipelineError> {
        if token_id.is_zero() {
            return Err(PipelineError::Argument("token id must be positive".into()));
        }

        let holder = self.owner_of(token_id).await?;
        if holder != self.owner() {
            return Err(PipelineError::Validation(format!(
                "position {token_id} is held by {holder}, not the strategy owner"
            )));
        }

        self.ensure_nft_approval(token_id, self.book().gauge, log)
            .await?;

        let calldata: Bytes = IGauge::depositCall { tokenId: token_id }.abi_encode().into();
        let receipt = self.submit(self.book().gauge, calldata, "Stake", log).await?;

        tracing::info!(%token_id, tx_hash = ?receipt.tx_hash, "position staked");
        Ok(StakeOutcome {
            tx_hash: receipt.tx_hash,
        })
    }

    /// Exits farming through the farming center's multicall, optionally
    /// collecting accrued rewards in the same transaction.
    pub async fn unstake(
        &self,
        token_id: U256,
        key: &IncentiveKey,
        collect_rewards: bool,
    ) -> Execution<UnstakeOutcome> {
        let mut log = TxLog::default();
        let outcome = self
            .unstake_inner(token_id, key, collect_rewards, &mut log)
            .await;
        log.finish(outcome)
    }

    async fn unstake_inner(
        &self,
        token_id: U256,
        key: &IncentiveKey,
        collect_rewards: bool,
        log: &mut TxLog,
    ) -> Result<UnstakeOutcome, PipelineError> {
        if token_id.is_zero() {
            return Err(PipelineError::Argument("token id must be positive".into()));
        }
        if key.pool != self.book().pool {
            return Err(PipelineError::Argument(
                "incentive key targets a foreign pool".into(),
            ));
        }

        let deposits: Bytes = IFarmingCenter::depositsCall { tokenId: token_id }
            .abi_encode()
            .into();
        let data = self.client().call(self.book().farming_center, deposits).await?;
        let incentive_id = IFarmingCenter::depositsCall::abi_decode_returns(&data, true)
            .map_err(decode_err)?
            .incentiveId;
        if incentive_id == B256::ZERO {
            return Err(PipelineError::Validation(format!(
                "position {token_id} is not farming"
            )));
        }

        let mut inner_calls: Vec<Bytes> = vec![IFarmingCenter::exitFarmingCall {
            key: key.to_sol(),
            tokenId: token_id,
        }
        .abi_encode()
        .into()];
        if collect_rewards {
            inner_calls.push(
                IFarmingCenter::collectRewardsCall {
                    key: key.to_sol(),
                    tokenId: token_id,
                }
                .abi_encode()
                .into(),
            );
        }

        let multicall: Bytes = IFarmingCenter::multicallCall { data: inner_calls }
            .abi_encode()
            .into();

        // Return data of a broadcast transaction is unobservable, so the
        // reward amounts come from simulating the very same multicall first.
        let (reward, bonus_reward) = if collect_rewards {
            let simulated = self
                .client()
                .call(self.book().farming_center, multicall.clone())
                .await?;
            let results = IFarmingCenter::multicallCall::abi_decode_returns(&simulated, true)
                .map_err(decode_err)?
                .results;
            let collected = results
                .get(1)
                .ok_or_else(|| PipelineError::Validation("multicall simulation came back short".into()))?;
            let rewards = IFarmingCenter::collectRewardsCall::abi_decode_returns(collected, true)
                .map_err(decode_err)?;
            (rewards.reward, rewards.bonusReward)
        } else {
            (U256::ZERO, U256::ZERO)
        };

        let receipt = self
            .submit(self.book().farming_center, multicall, "Unstake", log)
            .await?;

        tracing::info!(
            %token_id,
            %reward,
            %bonus_reward,
            tx_hash = ?receipt.tx_hash,
            "position unstaked"
        );
        Ok(UnstakeOutcome {
            tx_hash: receipt.tx_hash,
            reward,
            bonus_reward,
        })
    }
}
