use alloy::{
    primitives::{aliases::I24, Address, Bytes, B256, U256},
    sol_types::{SolCall, SolEvent},
};

use super::{Executor, Execution, TxLog};
use crate::{
    adapter::{ChainClient, Receipt},
    consts::{TICK_SPACING, U256_10},
    errors::{MathError, PipelineError},
    interfaces::INonfungiblePositionManager,
    math::{
        liquidity::{amounts_for_liquidity, liquidity_for_amounts, min_amount_with_slippage},
        tick::{get_sqrt_ratio_at_tick, tick_bounds},
    },
};

#[derive(Debug, Clone)]
pub struct MintRequest {
    pub max_amount0: U256,
    pub max_amount1: U256,
    pub range_width: i32,
    pub slippage_pct: u8,
}

#[derive(Debug, Clone)]
pub struct MintOutcome {
    pub token_id: U256,
    pub liquidity: u128,
    pub amount0: U256,
    pub amount1: U256,
    pub tick_lower: i32,
    pub tick_upper: i32,
}

impl<C> Executor<C>
where
    C: ChainClient,
{
    /// Opens a ranged position centered on the pool's current tick, bounded
    /// by the caller's token maximums.
    pub async fn mint(&self, request: MintRequest) -> Execution<MintOutcome> {
        let mut log = TxLog::default();
        let outcome = self.mint_inner(&request, &mut log).await;
        log.finish(outcome)
    }

    async fn mint_inner(
        &self,
        request: &MintRequest,
        log: &mut TxLog,
    ) -> Result<MintOutcome, PipelineError> {
        if request.max_amount0.is_zero() && request.max_amount1.is_zero() {
            return Err(PipelineError::Argument(
                "at least one token maximum must be positive".into(),
            ));
        }

        let pool = self.pool_state().await?;
        let (tick_lower, tick_upper) =
            tick_bounds(pool.tick, request.range_width, TICK_SPACING)?;

        let sqrt_lower = get_sqrt_ratio_at_tick(tick_lower)?;
        let sqrt_upper = get_sqrt_ratio_at_tick(tick_upper)?;
        let liquidity = liquidity_for_amounts(
            pool.sqrt_price_x96,
            sqrt_lower,
            sqrt_upper,
            request.max_amount0,
            request.max_amount1,
        )?;
        if liquidity == 0 {
            return Err(PipelineError::Validation(
                "token maximums produce zero liquidity".into(),
            ));
        }
        let (amount0, amount1) =
            amounts_for_liquidity(pool.sqrt_price_x96, sqrt_lower, sqrt_upper, liquidity)?;

        warn_if_undeployed("token0", request.max_amount0, amount0);
        warn_if_undeployed("token1", request.max_amount1, amount1);

        let (balance0, balance1) = self.token_balances().await?;
        if balance0 < amount0 || balance1 < amount1 {
            return Err(PipelineError::Validation(format!(
                "wallet balances {balance0}/{balance1} cannot fund deposit {amount0}/{amount1}"
            )));
        }

        let amount0_min = min_amount_with_slippage(amount0, request.slippage_pct)?;
        let amount1_min = min_amount_with_slippage(amount1, request.slippage_pct)?;

        if amount0 > U256::ZERO {
            self.ensure_allowance(
                self.book().token0,
                self.book().position_manager,
                amount0,
                log,
            )
            .await?;
        }
        if amount1 > U256::ZERO {
            self.ensure_allowance(
                self.book().token1,
                self.book().position_manager,
                amount1,
                log,
            )
            .await?;
        }

        let params = INonfungiblePositionManager::MintParams {
            token0: self.book().token0,
            token1: self.book().token1,
            deployer: Address::ZERO,
            tickLower: to_i24(tick_lower)?,
            tickUpper: to_i24(tick_upper)?,
            amount0Desired: amount0,
            amount1Desired: amount1,
            amount0Min: amount0_min,
            amount1Min: amount1_min,
            recipient: self.owner(),
            deadline: self.deadline(),
        };
        let calldata: Bytes = INonfungiblePositionManager::mintCall { params }
            .abi_encode()
            .into();

        let receipt = self
            .submit(self.book().position_manager, calldata, "Mint", log)
            .await?;
        let token_id = parse_minted_token_id(&receipt, self.book().position_manager)?;

        tracing::info!(
            %token_id,
            tick_lower,
            tick_upper,
            liquidity,
            "position minted"
        );

        Ok(MintOutcome {
            token_id,
            liquidity,
            amount0,
            amount1,
            tick_lower,
            tick_upper,
        })
    }
}

fn warn_if_undeployed(token: &str, max: U256, deposited: U256) {
    if max.is_zero() {
        return;
    }
    // more than 10% of the budget left idle
    if (max - deposited) * U256_10 > max {
        tracing::warn!(
            token,
            %max,
            %deposited,
            "over 10% of the budget stays undeployed at this price"
        );
    }
}

pub(crate) fn to_i24(tick: i32) -> Result<I24, MathError> {
    I24::try_from(tick).map_err(|_| MathError::TickOutOfBounds(tick))
}

/// Finds the ERC-721 Transfer minted by the position manager. Matching is by
/// emitting contract, event signature and zero `from`; the shape of any
/// preceding pool events is irrelevant.
fn parse_minted_token_id(
    receipt: &Receipt,
    position_manager: Address,
) -> Result<U256, PipelineError> {
    for log in &receipt.logs {
        if log.address != position_manager {
            continue;
        }
        if log.topics.len() != 4 {
            continue;
        }
        if log.topics[0] != INonfungiblePositionManager::Transfer::SIGNATURE_HASH {
            continue;
        }
        if log.topics[1] != B256::ZERO {
            continue;
        }
        return Ok(U256::from_be_bytes(log.topics[3].0));
    }

    Err(PipelineError::Validation(
        "mint receipt carries no position transfer from the zero address".into(),
    ))
}
