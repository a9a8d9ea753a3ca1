use alloy::primitives::U256;

use crate::{
    consts::{Q96, U256_100, U256_2},
    errors::MathError,
    math::liquidity::mul_div,
};

/// Which side of the pair is sold to restore balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapDirection {
    Token0ToToken1,
    Token1ToToken0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebalancePlan {
    pub direction: SwapDirection,
    pub amount_in: U256,
}

// Imbalances below 1% of total value are not worth a swap.
const REBALANCE_THRESHOLD_PCT: u64 = 1;

/// Decides which token to sell, and how much, to bring the wallet to 50/50
/// value at the pool's current price. All arithmetic stays in wei-integer
/// space; token0 value is expressed in token1 units through the raw
/// sqrt-price ratio.
pub fn calculate_rebalance(
    balance0: U256,
    balance1: U256,
    sqrt_price_x96: U256,
) -> Result<Option<RebalancePlan>, MathError> {
    if sqrt_price_x96.is_zero() {
        return Err(MathError::SqrtPriceOutOfBounds(sqrt_price_x96));
    }

    let value0 = mul_div(
        mul_div(balance0, sqrt_price_x96, Q96)?,
        sqrt_price_x96,
        Q96,
    )?;
    let value1 = balance1;
    let total = value0 + value1;
    if total.is_zero() {
        return Ok(None);
    }

    let gap = value0.abs_diff(value1);
    if gap * U256_100 < total * U256::from(REBALANCE_THRESHOLD_PCT) {
        return Ok(None);
    }

    let excess_value = gap / U256_2;
    let plan = if value0 > value1 {
        // sell token0: convert the excess token1-denominated value back
        let amount_in = mul_div(
            mul_div(excess_value, Q96, sqrt_price_x96)?,
            Q96,
            sqrt_price_x96,
        )?;
        RebalancePlan {
            direction: SwapDirection::Token0ToToken1,
            amount_in,
        }
    } else {
        RebalancePlan {
            direction: SwapDirection::Token1ToToken0,
            amount_in: excess_value,
        }
    };

    if plan.amount_in.is_zero() {
        return Ok(None);
    }
    Ok(Some(plan))
}

/// Expected output of swapping `amount_in` at the current price, before
/// slippage. Used to derive the router's minimum-out guard.
pub fn expected_swap_output(
    amount_in: U256,
    direction: SwapDirection,
    sqrt_price_x96: U256,
) -> Result<U256, MathError> {
    if sqrt_price_x96.is_zero() {
        return Err(MathError::SqrtPriceOutOfBounds(sqrt_price_x96));
    }
    match direction {
        SwapDirection::Token0ToToken1 => mul_div(
            mul_div(amount_in, sqrt_price_x96, Q96)?,
            sqrt_price_x96,
            Q96,
        ),
        SwapDirection::Token1ToToken0 => mul_div(
            mul_div(amount_in, Q96, sqrt_price_x96)?,
            Q96,
            sqrt_price_x96,
        ),
    }
}
