use alloy::primitives::{U256, U512};

use crate::{consts::Q96, errors::MathError};

fn widen(x: U256) -> U512 {
    let limbs = x.as_limbs();
    U512::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3], 0, 0, 0, 0])
}

fn narrow(x: U512) -> Result<U256, MathError> {
    let limbs = x.as_limbs();
    if limbs[4..].iter().any(|limb| *limb != 0) {
        return Err(MathError::Overflow);
    }
    Ok(U256::from_limbs([limbs[0], limbs[1], limbs[2], limbs[3]]))
}

/// floor(a * b / denominator) with a full 512-bit intermediate.
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Result<U256, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    let product = widen(a)
        .checked_mul(widen(b))
        .ok_or(MathError::Overflow)?;
    narrow(product / widen(denominator))
}

/// The largest liquidity funded entirely by `amount0` over
/// `[sqrt_ratio_a, sqrt_ratio_b]`.
pub fn liquidity_for_amount0(
    sqrt_ratio_a: U256,
    sqrt_ratio_b: U256,
    amount0: U256,
) -> Result<u128, MathError> {
    let (lower, upper) = sort_ratios(sqrt_ratio_a, sqrt_ratio_b)?;
    let intermediate = mul_div(lower, upper, Q96)?;
    let liquidity = mul_div(amount0, intermediate, upper - lower)?;
    u128::try_from(liquidity).map_err(|_| MathError::Overflow)
}

/// The largest liquidity funded entirely by `amount1` over
/// `[sqrt_ratio_a, sqrt_ratio_b]`.
pub fn liquidity_for_amount1(
    sqrt_ratio_a: U256,
    sqrt_ratio_b: U256,
    amount1: U256,
) -> Result<u128, MathError> {
    let (lower, upper) = sort_ratios(sqrt_ratio_a, sqrt_ratio_b)?;
    let liquidity = mul_div(amount1, Q96, upper - lower)?;
    u128::try_from(liquidity).map_err(|_| MathError::Overflow)
}

/// The largest liquidity such that the amounts required at
/// `sqrt_ratio_current` stay within `amount0` and `amount1`.
pub fn liquidity_for_amounts(
    sqrt_ratio_current: U256,
    sqrt_ratio_a: U256,
    sqrt_ratio_b: U256,
    amount0: U256,
    amount1: U256,
) -> Result<u128, MathError> {
    let (lower, upper) = sort_ratios(sqrt_ratio_a, sqrt_ratio_b)?;

    if sqrt_ratio_current <= lower {
        liquidity_for_amount0(lower, upper, amount0)
    } else if sqrt_ratio_current < upper {
        let liquidity0 = liquidity_for_amount0(sqrt_ratio_current, upper, amount0)?;
        let liquidity1 = liquidity_for_amount1(lower, sqrt_ratio_current, amount1)?;
        Ok(liquidity0.min(liquidity1))
    } else {
        liquidity_for_amount1(lower, upper, amount1)
    }
}

/// token0 owed for `liquidity` over `[sqrt_ratio_a, sqrt_ratio_b]`, rounded down.
pub fn amount0_for_liquidity(
    sqrt_ratio_a: U256,
    sqrt_ratio_b: U256,
    liquidity: u128,
) -> Result<U256, MathError> {
    let (lower, upper) = sort_ratios(sqrt_ratio_a, sqrt_ratio_b)?;
    let numerator = mul_div(U256::from(liquidity) << 96, upper - lower, upper)?;
    Ok(numerator / lower)
}

/// token1 owed for `liquidity` over `[sqrt_ratio_a, sqrt_ratio_b]`, rounded down.
pub fn amount1_for_liquidity(
    sqrt_ratio_a: U256,
    sqrt_ratio_b: U256,
    liquidity: u128,
) -> Result<U256, MathError> {
    let (lower, upper) = sort_ratios(sqrt_ratio_a, sqrt_ratio_b)?;
    mul_div(U256::from(liquidity), upper - lower, Q96)
}

/// Token amounts a position of `liquidity` holds at `sqrt_ratio_current`.
pub fn amounts_for_liquidity(
    sqrt_ratio_current: U256,
    sqrt_ratio_a: U256,
    sqrt_ratio_b: U256,
    liquidity: u128,
) -> Result<(U256, U256), MathError> {
    let (lower, upper) = sort_ratios(sqrt_ratio_a, sqrt_ratio_b)?;

    if sqrt_ratio_current <= lower {
        Ok((amount0_for_liquidity(lower, upper, liquidity)?, U256::ZERO))
    } else if sqrt_ratio_current < upper {
        Ok((
            amount0_for_liquidity(sqrt_ratio_current, upper, liquidity)?,
            amount1_for_liquidity(lower, sqrt_ratio_current, liquidity)?,
        ))
    } else {
        Ok((U256::ZERO, amount1_for_liquidity(lower, upper, liquidity)?))
    }
}

/// desired * (100 - slippage_pct) / 100, truncating toward zero.
pub fn min_amount_with_slippage(desired: U256, slippage_pct: u8) -> Result<U256, MathError> {
    if slippage_pct > 100 {
        return Err(MathError::InvalidSlippage(slippage_pct));
    }
    mul_div(
        desired,
        U256::from(100 - slippage_pct),
        U256::from(100u8),
    )
}

fn sort_ratios(a: U256, b: U256) -> Result<(U256, U256), MathError> {
    if a.is_zero() || b.is_zero() {
        return Err(MathError::DivisionByZero);
    }
    if a == b {
        return Err(MathError::SqrtPriceOutOfBounds(a));
    }
    if a < b {
        Ok((a, b))
    } else {
        Ok((b, a))
    }
}
