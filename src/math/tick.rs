use alloy::primitives::U256;

use crate::{consts::Q128, errors::MathError};

pub const MIN_TICK: i32 = -887272;
pub const MAX_TICK: i32 = 887272;

/// getSqrtRatioAtTick(MIN_TICK)
pub const MIN_SQRT_RATIO: U256 = U256::from_limbs([4295128739, 0, 0, 0]);
/// getSqrtRatioAtTick(MAX_TICK)
pub const MAX_SQRT_RATIO: U256 = U256::from_limbs([
    6743328256752651558,
    17280870778742802505,
    4294805859,
    0,
]);

// floor(2^128 / 1.0001^(2^i / 2)) for bit i of |tick|, i in 0..20.
const TICK_RATIOS: [U256; 20] = [
    U256::from_limbs([12262481743371124737, 18445821805675392311, 0, 0]),
    U256::from_limbs([6459403834229662010, 18444899583751176498, 0, 0]),
    U256::from_limbs([17226890335427755468, 18443055278223354162, 0, 0]),
    U256::from_limbs([2032852871939366096, 18439367220385604838, 0, 0]),
    U256::from_limbs([14545316742740207172, 18431993317065449817, 0, 0]),
    U256::from_limbs([5129152022828963008, 18417254355718160513, 0, 0]),
    U256::from_limbs([4894419605888772193, 18387811781193591352, 0, 0]),
    U256::from_limbs([1280255884321894483, 18329067761203520168, 0, 0]),
    U256::from_limbs([15924666964335305636, 18212142134806087854, 0, 0]),
    U256::from_limbs([8010504389359918676, 17980523815641551639, 0, 0]),
    U256::from_limbs([10668036004952895731, 17526086738831147013, 0, 0]),
    U256::from_limbs([4878133418470705625, 16651378430235024244, 0, 0]),
    U256::from_limbs([9537173718739605541, 15030750278693429944, 0, 0]),
    U256::from_limbs([9972618978014552549, 12247334978882834399, 0, 0]),
    U256::from_limbs([10428997489610666743, 8131365268884726200, 0, 0]),
    U256::from_limbs([9305304367709015974, 3584323654723342297, 0, 0]),
    U256::from_limbs([14301143598189091785, 696457651847595233, 0, 0]),
    U256::from_limbs([7393154844743099908, 26294789957452057, 0, 0]),
    U256::from_limbs([2209338891292245656, 37481735321082, 0, 0]),
    U256::from_limbs([10518117631919034274, 76158723, 0, 0]),
];

const LOW_32_MASK: U256 = U256::from_limbs([4294967295, 0, 0, 0]);

/// Computes sqrt(1.0001^tick) as a Q64.96, rounding up.
pub fn get_sqrt_ratio_at_tick(tick: i32) -> Result<U256, MathError> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(MathError::TickOutOfBounds(tick));
    }

    let abs_tick = tick.unsigned_abs();

    // Accumulate the ratio in 128.128 fixed point, one constant per set bit.
    let mut ratio = if abs_tick & 1 != 0 {
        TICK_RATIOS[0]
    } else {
        Q128
    };
    for (i, tick_ratio) in TICK_RATIOS.iter().enumerate().skip(1) {
        if abs_tick & (1 << i) != 0 {
            ratio = (ratio * *tick_ratio) >> 128;
        }
    }

    if tick > 0 {
        ratio = U256::MAX / ratio;
    }

    // 128.128 -> Q64.96 with round-up.
    let rounded = (ratio >> 32)
        + if (ratio & LOW_32_MASK).is_zero() {
            U256::ZERO
        } else {
            U256::from(1u8)
        };

    Ok(rounded)
}

/// Snaps `current_tick` down to the nearest spacing multiple and spreads
/// `range_width / 2` spacings to each side, clamped to the widest
/// spacing-aligned ticks.
pub fn tick_bounds(
    current_tick: i32,
    range_width: i32,
    tick_spacing: i32,
) -> Result<(i32, i32), MathError> {
    if tick_spacing <= 0 {
        return Err(MathError::InvalidTickSpacing(tick_spacing));
    }
    if range_width <= 0 {
        return Err(MathError::InvalidRangeWidth(range_width));
    }
    if !(MIN_TICK..=MAX_TICK).contains(&current_tick) {
        return Err(MathError::TickOutOfBounds(current_tick));
    }

    let max_aligned = MAX_TICK - MAX_TICK.rem_euclid(tick_spacing);
    let snapped = current_tick.div_euclid(tick_spacing) * tick_spacing;
    let half_span = (range_width / 2) * tick_spacing;

    let lower = (snapped - half_span).max(-max_aligned);
    let upper = (snapped + half_span).min(max_aligned);
    if lower >= upper {
        return Err(MathError::InvalidTickRange(lower, upper));
    }

    Ok((lower, upper))
}
