use alloy::primitives::U256;

use crate::consts::{F64_2P128, F64_2P192, F64_2P64, F64_2P96};

/// Converts an alloy U256 to f64 with nearest rounding
pub fn u256_to_f64(num: U256) -> f64 {
    let [l0, l1, l2, l3] = num.into_limbs();
    let (l0f, l1f, l2f, l3f) = (l0 as f64, l1 as f64, l2 as f64, l3 as f64);
    l0f + l1f * F64_2P64 + l2f * F64_2P128 + l3f * F64_2P192
}

/// Human-readable token1-per-token0 price for a Q64.96 sqrt price,
/// adjusted for the tokens' decimal places.
pub fn sqrt_price_to_price(sqrt_price_x96: U256, decimals0: u8, decimals1: u8) -> f64 {
    let sqrt = u256_to_f64(sqrt_price_x96) / F64_2P96;
    let raw = sqrt * sqrt;
    let shift = decimals0 as i32 - decimals1 as i32;
    raw * 10f64.powi(shift)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        consts::{USDC_DECIMALS, WAVAX_DECIMALS},
        math::tick::get_sqrt_ratio_at_tick,
    };

    #[test]
    fn u256_to_f64_simple() {
        assert_eq!(u256_to_f64(U256::ZERO), 0.0);
        assert_eq!(u256_to_f64(U256::from(1u8)), 1.0);
        assert_eq!(u256_to_f64(U256::from(65536u32)), 65536.0);
    }

    #[test]
    fn price_of_unit_sqrt_price_is_decimal_shift() {
        let q96 = U256::from(1u8) << 96;
        let price = sqrt_price_to_price(q96, 18, 18);
        assert!((price - 1.0).abs() < 1e-12);

        let shifted = sqrt_price_to_price(q96, WAVAX_DECIMALS, USDC_DECIMALS);
        assert!((shifted - 1e12).abs() < 1.0);
    }

    #[test]
    fn price_matches_observed_pool_state() {
        let sqrt_price = U256::from_str_radix("280057970020625981233062", 10).unwrap();
        let price = sqrt_price_to_price(sqrt_price, WAVAX_DECIMALS, USDC_DECIMALS);
        assert!((price - 12.495).abs() < 0.001);
    }

    #[test]
    fn price_tracks_tick_exponent() {
        for tick in [-251070, -100, 0, 100, 100000] {
            let sqrt_price = get_sqrt_ratio_at_tick(tick).unwrap();
            let price = sqrt_price_to_price(sqrt_price, 18, 18);
            let expected = 1.0001f64.powi(tick);
            assert!(
                (price - expected).abs() / expected < 1e-9,
                "tick {tick}: {price} vs {expected}"
            );
        }
    }
}
