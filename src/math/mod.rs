pub mod float;
pub mod liquidity;
pub mod tick;

pub use float::{sqrt_price_to_price, u256_to_f64};
pub use liquidity::{
    amounts_for_liquidity, liquidity_for_amounts, min_amount_with_slippage, mul_div,
};
pub use tick::{get_sqrt_ratio_at_tick, tick_bounds, MAX_TICK, MIN_TICK};
