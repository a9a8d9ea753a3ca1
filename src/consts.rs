use alloy::primitives::{address, Address, U256};

// WAVAX/USDC market on Avalanche C-Chain. Token0 sorts before token1.
pub const WAVAX: Address = address!("B31f66AA3C1e785363F0875A1B74E27b85FD66c7");
pub const USDC: Address = address!("B97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E");
pub const WAVAX_DECIMALS: u8 = 18;
pub const USDC_DECIMALS: u8 = 6;

// Blackhole deployment addresses for the WAVAX/USDC Algebra Integral pool.
pub const POOL: Address = address!("05f5ac38791deadca38cd63dcfdd0b6643f0d2b6");
pub const SWAP_ROUTER: Address = address!("9d2b4b7958d4b2e7115df7e3d0d2f34776d4b0e4");
pub const POSITION_MANAGER: Address = address!("8a6b7c56b9ac53e1b4e5e8d06a9e36b1a3c2f19d");
pub const GAUGE: Address = address!("4f09b7df02e0a9b6e4a2dc85c9d6a7f31f2b8c55");
pub const FARMING_CENTER: Address = address!("6e0c5a1bd8c9f7f3b28371e6dd4a91c4e83b9a02");

// Incentive tokens distributed while the position NFT is farming.
pub const BLACK: Address = address!("dc9232e2df177d7a12fdff6ecbab114e2231198d");
pub const BONUS_REWARD_TOKEN: Address = Address::ZERO;

pub const TICK_SPACING: i32 = 200;

// Flat fee estimate applied to swap inputs for accounting.
pub const ROUTER_FEE_BPS: u64 = 5;

// EIP-1559 fee policy: base fee bumped by 2 gwei, 1.5 gwei priority tip.
pub const MAX_FEE_BUMP_WEI: u128 = 2_000_000_000;
pub const PRIORITY_TIP_WEI: u128 = 1_500_000_000;

// commonly used U256s
pub const U256_1: U256 = U256::from_limbs([1, 0, 0, 0]);
pub const U256_2: U256 = U256::from_limbs([2, 0, 0, 0]);
pub const U256_10: U256 = U256::from_limbs([10, 0, 0, 0]);
pub const U256_100: U256 = U256::from_limbs([100, 0, 0, 0]);
pub const U256_10000: U256 = U256::from_limbs([10000, 0, 0, 0]);

// Fixed-point scales
pub const Q96: U256 = U256::from_limbs([0, 4294967296, 0, 0]);
pub const Q128: U256 = U256::from_limbs([0, 0, 1, 0]);

pub const F64_2P64: f64 = 18446744073709551616.0; // 2^64
pub const F64_2P96: f64 = 79228162514264337593543950336.0; // 2^96
pub const F64_2P128: f64 = 340282366920938463463374607431768211456.0; // 2^128
pub const F64_2P192: f64 = 6277101735386680763835789423207666416102355444464034512896.0; // 2^192
