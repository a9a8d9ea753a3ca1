use std::{path::Path, time::Duration};

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{consts, errors::ConfigError};

/// Contract addresses of the managed market. Defaults to the mainnet
/// WAVAX/USDC deployment; overridable for forks and test environments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressBook {
    pub token0: Address,
    pub token1: Address,
    pub pool: Address,
    pub router: Address,
    pub position_manager: Address,
    pub gauge: Address,
    pub farming_center: Address,
    pub reward_token: Address,
    pub bonus_reward_token: Address,
}

impl Default for AddressBook {
    fn default() -> Self {
        Self {
            token0: consts::WAVAX,
            token1: consts::USDC,
            pool: consts::POOL,
            router: consts::SWAP_ROUTER,
            position_manager: consts::POSITION_MANAGER,
            gauge: consts::GAUGE,
            farming_center: consts::FARMING_CENTER,
            reward_token: consts::BLACK,
            bonus_reward_token: consts::BONUS_REWARD_TOKEN,
        }
    }
}

/// Knobs of the repositioning loop. Immutable once the strategy starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Seconds between price polls while monitoring.
    pub monitoring_interval_secs: u64,
    /// The active range spans `range_width * tick_spacing` ticks.
    pub range_width: i32,
    /// Percent haircut applied to desired amounts, 1..=50.
    pub slippage_pct: u8,
    /// Largest |price move| / price still counted as a stable sample.
    pub stability_threshold: f64,
    /// Consecutive stable samples required before re-entry.
    pub stability_intervals: usize,
    /// Sliding window of the circuit breaker, seconds.
    pub circuit_breaker_window_secs: u64,
    /// Errors within the window that force a halt.
    pub circuit_breaker_threshold: usize,
    /// Seconds between baseline snapshots.
    pub snapshot_interval_secs: u64,
    /// Seconds added to the wall clock for on-chain deadlines.
    pub deadline_skew_secs: u64,
    /// Seconds to wait for a transaction receipt before giving up.
    pub receipt_timeout_secs: u64,
    /// Nonce of the farming incentive the position is staked under.
    pub farming_nonce: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            monitoring_interval_secs: 60,
            range_width: 6,
            slippage_pct: 5,
            stability_threshold: 0.005,
            stability_intervals: 5,
            circuit_breaker_window_secs: 300,
            circuit_breaker_threshold: 5,
            snapshot_interval_secs: 7200,
            deadline_skew_secs: 1200,
            receipt_timeout_secs: 300,
            farming_nonce: 0,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.monitoring_interval_secs < 1 {
            return Err(ConfigError::OutOfRange {
                field: "monitoring_interval_secs",
                reason: "must be at least 1 second".into(),
            });
        }
        if self.range_width < 2 {
            return Err(ConfigError::OutOfRange {
                field: "range_width",
                reason: "must be at least 2".into(),
            });
        }
        if !(1..=50).contains(&self.slippage_pct) {
            return Err(ConfigError::OutOfRange {
                field: "slippage_pct",
                reason: "must be within 1..=50".into(),
            });
        }
        if !(self.stability_threshold > 0.0 && self.stability_threshold < 1.0) {
            return Err(ConfigError::OutOfRange {
                field: "stability_threshold",
                reason: "must be a fraction in (0, 1)".into(),
            });
        }
        if self.stability_intervals == 0 {
            return Err(ConfigError::OutOfRange {
                field: "stability_intervals",
                reason: "must be positive".into(),
            });
        }
        if self.circuit_breaker_window_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "circuit_breaker_window_secs",
                reason: "must be positive".into(),
            });
        }
        if self.circuit_breaker_threshold == 0 {
            return Err(ConfigError::OutOfRange {
                field: "circuit_breaker_threshold",
                reason: "must be positive".into(),
            });
        }
        if self.snapshot_interval_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "snapshot_interval_secs",
                reason: "must be positive".into(),
            });
        }
        if self.deadline_skew_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "deadline_skew_secs",
                reason: "must be positive".into(),
            });
        }
        if self.receipt_timeout_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "receipt_timeout_secs",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn monitoring_interval(&self) -> Duration {
        Duration::from_secs(self.monitoring_interval_secs)
    }

    pub fn circuit_breaker_window(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_window_secs)
    }

    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_secs)
    }

    pub fn deadline_skew(&self) -> Duration {
        Duration::from_secs(self.deadline_skew_secs)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }
}

/// Top-level config document: transport, key reference, addresses, strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub rpc_endpoint: String,
    /// Reference to the encrypted key material; decryption happens outside.
    pub keystore: String,
    #[serde(default)]
    pub addresses: AddressBook,
    #[serde(default)]
    pub strategy: StrategyConfig,
}

impl AppConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(raw)?;
        config.strategy.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }
}
