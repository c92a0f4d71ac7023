use std::fs;
use std::path::Path;

use pairvault_core::{AssetId, AssetPair, IterationPlanInput, Side, MAX_ASSET_DECIMALS, WAD};
use serde::{Deserialize, Serialize};

use crate::error::{EngineResult, RebalancerError};
use crate::logging::LoggingConfig;

/// Engine configuration loaded from TOML file.
///
/// 18-decimal values are stored as `u64` so they stay representable as TOML
/// integers.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EngineConfig {
    /// Strategy instance identifier, used as the snapshot key
    pub strategy_id: String,

    /// Accounting asset, pledged as collateral
    pub asset_a: AssetConfig,

    /// Paired asset, borrowed against A
    pub asset_b: AssetConfig,

    /// Target share of B when the pool proportion is not used (18 decimals)
    pub fallback_prop_b: u64,

    /// Plan against the pool-implied proportion instead of `fallback_prop_b`
    pub use_pool_proportion: bool,

    /// A collateral value pledged per unit of B value borrowed (18 decimals)
    pub collateral_ratio: u64,

    /// Health factor below which a rebalance deleverages (18 decimals)
    pub min_health_factor: u64,

    /// Health factor a deleverage aims for (18 decimals)
    pub target_health_factor: u64,

    /// Ticks kept between the pool tick and the range edges before rebalancing
    pub rebalance_tick_buffer: i32,

    /// Ledger/wallet divergence reported by reconciliation (native units)
    pub drift_threshold: u64,

    /// Planner iterations allowed while closing debt in a full withdrawal
    pub max_withdraw_iterations: u32,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration for one side of the pair
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AssetConfig {
    pub id: String,

    /// Token decimals
    pub decimals: u8,

    /// Amounts below this are dust: never swapped, never reported as drift
    pub liquidation_threshold: u64,
}

impl EngineConfig {
    /// Load configuration from TOML file
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> EngineResult<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> EngineResult<()> {
        if self.strategy_id.is_empty() {
            return Err(RebalancerError::invalid_config("strategy_id", "\"\"", "non-empty string"));
        }

        self.asset_a.validate("asset_a")?;
        self.asset_b.validate("asset_b")?;

        if self.asset_a.id == self.asset_b.id {
            return Err(RebalancerError::invalid_config("asset_b.id", &self.asset_b.id, "different from asset_a.id"));
        }

        if u128::from(self.fallback_prop_b) > WAD {
            return Err(RebalancerError::invalid_config("fallback_prop_b", self.fallback_prop_b, "at most 1e18"));
        }

        if u128::from(self.collateral_ratio) <= WAD {
            return Err(RebalancerError::invalid_config("collateral_ratio", self.collateral_ratio, "greater than 1e18"));
        }

        if u128::from(self.min_health_factor) <= WAD {
            return Err(RebalancerError::invalid_config("min_health_factor", self.min_health_factor, "greater than 1e18"));
        }

        if self.target_health_factor < self.min_health_factor {
            return Err(RebalancerError::invalid_config(
                "target_health_factor",
                self.target_health_factor,
                &format!("at least min_health_factor ({})", self.min_health_factor),
            ));
        }

        if self.rebalance_tick_buffer < 0 {
            return Err(RebalancerError::invalid_config("rebalance_tick_buffer", self.rebalance_tick_buffer, "non-negative"));
        }

        if self.max_withdraw_iterations == 0 {
            return Err(RebalancerError::invalid_config("max_withdraw_iterations", 0, "greater than 0"));
        }

        for (field, value) in [
            ("fallback_prop_b", self.fallback_prop_b),
            ("collateral_ratio", self.collateral_ratio),
            ("min_health_factor", self.min_health_factor),
            ("target_health_factor", self.target_health_factor),
            ("drift_threshold", self.drift_threshold),
        ] {
            check_toml_integer(field, value)?;
        }

        Ok(())
    }

    pub fn pair(&self) -> AssetPair {
        AssetPair::new(self.asset_a.id.as_str(), self.asset_b.id.as_str())
    }

    pub fn asset(&self, side: Side) -> &AssetConfig {
        match side {
            Side::A => &self.asset_a,
            Side::B => &self.asset_b,
        }
    }

    pub fn decimals(&self) -> [u8; 2] {
        [self.asset_a.decimals, self.asset_b.decimals]
    }

    pub fn liquidation_thresholds(&self) -> [u128; 2] {
        [
            u128::from(self.asset_a.liquidation_threshold),
            u128::from(self.asset_b.liquidation_threshold),
        ]
    }

    /// Drift tolerated for an asset before reconciliation reports it
    pub fn drift_threshold_for(&self, asset: &AssetId) -> u128 {
        let dust = if asset.as_str() == self.asset_a.id {
            self.asset_a.liquidation_threshold
        } else if asset.as_str() == self.asset_b.id {
            self.asset_b.liquidation_threshold
        } else {
            0
        };
        u128::from(self.drift_threshold.max(dust))
    }

    /// Planner parameters for one call. `pool_prop_b` is consulted only when
    /// the pool proportion is enabled.
    pub fn planner_input(&self, prices: [u128; 2], prop_b: u128, pool_prop_b: Option<u128>) -> IterationPlanInput {
        let input = IterationPlanInput::new(prices, self.decimals(), prop_b)
            .with_thresholds(self.liquidation_thresholds());
        match pool_prop_b {
            Some(pool_prop_b) if self.use_pool_proportion => input.with_pool_proportion(pool_prop_b),
            _ => input,
        }
    }
}

impl AssetConfig {
    fn validate(&self, section: &str) -> EngineResult<()> {
        if self.id.is_empty() {
            return Err(RebalancerError::invalid_config(&format!("{}.id", section), "\"\"", "non-empty string"));
        }

        if self.decimals > MAX_ASSET_DECIMALS {
            return Err(RebalancerError::invalid_config(
                &format!("{}.decimals", section),
                self.decimals,
                &format!("at most {}", MAX_ASSET_DECIMALS),
            ));
        }

        check_toml_integer(&format!("{}.liquidation_threshold", section), self.liquidation_threshold)
    }
}

fn check_toml_integer(field: &str, value: u64) -> EngineResult<()> {
    if value > i64::MAX as u64 {
        return Err(RebalancerError::invalid_config(field, value, "at most i64::MAX"));
    }
    Ok(())
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            strategy_id: "usdc-weth".to_string(),
            asset_a: AssetConfig {
                id: "USDC".to_string(),
                decimals: 6,
                liquidation_threshold: 10_000, // 0.01 USDC
            },
            asset_b: AssetConfig {
                id: "WETH".to_string(),
                decimals: 18,
                liquidation_threshold: 10_000_000_000_000, // 0.00001 WETH
            },
            fallback_prop_b: 500_000_000_000_000_000,       // 50%
            use_pool_proportion: true,
            collateral_ratio: 1_600_000_000_000_000_000,    // 1.6
            min_health_factor: 1_300_000_000_000_000_000,   // 1.3
            target_health_factor: 1_600_000_000_000_000_000, // 1.6
            rebalance_tick_buffer: 10,
            drift_threshold: 0,
            max_withdraw_iterations: 3,
            logging: LoggingConfig::default(),
        }
    }
}
