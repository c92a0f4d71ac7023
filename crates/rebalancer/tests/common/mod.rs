//! Shared fixtures for engine integration tests

#![allow(dead_code)]

pub mod market;
pub mod tracing;

use std::sync::Arc;

use pairvault_core::WAD;
use pairvault_rebalancer::{AssetConfig, EngineConfig, LoggingConfig, PairStrategy};

pub use market::SimMarket;
pub use self::tracing::init_test_tracing;

pub type TestResult<T = ()> = anyhow::Result<T>;

/// One whole unit at 18 decimals
pub const UNIT: u128 = WAD;

pub fn units(amount: u128) -> u128 {
    amount * UNIT
}

/// A/B pair at 18 decimals, 1.5x collateral, deleverage below 1.2 back to 1.5
pub fn test_config() -> EngineConfig {
    EngineConfig {
        strategy_id: "sim".to_string(),
        asset_a: AssetConfig {
            id: "A".to_string(),
            decimals: 18,
            liquidation_threshold: 1_000,
        },
        asset_b: AssetConfig {
            id: "B".to_string(),
            decimals: 18,
            liquidation_threshold: 1_000,
        },
        fallback_prop_b: 500_000_000_000_000_000,
        use_pool_proportion: true,
        collateral_ratio: 1_500_000_000_000_000_000,
        min_health_factor: 1_200_000_000_000_000_000,
        target_health_factor: 1_500_000_000_000_000_000,
        rebalance_tick_buffer: 10,
        drift_threshold: 0,
        max_withdraw_iterations: 3,
        logging: LoggingConfig::default(),
    }
}

pub fn setup() -> TestResult<(Arc<SimMarket>, Arc<PairStrategy>)> {
    init_test_tracing();
    let market = SimMarket::new("A", "B");
    let strategy = PairStrategy::new(test_config(), market.collaborators())?;
    Ok((market, Arc::new(strategy)))
}

/// Fund the wallet and deposit `amount` whole units of A
pub fn fund_and_deposit(market: &SimMarket, strategy: &PairStrategy, amount: u128) -> TestResult {
    market.fund(&market.asset_a, units(amount));
    strategy.deposit(units(amount))?;
    Ok(())
}

/// Base amounts of the pair assets equal the wallet balances, and
/// reconciliation reports nothing
pub fn assert_ledger_matches_wallet(market: &SimMarket, strategy: &PairStrategy) -> TestResult {
    let state = strategy.state()?;
    for asset in [&market.asset_a, &market.asset_b] {
        assert_eq!(
            state.ledger.base_amount(asset),
            market.wallet(asset),
            "base amount of {} diverged from wallet",
            asset
        );
    }
    let drift = strategy.reconcile()?;
    assert!(drift.is_clean(), "unexpected drift: {:?}", drift);
    Ok(())
}
