//! # External Collaborators
//!
//! Narrow request/response seams the engine is driven against. Every call is
//! synchronous and fallible; failures surface as [`RebalancerError::External`]
//! and abort the whole operation.
//!
//! Implementations are shared resources that other actors may mutate between
//! calls, so the engine re-reads dependent state (debt, balances) right before
//! using it and never trusts a returned amount over an observed balance.
//!
//! [`RebalancerError::External`]: crate::error::RebalancerError::External

use std::sync::Arc;

use pairvault_core::{AssetId, TickRange};
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;

/// Result of adding liquidity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolEntry {
    /// Amounts actually taken, A first
    pub consumed: [u128; 2],
    /// Liquidity units minted
    pub liquidity: u128,
}

/// Result of repaying borrowed B
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepayOutcome {
    /// A collateral released back to the strategy
    pub collateral_returned: u128,
    /// B sent for repayment but not needed, returned to the strategy
    pub leftover_borrowed: u128,
}

/// Concentrated liquidity pool holding the strategy's position
pub trait Pool: Send + Sync {
    fn enter(&self, amounts_desired: [u128; 2]) -> EngineResult<PoolEntry>;

    /// Burn liquidity; `emergency` skips fee collection and reward accounting
    fn exit(&self, liquidity: u128, emergency: bool) -> EngineResult<[u128; 2]>;

    fn quote_exit(&self, liquidity: u128) -> EngineResult<[u128; 2]>;

    /// Share of B (by value, 18 decimals) the current range wants
    fn current_tick_ratio(&self) -> EngineResult<u128>;

    fn current_tick(&self) -> EngineResult<i32>;

    /// Pick new bounds around `current_tick`; subsequent entries use them
    fn select_range(&self, current_tick: i32) -> EngineResult<TickRange>;

    fn claim_rewards(&self) -> EngineResult<Vec<(AssetId, u128)>>;
}

/// Lending abstraction backing the borrowed side
pub trait LendingAdapter: Send + Sync {
    /// Pledge collateral and borrow; returns the amount actually borrowed
    fn borrow(
        &self,
        collateral_asset: &AssetId,
        collateral_amount: u128,
        borrow_asset: &AssetId,
        amount_to_borrow: u128,
    ) -> EngineResult<u128>;

    fn repay(&self, collateral_asset: &AssetId, borrow_asset: &AssetId, amount_repay: u128) -> EngineResult<RepayOutcome>;

    /// Current `(debt, collateral)` including accrued interest
    fn get_debt_amount_current(&self, collateral_asset: &AssetId, borrow_asset: &AssetId) -> EngineResult<(u128, u128)>;

    /// Collateral a repay of `amount_repay` would release
    fn quote_repay(&self, collateral_asset: &AssetId, borrow_asset: &AssetId, amount_repay: u128) -> EngineResult<u128>;

    fn claim_rewards(&self) -> EngineResult<Vec<(AssetId, u128)>>;
}

/// Swap/liquidation router. Fills may be partial.
pub trait SwapRouter: Send + Sync {
    fn swap(&self, asset_in: &AssetId, asset_out: &AssetId, amount_in: u128) -> EngineResult<u128>;
}

/// USD prices with 18 decimals; 0 means unavailable
pub trait PriceOracle: Send + Sync {
    fn price(&self, asset: &AssetId) -> EngineResult<u128>;
}

/// Wallet holding the strategy's on-hand balances
pub trait Custody: Send + Sync {
    fn balance_of(&self, asset: &AssetId) -> EngineResult<u128>;

    fn send_to_vault(&self, asset: &AssetId, amount: u128) -> EngineResult<()>;
}

/// Handles to every collaborator of one strategy instance
#[derive(Clone)]
pub struct Collaborators {
    pub pool: Arc<dyn Pool>,
    pub lending: Arc<dyn LendingAdapter>,
    pub router: Arc<dyn SwapRouter>,
    pub oracle: Arc<dyn PriceOracle>,
    pub custody: Arc<dyn Custody>,
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
