//! # Pair Strategy
//!
//! A leveraged pair position: A deposited by the vault, part of it pledged to
//! borrow B, both sides deployed into a concentrated pool range. This module
//! covers deposit and rebalance; withdrawals, rewards and reconciliation live in
//! [`crate::accountant`].
//!
//! Every operation follows the same shape:
//!
//! 1. take the operation lock (`Locked` if one is in flight)
//! 2. clone the committed state into an [`Execution`]
//! 3. make the collaborator calls, staging ledger updates from observed balances
//! 4. commit the staged state and settle the position phase
//!
//! Any error in step 3 drops the staged copy and the guard, leaving the
//! committed state and phase exactly as they were.

use std::sync::{Mutex, MutexGuard, TryLockError};

use pairvault_core::math::fixed_point::{wad_complement, wad_div, wad_mul, Rounding};
use pairvault_core::math::safe_math::safe_add_u128;
use pairvault_core::resolver::amount_for_value;
use pairvault_core::{
    AssetPair, AssetPosition, BaseAmountLedger, CoreResult, DebtStatus, IterationPlanner, PairPricing, PlanKind, Side,
    TickRange,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::collaborators::Collaborators;
use crate::config::EngineConfig;
use crate::error::{EngineResult, RebalancerError};
use crate::execution::{Execution, PlanReport};
use crate::snapshot::StrategySnapshot;
use crate::state_machine::{Operation, OperationGuard, PositionPhase, PositionStateMachine};

/// State owned by one strategy instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyState {
    pub position: AssetPosition,
    pub debt: DebtStatus,
    pub ledger: BaseAmountLedger,
}

/// Result of a deposit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositReport {
    pub collateral_spent: u128,
    pub borrowed: u128,
    pub consumed: [u128; 2],
    pub liquidity: u128,
}

/// Result of a rebalance pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalanceReport {
    /// `None` when the position was in range and nothing ran
    pub plan_kind: Option<PlanKind>,
    pub forced_repay: u128,
    pub executed: PlanReport,
    pub range: TickRange,
    pub phase: PositionPhase,
}

pub struct PairStrategy {
    pub(crate) config: EngineConfig,
    pub(crate) pair: AssetPair,
    pub(crate) collaborators: Collaborators,
    pub(crate) machine: PositionStateMachine,
    state: Mutex<StrategyState>,
}

impl PairStrategy {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> EngineResult<Self> {
        config.validate()?;
        let pair = config.pair();
        let state = StrategyState {
            position: AssetPosition::new(pair.clone(), TickRange::default()),
            debt: DebtStatus::default(),
            ledger: BaseAmountLedger::new(),
        };
        Ok(Self::with_state(config, collaborators, state))
    }

    /// Resume from a persisted snapshot
    pub fn restore(config: EngineConfig, collaborators: Collaborators, snapshot: StrategySnapshot) -> EngineResult<Self> {
        config.validate()?;
        if snapshot.strategy_id != config.strategy_id {
            return Err(RebalancerError::InvalidState(format!(
                "snapshot for {} does not match strategy {}",
                snapshot.strategy_id, config.strategy_id
            )));
        }
        let state = snapshot.into_state(config.pair());
        Ok(Self::with_state(config, collaborators, state))
    }

    fn with_state(config: EngineConfig, collaborators: Collaborators, state: StrategyState) -> Self {
        Self {
            machine: PositionStateMachine::new(config.strategy_id.clone()),
            pair: config.pair(),
            config,
            collaborators,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn phase(&self) -> PositionPhase {
        self.machine.phase()
    }

    /// Whether an operation currently holds the lock
    pub fn is_busy(&self) -> bool {
        self.machine.is_busy()
    }

    /// Copy of the committed state
    pub fn state(&self) -> EngineResult<StrategyState> {
        Ok(self.read_state()?.clone())
    }

    pub fn snapshot(&self) -> EngineResult<StrategySnapshot> {
        let state = self.read_state()?;
        Ok(StrategySnapshot::capture(&self.config.strategy_id, &state))
    }

    pub(crate) fn lock_state(&self) -> EngineResult<MutexGuard<'_, StrategyState>> {
        self.state
            .lock()
            .map_err(|_| RebalancerError::InvalidState("strategy state poisoned".to_string()))
    }

    /// Non-blocking read; fails with `Locked` while an operation holds the state
    pub(crate) fn read_state(&self) -> EngineResult<MutexGuard<'_, StrategyState>> {
        self.state.try_lock().map_err(|err| match err {
            TryLockError::WouldBlock => RebalancerError::Locked(self.config.strategy_id.clone()),
            TryLockError::Poisoned(_) => RebalancerError::InvalidState("strategy state poisoned".to_string()),
        })
    }

    /// Stage an operation on a copy of the committed state. `body` runs with
    /// the operation lock held; its staged state is committed only on success.
    pub(crate) fn run<T>(
        &self,
        operation: Operation,
        body: impl FnOnce(&mut Execution<'_>, &mut OperationGuard<'_>) -> EngineResult<T>,
    ) -> EngineResult<(T, OperationGuard<'_>)> {
        let mut guard = self.machine.begin(operation)?;
        let mut committed = self.lock_state()?;

        let mut execution = Execution::new(&self.collaborators, &self.pair, committed.clone());
        let value = body(&mut execution, &mut guard)?;
        *committed = execution.into_state()?;

        Ok((value, guard))
    }

    /// Re-evaluate the phase from the pool tick without running anything
    /// Re-evaluate the phase from the pool tick without running anything.
    /// While another operation is in flight the current phase is returned as is.
    pub fn check(&self) -> EngineResult<PositionPhase> {
        let guard = match self.machine.begin(Operation::Check) {
            Ok(guard) => guard,
            Err(err) if err.is_locked() => return Ok(self.machine.phase()),
            Err(err) => return Err(err),
        };
        let range = self.read_state()?.position.range;
        let tick = self.collaborators.pool.current_tick()?;
        let phase = PositionPhase::from_tick(&range, tick, self.config.rebalance_tick_buffer);
        guard.settle(phase);
        Ok(phase)
    }

    /// Accept `amount_a` of A already transferred by the vault, borrow B against
    /// part of it and deploy both sides into the pool.
    pub fn deposit(&self, amount_a: u128) -> EngineResult<DepositReport> {
        let (report, guard) = self.run(Operation::Deposit, |exec, _| {
            let asset_a = self.pair.asset_a.clone();
            exec.ledger().record_receipt(&asset_a, amount_a)?;

            if !exec.state.position.has_liquidity() {
                let tick = exec.current_tick()?;
                exec.select_range(tick)?;
            }

            let pricing = PairPricing::new(exec.prices()?, self.config.decimals());
            let (collateral_spent, borrowed) =
                self.lever_up(exec, &pricing, u128::from(self.config.collateral_ratio))?;
            let mut report = DepositReport {
                collateral_spent,
                borrowed,
                ..DepositReport::default()
            };

            let entry = exec.enter_pool()?;
            report.consumed = entry.consumed;
            report.liquidity = entry.liquidity;
            exec.refresh_debt(&pricing)?;
            Ok(report)
        })?;

        let phase = self.settle_from_tick(guard)?;
        info!(
            strategy = %self.config.strategy_id,
            amount_a,
            borrowed = report.borrowed,
            liquidity = report.liquidity,
            ?phase,
            "deposit complete"
        );
        Ok(report)
    }

    /// Re-center the position when the pool tick left the buffered range, or
    /// deleverage when the health factor fell below the minimum.
    pub fn rebalance(&self) -> EngineResult<RebalanceReport> {
        let (report, guard) = self.run(Operation::Rebalance, |exec, guard| self.rebalance_staged(exec, guard))?;

        let phase = self.settle_from_tick(guard)?;
        let report = RebalanceReport { phase, ..report };
        info!(
            strategy = %self.config.strategy_id,
            kind = ?report.plan_kind,
            forced_repay = report.forced_repay,
            repaid = report.executed.repaid_b,
            ?phase,
            "rebalance complete"
        );
        Ok(report)
    }

    /// Rebalance body, shared with hardwork. The phase moves to `Rebalancing`
    /// only once the position is about to leave the pool.
    pub(crate) fn rebalance_staged(
        &self,
        exec: &mut Execution<'_>,
        guard: &mut OperationGuard<'_>,
    ) -> EngineResult<RebalanceReport> {
        let tick = exec.current_tick()?;
        let range = exec.state.position.range;
        let in_range = range.contains_with_buffer(tick, self.config.rebalance_tick_buffer);

        let pricing = PairPricing::new(exec.prices()?, self.config.decimals());
        let debt = exec.refresh_debt(&pricing)?;
        let deleverage = needs_deleverage(&pricing, &debt, u128::from(self.config.min_health_factor));
        let forced_repay = if deleverage { debt.total_debt_amount } else { 0 };

        if in_range && !deleverage && exec.state.position.has_liquidity() {
            return Ok(RebalanceReport {
                plan_kind: None,
                forced_repay: 0,
                executed: PlanReport::default(),
                range,
                phase: PositionPhase::InRange,
            });
        }

        guard.enter_rebalancing();
        let had_liquidity = exec.state.position.has_liquidity();
        let liquidity = exec.state.position.liquidity;
        exec.exit_pool(liquidity, false)?;
        if !in_range || !had_liquidity {
            exec.select_range(tick)?;
        }

        let (plan_kind, executed) = self.restore_proportion(exec, &pricing, forced_repay)?;
        if deleverage {
            let (collateral, borrowed) = self.lever_up(exec, &pricing, u128::from(self.config.target_health_factor))?;
            info!(
                strategy = %self.config.strategy_id,
                health_factor = debt.health_factor,
                repaid = executed.repaid_b,
                collateral,
                borrowed,
                "deleveraged"
            );
        }
        exec.enter_pool()?;
        exec.refresh_debt(&pricing)?;

        Ok(RebalanceReport {
            plan_kind: Some(plan_kind),
            forced_repay,
            executed,
            range: exec.state.position.range,
            phase: PositionPhase::Rebalancing,
        })
    }

    /// Borrow B against idle A so the idle balances split at the target
    /// proportion with `collateral_ratio` of A value pledged per B value.
    /// Returns `(collateral, borrowed)`; borrows below dust are skipped.
    pub(crate) fn lever_up(
        &self,
        exec: &mut Execution<'_>,
        pricing: &PairPricing,
        collateral_ratio: u128,
    ) -> EngineResult<(u128, u128)> {
        if !pricing.is_priceable() {
            warn!(strategy = %self.config.strategy_id, "unpriceable pair, skipping borrow");
            return Ok((0, 0));
        }

        let prop_b = exec
            .pool_proportion(&self.config)?
            .unwrap_or(u128::from(self.config.fallback_prop_b));
        let (collateral, borrow) = size_borrow(pricing, exec.balances()?, prop_b, collateral_ratio)?;

        if borrow == 0 || borrow < self.config.liquidation_thresholds()[Side::B.index()] {
            return Ok((0, 0));
        }
        let borrowed = exec.borrow(collateral, borrow)?;
        Ok((collateral, borrowed))
    }

    /// Plan and execute swaps/repays that bring idle balances to the target
    /// proportion while repaying `amount_to_repay_b`
    pub(crate) fn restore_proportion(
        &self,
        exec: &mut Execution<'_>,
        pricing: &PairPricing,
        amount_to_repay_b: u128,
    ) -> EngineResult<(PlanKind, PlanReport)> {
        let pool_prop = exec.pool_proportion(&self.config)?;
        let input = self
            .config
            .planner_input(pricing.prices, u128::from(self.config.fallback_prop_b), pool_prop);
        let planner = IterationPlanner::new(input);

        let plan = exec.plan(&planner, amount_to_repay_b)?;
        let report = exec.execute_plan(&plan)?;
        Ok((plan.kind(), report))
    }

    /// Release the lock, landing in `InRange` or `NeedsRebalance` per the tick
    pub(crate) fn settle_from_tick(&self, guard: OperationGuard<'_>) -> EngineResult<PositionPhase> {
        let range = self.lock_state()?.position.range;
        let phase = match self.collaborators.pool.current_tick() {
            Ok(tick) => PositionPhase::from_tick(&range, tick, self.config.rebalance_tick_buffer),
            Err(err) => {
                // State is committed; keep the lock release unconditional
                warn!(strategy = %self.config.strategy_id, %err, "tick unavailable after commit");
                PositionPhase::NeedsRebalance
            }
        };
        guard.settle(phase);
        Ok(phase)
    }
}

/// Collateral (A) to pledge and B to borrow so that what remains of A plus the
/// borrowed B splits as `prop_b` by value.
///
/// With `Va`, `Vb` the on-hand values and `r` the collateral ratio, the borrow
/// value is `X = (p*Va - (1-p)*Vb) / ((1-p) + p*r)`; collateral is `r*X`.
pub fn size_borrow(
    pricing: &PairPricing,
    balances: [u128; 2],
    prop_b: u128,
    collateral_ratio: u128,
) -> CoreResult<(u128, u128)> {
    let value_a = pricing.value(Side::A, balances[0])?;
    let value_b = pricing.value(Side::B, balances[1])?;
    let prop_a = wad_complement(prop_b)?;

    let wanted = wad_mul(value_a, prop_b, Rounding::Down)?;
    let held = wad_mul(value_b, prop_a, Rounding::Down)?;
    if wanted <= held {
        return Ok((0, 0));
    }

    let denominator = safe_add_u128(prop_a, wad_mul(prop_b, collateral_ratio, Rounding::Up)?)?;
    let borrow_value = wad_div(wanted - held, denominator, Rounding::Down)?;
    let collateral_value = wad_mul(borrow_value, collateral_ratio, Rounding::Up)?;

    let borrow18 = amount_for_value(borrow_value, pricing.price(Side::B), Rounding::Down)?.unwrap_or(0);
    let collateral18 = amount_for_value(collateral_value, pricing.price(Side::A), Rounding::Up)?.unwrap_or(0);

    let borrow = pricing.denormalize(Side::B, borrow18, Rounding::Down)?;
    let collateral = pricing
        .denormalize(Side::A, collateral18, Rounding::Up)?
        .min(balances[0]);
    Ok((collateral, borrow))
}

/// Whether the debt must be closed and re-opened at the target health factor.
/// Repaying part of the debt releases the same share of collateral and leaves
/// the health factor where it was, so only a full cycle restores it.
pub fn needs_deleverage(pricing: &PairPricing, debt: &DebtStatus, min_health_factor: u128) -> bool {
    pricing.is_priceable() && debt.has_debt() && debt.health_factor < min_health_factor
}
