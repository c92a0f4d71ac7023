//! # Reward / Withdrawal Accountant
//!
//! Outflows and reward inflows of a [`PairStrategy`]: partial and full
//! withdrawals, reward claims, the periodic hardwork cycle, emergency exit and
//! ledger reconciliation. Every entry point takes the same operation lock as
//! deposit and rebalance.

use std::collections::BTreeMap;

use pairvault_core::math::fixed_point::{mul_div, Rounding};
use pairvault_core::{
    AssetId, CoreResult, DebtStatus, DriftReport, IterationPlanInput, IterationPlanner, PairPricing, PlanKind, Side,
    PROPORTION_ALL_A, WAD,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{EngineResult, RebalancerError};
use crate::execution::{Execution, PlanReport};
use crate::state_machine::{Operation, PositionPhase};
use crate::strategy::{PairStrategy, RebalanceReport};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawReport {
    pub requested: u128,
    /// A sent to the vault
    pub sent: u128,
    pub liquidity_exited: u128,
    pub repaid_b: u128,
    /// Debt still open afterwards
    pub remaining_debt: u128,
    /// Planner iterations spent repaying
    pub iterations: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardworkReport {
    pub rewards: Vec<(AssetId, u128)>,
    pub rebalance: RebalanceReport,
    /// Liquidity minted from idle balances when no rebalance ran
    pub compounded_liquidity: u128,
}

impl PairStrategy {
    /// Withdraw `amount_a` worth of the position as A: exit the proportional
    /// share of liquidity, repay the proportional share of debt, swap what is
    /// left toward A and send up to `amount_a` to the vault.
    pub fn withdraw_amount(&self, amount_a: u128) -> EngineResult<WithdrawReport> {
        let (report, guard) = self.run(Operation::Withdraw, |exec, _| {
            let mut report = WithdrawReport {
                requested: amount_a,
                ..WithdrawReport::default()
            };
            if amount_a == 0 {
                return Ok(report);
            }

            let pricing = PairPricing::new(exec.prices()?, self.config.decimals());
            if !pricing.is_priceable() {
                return Err(RebalancerError::InvalidState(
                    "cannot size a withdrawal without prices".to_string(),
                ));
            }

            let debt = exec.refresh_debt(&pricing)?;
            let liquidity = exec.state.position.liquidity;
            let in_pool = exec.quote_exit(liquidity)?;
            let idle = exec.balances()?;
            let fraction = withdraw_fraction(&pricing, amount_a, idle, in_pool, &debt)?;

            report.liquidity_exited = mul_div(liquidity, fraction, WAD, Rounding::Up)?.min(liquidity);
            let repay = mul_div(debt.total_debt_amount, fraction, WAD, Rounding::Up)?.min(debt.total_debt_amount);

            exec.exit_pool(report.liquidity_exited, false)?;
            let executed = self.repay_toward_a(exec, &pricing, repay)?;
            report.repaid_b = executed.repaid_b;
            report.iterations = 1;

            report.sent = exec.payout(Side::A, amount_a)?;
            report.remaining_debt = exec.refresh_debt(&pricing)?.total_debt_amount;
            Ok(report)
        })?;

        let phase = self.settle_from_tick(guard)?;
        info!(
            strategy = %self.config.strategy_id,
            requested = report.requested,
            sent = report.sent,
            repaid = report.repaid_b,
            ?phase,
            "withdrawal complete"
        );
        Ok(report)
    }

    /// Close the position: exit all liquidity, repay debt over at most
    /// `max_withdraw_iterations` plans, sweep B above dust into A and send all
    /// A to the vault.
    pub fn withdraw_all(&self) -> EngineResult<WithdrawReport> {
        let (report, guard) = self.run(Operation::WithdrawAll, |exec, _| {
            let mut report = WithdrawReport::default();
            let pricing = PairPricing::new(exec.prices()?, self.config.decimals());

            report.liquidity_exited = exec.state.position.liquidity;
            exec.exit_pool(report.liquidity_exited, false)?;

            while report.iterations < self.config.max_withdraw_iterations {
                let debt = exec.refresh_debt(&pricing)?;
                if !debt.has_debt() {
                    break;
                }
                let executed = self.repay_toward_a(exec, &pricing, debt.total_debt_amount)?;
                report.iterations += 1;
                report.repaid_b += executed.repaid_b;
                if executed.repaid_b == 0 {
                    break;
                }
            }

            report.remaining_debt = exec.refresh_debt(&pricing)?.total_debt_amount;
            if report.remaining_debt > 0 {
                warn!(
                    strategy = %self.config.strategy_id,
                    remaining_debt = report.remaining_debt,
                    iterations = report.iterations,
                    "debt left open after full withdrawal"
                );
            }

            let dust_b = self.config.liquidation_thresholds()[Side::B.index()];
            let idle_b = exec.balance(Side::B)?;
            if idle_b > 0 && idle_b >= dust_b {
                exec.swap(Side::B, idle_b)?;
            }

            let idle_a = exec.balance(Side::A)?;
            report.requested = idle_a;
            report.sent = exec.payout(Side::A, idle_a)?;
            Ok(report)
        })?;

        guard.settle(PositionPhase::InRange);
        info!(
            strategy = %self.config.strategy_id,
            sent = report.sent,
            repaid = report.repaid_b,
            remaining_debt = report.remaining_debt,
            "full withdrawal complete"
        );
        Ok(report)
    }

    /// Claim pool and lending rewards; returns the merged non-zero amounts
    pub fn claim_rewards(&self) -> EngineResult<Vec<(AssetId, u128)>> {
        let (rewards, _guard) = self.run(Operation::ClaimRewards, |exec, _| exec.claim_rewards())?;
        info!(strategy = %self.config.strategy_id, assets = rewards.len(), "rewards claimed");
        Ok(rewards)
    }

    /// Periodic cycle: claim rewards, rebalance when needed, otherwise compound
    /// idle A/B back into the pool at the target proportion.
    pub fn hardwork(&self) -> EngineResult<HardworkReport> {
        let (report, guard) = self.run(Operation::Hardwork, |exec, guard| {
            let rewards = exec.claim_rewards()?;
            let rebalance = self.rebalance_staged(exec, guard)?;

            let mut compounded_liquidity = 0;
            if rebalance.plan_kind.is_none() {
                let pricing = PairPricing::new(exec.prices()?, self.config.decimals());
                if pricing.is_priceable() {
                    self.restore_proportion(exec, &pricing, 0)?;
                }
                compounded_liquidity = exec.enter_pool()?.liquidity;
            }

            Ok(HardworkReport {
                rewards,
                rebalance,
                compounded_liquidity,
            })
        })?;

        let phase = self.settle_from_tick(guard)?;
        info!(
            strategy = %self.config.strategy_id,
            rewards = report.rewards.len(),
            rebalanced = report.rebalance.plan_kind.is_some(),
            compounded = report.compounded_liquidity,
            ?phase,
            "hardwork complete"
        );
        Ok(HardworkReport {
            rebalance: RebalanceReport {
                phase,
                ..report.rebalance
            },
            ..report
        })
    }

    /// Pull all liquidity with `emergency = true`; no swaps, no repays
    pub fn emergency_exit(&self) -> EngineResult<[u128; 2]> {
        let (withdrawn, guard) = self.run(Operation::EmergencyExit, |exec, _| {
            let liquidity = exec.state.position.liquidity;
            exec.exit_pool(liquidity, true)
        })?;

        guard.settle(PositionPhase::NeedsRebalance);
        warn!(
            strategy = %self.config.strategy_id,
            withdrawn_a = withdrawn[0],
            withdrawn_b = withdrawn[1],
            "emergency exit"
        );
        Ok(withdrawn)
    }

    /// Compare base amounts with custody balances. Divergence above the drift
    /// threshold (or the asset's dust threshold, whichever is larger) is
    /// reported; the ledger itself is never adjusted.
    pub fn reconcile(&self) -> EngineResult<DriftReport> {
        let _guard = self.machine.begin(Operation::Reconcile)?;
        let state = self.read_state()?;

        let mut wallet = BTreeMap::new();
        let tracked = state.ledger.entries().map(|(asset, _)| asset.clone());
        for asset in tracked.chain(self.pair.to_vec()) {
            if !wallet.contains_key(&asset) {
                let balance = self.collaborators.custody.balance_of(&asset)?;
                wallet.insert(asset, balance);
            }
        }

        let report = state
            .ledger
            .reconcile(&wallet, |asset| self.config.drift_threshold_for(asset));
        for entry in &report.entries {
            warn!(
                strategy = %self.config.strategy_id,
                asset = %entry.asset,
                base_amount = entry.base_amount,
                wallet_balance = entry.wallet_balance,
                drift = entry.drift(),
                "ledger drift"
            );
        }
        Ok(report)
    }

    /// Repay exactly `amount_to_repay_b`, buying only the B that is short, and
    /// convert leftover B toward A
    fn repay_toward_a(
        &self,
        exec: &mut Execution<'_>,
        pricing: &PairPricing,
        amount_to_repay_b: u128,
    ) -> EngineResult<PlanReport> {
        let input = IterationPlanInput::new(pricing.prices, self.config.decimals(), PROPORTION_ALL_A)
            .with_thresholds(self.config.liquidation_thresholds())
            .with_exact_repay();
        let planner = IterationPlanner::new(input);

        let plan = exec.plan(&planner, amount_to_repay_b)?;
        if plan.kind() == PlanKind::SwapOnly && amount_to_repay_b > 0 {
            warn!(strategy = %self.config.strategy_id, amount_to_repay_b, "repay could not be planned");
        }
        exec.execute_plan(&plan)
    }
}

/// Share of the position (18 decimals, at most 1) that `amount_a` represents.
///
/// Equity is idle plus pooled balances plus pledged collateral, less debt.
pub fn withdraw_fraction(
    pricing: &PairPricing,
    amount_a: u128,
    idle: [u128; 2],
    in_pool: [u128; 2],
    debt: &DebtStatus,
) -> CoreResult<u128> {
    let holdings_a = idle[0]
        .saturating_add(in_pool[0])
        .saturating_add(debt.total_collateral_amount);
    let holdings_b = idle[1].saturating_add(in_pool[1]);

    let assets = pricing
        .value(Side::A, holdings_a)?
        .saturating_add(pricing.value(Side::B, holdings_b)?);
    let equity = assets.saturating_sub(pricing.value(Side::B, debt.total_debt_amount)?);
    if equity == 0 {
        return Ok(WAD);
    }

    let requested = pricing.value(Side::A, amount_a)?;
    Ok(mul_div(requested, WAD, equity, Rounding::Up)?.min(WAD))
}
