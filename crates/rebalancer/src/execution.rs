//! Staged execution of collaborator calls.
//!
//! An [`Execution`] owns a working copy of the strategy state. Each call it
//! makes is measured against custody balances taken immediately before and
//! after, and the observed deltas are applied to the staged ledger in the
//! order the calls ran. The strategy commits the copy only when the whole
//! operation succeeded; dropping it discards every staged change.

use pairvault_core::{
    AssetId, AssetPair, BaseAmountLedger, DebtStatus, IterationPlanner, PairPricing, PlanStep, RebalancePlan, Side,
    INDEX_A,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::collaborators::{Collaborators, PoolEntry};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::strategy::StrategyState;

/// What a plan actually did, measured from balances
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanReport {
    /// Amount sent into the router per side, A first
    pub swapped_in: [u128; 2],
    /// Amount received from the router per side, A first
    pub swapped_out: [u128; 2],
    /// B repaid across all repay legs
    pub repaid_b: u128,
    /// A collateral released by the repays
    pub collateral_released: u128,
}

impl PlanReport {
    fn absorb(&mut self, other: PlanReport) {
        for i in 0..2 {
            self.swapped_in[i] += other.swapped_in[i];
            self.swapped_out[i] += other.swapped_out[i];
        }
        self.repaid_b += other.repaid_b;
        self.collateral_released += other.collateral_released;
    }
}

pub(crate) struct Execution<'a> {
    collaborators: &'a Collaborators,
    pair: &'a AssetPair,
    assets: Vec<AssetId>,
    pub(crate) state: StrategyState,
}

impl<'a> Execution<'a> {
    pub(crate) fn new(collaborators: &'a Collaborators, pair: &'a AssetPair, state: StrategyState) -> Self {
        Self {
            collaborators,
            pair,
            assets: pair.to_vec(),
            state,
        }
    }

    /// Finish the operation, yielding the state to commit
    pub(crate) fn into_state(mut self) -> EngineResult<StrategyState> {
        self.state.position.balances = self.balances()?;
        Ok(self.state)
    }

    fn asset(&self, side: Side) -> &AssetId {
        self.pair.asset(side)
    }

    pub(crate) fn ledger(&mut self) -> &mut BaseAmountLedger {
        &mut self.state.ledger
    }

    pub(crate) fn balance(&self, side: Side) -> EngineResult<u128> {
        self.collaborators.custody.balance_of(self.asset(side))
    }

    pub(crate) fn balances(&self) -> EngineResult<[u128; 2]> {
        Ok([self.balance(Side::A)?, self.balance(Side::B)?])
    }

    pub(crate) fn prices(&self) -> EngineResult<[u128; 2]> {
        let oracle = &self.collaborators.oracle;
        Ok([oracle.price(self.asset(Side::A))?, oracle.price(self.asset(Side::B))?])
    }

    /// Re-read debt from the lending abstraction and stage it
    pub(crate) fn refresh_debt(&mut self, pricing: &PairPricing) -> EngineResult<DebtStatus> {
        let (debt, collateral) = self
            .collaborators
            .lending
            .get_debt_amount_current(self.asset(Side::A), self.asset(Side::B))?;
        let status = DebtStatus::evaluate(debt, collateral, pricing)?;
        self.state.debt = status;
        Ok(status)
    }

    fn current_debt(&self) -> EngineResult<(u128, u128)> {
        self.collaborators
            .lending
            .get_debt_amount_current(self.asset(Side::A), self.asset(Side::B))
    }

    /// Target B share: the pool-implied one when enabled, otherwise the fallback
    pub(crate) fn pool_proportion(&self, config: &EngineConfig) -> EngineResult<Option<u128>> {
        if config.use_pool_proportion {
            self.collaborators.pool.current_tick_ratio().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Deploy every idle unit of A and B into the pool
    pub(crate) fn enter_pool(&mut self) -> EngineResult<PoolEntry> {
        let before = self.balances()?;
        if before == [0, 0] {
            return Ok(PoolEntry::default());
        }

        let entry = self.collaborators.pool.enter(before)?;
        let after = self.balances()?;
        let consumed = [before[0].saturating_sub(after[0]), before[1].saturating_sub(after[1])];

        self.state.position.liquidity += entry.liquidity;
        self.state
            .ledger
            .record_deposit(&self.assets, &consumed, &[0, 0], 0, INDEX_A)?;

        debug!(consumed_a = consumed[0], consumed_b = consumed[1], liquidity = entry.liquidity, "entered pool");
        Ok(PoolEntry {
            consumed,
            liquidity: entry.liquidity,
        })
    }

    pub(crate) fn exit_pool(&mut self, liquidity: u128, emergency: bool) -> EngineResult<[u128; 2]> {
        let liquidity = liquidity.min(self.state.position.liquidity);
        if liquidity == 0 {
            return Ok([0, 0]);
        }

        let before = self.balances()?;
        let quoted = self.collaborators.pool.exit(liquidity, emergency)?;
        let after = self.balances()?;
        let withdrawn = [after[0].saturating_sub(before[0]), after[1].saturating_sub(before[1])];

        self.state.position.liquidity -= liquidity;
        self.state
            .ledger
            .record_withdraw(&self.assets, &withdrawn, &[0, 0], INDEX_A, withdrawn[0])?;

        debug!(
            liquidity,
            emergency,
            withdrawn_a = withdrawn[0],
            withdrawn_b = withdrawn[1],
            reported_a = quoted[0],
            reported_b = quoted[1],
            "exited pool"
        );
        Ok(withdrawn)
    }

    /// Pledge `collateral_a` and borrow `amount_b`; returns the B received
    pub(crate) fn borrow(&mut self, collateral_a: u128, amount_b: u128) -> EngineResult<u128> {
        if amount_b == 0 {
            return Ok(0);
        }

        let before = self.balances()?;
        self.collaborators
            .lending
            .borrow(self.asset(Side::A), collateral_a, self.asset(Side::B), amount_b)?;
        let after = self.balances()?;

        let collateral_spent = before[0].saturating_sub(after[0]);
        let borrowed = after[1].saturating_sub(before[1]);
        self.state
            .ledger
            .record_deposit(&self.assets, &[0, 0], &[0, borrowed], collateral_spent, INDEX_A)?;

        debug!(collateral_spent, borrowed, "borrowed");
        Ok(borrowed)
    }

    /// Repay up to `amount` of B, bounded by the observed B balance and the
    /// current debt. Returns the B actually repaid.
    pub(crate) fn repay(&mut self, amount: u128) -> EngineResult<PlanReport> {
        let (debt, _) = self.current_debt()?;
        let on_hand = self.balance(Side::B)?;
        let amount = amount.min(on_hand).min(debt);
        if amount == 0 {
            return Ok(PlanReport::default());
        }

        let before = self.balances()?;
        let outcome = self
            .collaborators
            .lending
            .repay(self.asset(Side::A), self.asset(Side::B), amount)?;
        let after = self.balances()?;

        let repaid = before[1].saturating_sub(after[1]);
        let collateral = after[0].saturating_sub(before[0]);
        self.state
            .ledger
            .record_withdraw(&self.assets, &[0, 0], &[0, repaid], INDEX_A, collateral)?;

        debug!(
            requested = amount,
            repaid,
            collateral,
            leftover = outcome.leftover_borrowed,
            "repaid"
        );
        Ok(PlanReport {
            repaid_b: repaid,
            collateral_released: collateral,
            ..PlanReport::default()
        })
    }

    /// Swap up to `amount_in` of one side, bounded by the observed balance
    pub(crate) fn swap(&mut self, asset_in: Side, amount_in: u128) -> EngineResult<PlanReport> {
        let amount_in = amount_in.min(self.balance(asset_in)?);
        if amount_in == 0 {
            return Ok(PlanReport::default());
        }

        let asset_out = asset_in.other();
        let before = self.balances()?;
        let reported = self
            .collaborators
            .router
            .swap(self.asset(asset_in), self.asset(asset_out), amount_in)?;
        let after = self.balances()?;

        let spent = before[asset_in.index()].saturating_sub(after[asset_in.index()]);
        let received = after[asset_out.index()].saturating_sub(before[asset_out.index()]);
        if received < reported {
            warn!(reported, received, "router delivered less than reported");
        }

        let (asset_in_id, asset_out_id) = (self.asset(asset_in).clone(), self.asset(asset_out).clone());
        self.state
            .ledger
            .record_swap(&asset_in_id, spent, &asset_out_id, received)?;

        debug!(asset_in = %asset_in_id, spent, received, "swapped");
        let mut report = PlanReport::default();
        report.swapped_in[asset_in.index()] = spent;
        report.swapped_out[asset_out.index()] = received;
        Ok(report)
    }

    /// Plan a repay of `amount_to_repay_b` toward the input's target proportion
    pub(crate) fn plan(&self, planner: &IterationPlanner, amount_to_repay_b: u128) -> EngineResult<RebalancePlan> {
        let [balance_a, balance_b] = self.balances()?;
        let (total_borrow_b, total_collateral_a) = self.current_debt()?;

        if amount_to_repay_b > 0 && total_borrow_b == 0 {
            warn!(amount_to_repay_b, "repay requested without outstanding borrow, planning a no-op");
        }

        let first_leg = amount_to_repay_b.min(balance_b).min(total_borrow_b);
        let collateral_a = if first_leg == 0 {
            0
        } else {
            self.collaborators
                .lending
                .quote_repay(self.asset(Side::A), self.asset(Side::B), first_leg)?
        };

        let plan = planner.plan(
            balance_a,
            balance_b,
            amount_to_repay_b,
            collateral_a,
            total_collateral_a,
            total_borrow_b,
        );

        if !planner.input().pricing().is_priceable() {
            warn!(prices = ?planner.input().prices, "unpriceable pair, skipping plan");
        }
        debug!(kind = ?plan.kind(), swap = plan.swap_amount_in(), repay = plan.total_repay(), "planned");
        Ok(plan)
    }

    /// Run the plan's steps in order. Repay legs use observed balances, so a
    /// router under-fill shrinks the following repay instead of failing it.
    pub(crate) fn execute_plan(&mut self, plan: &RebalancePlan) -> EngineResult<PlanReport> {
        let mut report = PlanReport::default();
        for step in plan.steps() {
            let step_report = match step {
                PlanStep::Swap(swap) => self.swap(swap.asset_in, swap.amount_in)?,
                PlanStep::Repay(repay) => self.repay(repay.amount)?,
            };
            report.absorb(step_report);
        }
        Ok(report)
    }

    /// Send up to `amount` of one side to the vault; returns the amount sent
    pub(crate) fn payout(&mut self, side: Side, amount: u128) -> EngineResult<u128> {
        let amount = amount.min(self.balance(side)?);
        if amount == 0 {
            return Ok(0);
        }

        let asset = self.asset(side).clone();
        let before = self.balance(side)?;
        self.collaborators.custody.send_to_vault(&asset, amount)?;
        let sent = before.saturating_sub(self.balance(side)?);

        self.state.ledger.record_payout(&asset, sent)?;
        Ok(sent)
    }

    /// Claim from pool and lending; returns the merged, non-zero list
    pub(crate) fn claim_rewards(&mut self) -> EngineResult<Vec<(AssetId, u128)>> {
        let from_pool = self.collaborators.pool.claim_rewards()?;
        let from_lending = self.collaborators.lending.claim_rewards()?;
        let merged = self.state.ledger.record_rewards_claim(&from_pool, &from_lending)?;
        Ok(merged)
    }

    pub(crate) fn current_tick(&self) -> EngineResult<i32> {
        self.collaborators.pool.current_tick()
    }

    pub(crate) fn select_range(&mut self, tick: i32) -> EngineResult<()> {
        let range = self.collaborators.pool.select_range(tick)?;
        self.state.position.range = range;
        Ok(())
    }

    pub(crate) fn quote_exit(&self, liquidity: u128) -> EngineResult<[u128; 2]> {
        if liquidity == 0 {
            return Ok([0, 0]);
        }
        self.collaborators.pool.quote_exit(liquidity)
    }
}
