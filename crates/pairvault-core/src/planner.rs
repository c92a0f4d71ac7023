//! # Iteration Planner
//!
//! Turns balances, debt and a target B proportion into the smallest swap/repay
//! plan that restores the proportion.
//!
//! All intermediate math runs on 18-decimal normalized amounts and USD values;
//! amounts are de-normalized only when the instructions are emitted.
//!
//! Three shapes are possible:
//!
//! - `SwapOnly`: nothing to repay, swap toward the target.
//! - `SwapRepay`: the B on hand covers the repay. The swap is sized against
//!   the post-repay balances and executes first.
//! - `RepaySwapRepay`: the B on hand does not cover the repay. All of it is
//!   repaid first, A is swapped into B, and a second repay follows. Because the
//!   first repay changes the collateral base, the swap is solved in closed form:
//!
//! ```text
//! bA1   = balance A + collateral released by the first repay
//! alpha = total collateral A / total borrow B
//! x, y  = target shares of A and B
//!
//! full swap when  r = V(bA1) * x / (alpha*pA*y + pB*x)  fits in the remaining debt
//!   swap = bA1, second repay = max(r, forced remainder)
//! otherwise       swap = ((bA1 + alpha*m)*pA*y + m*pB*x) / pA
//! ```
//!
//! With `exact_repay` set the full-swap branch is skipped, so the second repay
//! is exactly the forced remainder `m`.
//!
//! The planner never fails on adverse input: unpriceable assets, inconsistent
//! debt figures or arithmetic faults degrade to the smallest safe plan, because
//! callers run it speculatively before committing anything.

use crate::errors::CoreResult;
use crate::math::fixed_point::{wad_complement, wad_div, wad_mul, Rounding};
use crate::math::safe_math::{safe_add_u128, safe_sub_u128};
use crate::resolver::{amount_for_value, collateral_ratio, value_of, PairPricing};
use crate::types::asset::Side;
use crate::types::plan::{IterationPlanInput, RebalancePlan, RepayInstruction, SwapInstruction};

/// Stateless planner bound to one call's parameters
#[derive(Debug, Clone, Copy)]
pub struct IterationPlanner {
    input: IterationPlanInput,
}

impl IterationPlanner {
    pub fn new(input: IterationPlanInput) -> Self {
        Self { input }
    }

    pub fn input(&self) -> &IterationPlanInput {
        &self.input
    }

    /// Compute a plan; degrades to the no-op plan on any fault.
    ///
    /// Amounts are native units. `collateral_a` is the collateral expected back
    /// from the first repay leg (the full repay for `SwapRepay`, the repay of the
    /// whole B balance for `RepaySwapRepay`).
    pub fn plan(
        &self,
        balance_a: u128,
        balance_b: u128,
        amount_to_repay_b: u128,
        collateral_a: u128,
        total_collateral_a: u128,
        total_borrow_b: u128,
    ) -> RebalancePlan {
        self.try_plan(
            balance_a,
            balance_b,
            amount_to_repay_b,
            collateral_a,
            total_collateral_a,
            total_borrow_b,
        )
        .unwrap_or_else(|_| RebalancePlan::noop())
    }

    /// Same as [`plan`](Self::plan) but surfaces arithmetic faults
    pub fn try_plan(
        &self,
        balance_a: u128,
        balance_b: u128,
        amount_to_repay_b: u128,
        collateral_a: u128,
        total_collateral_a: u128,
        total_borrow_b: u128,
    ) -> CoreResult<RebalancePlan> {
        self.input.validate()?;

        let pricing = self.input.pricing();
        if !pricing.is_priceable() {
            return Ok(RebalancePlan::noop());
        }

        if amount_to_repay_b == 0 {
            let swap = self.swap_toward_target(&pricing, balance_a, balance_b, balance_a)?;
            return Ok(RebalancePlan::SwapOnly { swap });
        }

        // Repay requested against no recorded borrow: nothing to plan
        if total_borrow_b == 0 {
            return Ok(RebalancePlan::noop());
        }

        let amount_to_repay_b = amount_to_repay_b.min(total_borrow_b);

        if amount_to_repay_b <= balance_b {
            self.plan_swap_repay(&pricing, balance_a, balance_b, amount_to_repay_b, collateral_a)
        } else {
            self.plan_repay_swap_repay(
                &pricing,
                balance_a,
                balance_b,
                amount_to_repay_b,
                collateral_a,
                total_collateral_a,
                total_borrow_b,
            )
        }
    }

    fn plan_swap_repay(
        &self,
        pricing: &PairPricing,
        balance_a: u128,
        balance_b: u128,
        amount_to_repay_b: u128,
        collateral_a: u128,
    ) -> CoreResult<RebalancePlan> {
        // Size the swap against what remains after the repay
        let post_a = safe_add_u128(balance_a, collateral_a)?;
        let post_b = safe_sub_u128(balance_b, amount_to_repay_b)?;

        // Released collateral is not on hand yet when the swap runs
        let swap = self.swap_toward_target(pricing, post_a, post_b, balance_a)?;

        Ok(RebalancePlan::SwapRepay {
            swap,
            repay: RepayInstruction::borrowed(amount_to_repay_b),
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_repay_swap_repay(
        &self,
        pricing: &PairPricing,
        balance_a: u128,
        balance_b: u128,
        amount_to_repay_b: u128,
        collateral_a: u128,
        total_collateral_a: u128,
        total_borrow_b: u128,
    ) -> CoreResult<RebalancePlan> {
        let first_repay = RepayInstruction::borrowed(balance_b);

        let (swap_a18, second_repay_b18) = self.estimate_swap_amount_for_repay_swap_repay(
            pricing,
            balance_a,
            balance_b,
            amount_to_repay_b,
            collateral_a,
            total_collateral_a,
            total_borrow_b,
        )?;

        let swap_amount = pricing.denormalize(Side::A, swap_a18, Rounding::Down)?;
        let swap = self.guard_dust(Side::A, swap_amount);

        // The second leg repays out of the swap output; without a swap there is none
        let second_repay = match swap {
            Some(_) => {
                let amount = pricing.denormalize(Side::B, second_repay_b18, Rounding::Down)?;
                (amount > 0).then(|| RepayInstruction::borrowed(amount))
            }
            None => None,
        };

        Ok(RebalancePlan::RepaySwapRepay {
            first_repay,
            swap,
            second_repay,
        })
    }

    /// Closed-form swap amount (A, normalized) and second repay (B, normalized)
    /// for the repay-swap-repay iteration.
    #[allow(clippy::too_many_arguments)]
    pub fn estimate_swap_amount_for_repay_swap_repay(
        &self,
        pricing: &PairPricing,
        balance_a: u128,
        balance_b: u128,
        amount_to_repay_b: u128,
        collateral_a: u128,
        total_collateral_a: u128,
        total_borrow_b: u128,
    ) -> CoreResult<(u128, u128)> {
        let price_a = pricing.price(Side::A);
        let price_b = pricing.price(Side::B);
        let y = self.input.target_prop_b();
        let x = wad_complement(y)?;

        // State after the first repay consumed the whole B balance
        let b_a1 = pricing.normalize(Side::A, safe_add_u128(balance_a, collateral_a)?)?;
        let remaining_debt = pricing.normalize(Side::B, total_borrow_b.saturating_sub(balance_b))?;
        let forced = pricing
            .normalize(Side::B, amount_to_repay_b.saturating_sub(balance_b))?
            .min(remaining_debt);

        let total_collateral18 = pricing.normalize(Side::A, total_collateral_a)?;
        let total_borrow18 = pricing.normalize(Side::B, total_borrow_b)?;

        // Collateral released per unit of B repaid, and its value
        let alpha = collateral_ratio(total_collateral18, total_borrow18)?;
        let alpha_price_a = wad_mul(alpha, price_a, Rounding::Down)?;

        // Second repay that would hit the target after swapping everything
        let value_a1 = value_of(b_a1, price_a)?;
        let numerator = wad_mul(value_a1, x, Rounding::Down)?;
        let denominator = safe_add_u128(
            wad_mul(alpha_price_a, y, Rounding::Down)?,
            wad_mul(price_b, x, Rounding::Down)?,
        )?;
        let ideal_repay = if numerator == 0 || denominator == 0 {
            0
        } else {
            wad_div(numerator, denominator, Rounding::Down)?
        };

        if !self.input.exact_repay && ideal_repay <= remaining_debt {
            let swap_output = pricing.convert(Side::A, b_a1, Rounding::Down)?;
            let second = ideal_repay.max(forced).min(remaining_debt).min(swap_output);
            return Ok((b_a1, second));
        }

        // Partial swap: solve the linear equation with the forced remainder repaid
        let released = wad_mul(forced, alpha, Rounding::Down)?;
        let value_kept_a = value_of(safe_add_u128(b_a1, released)?, price_a)?;
        let value_forced_b = value_of(forced, price_b)?;
        let swap_value = safe_add_u128(
            wad_mul(value_kept_a, y, Rounding::Down)?,
            wad_mul(value_forced_b, x, Rounding::Down)?,
        )?;
        let swap_a18 = amount_for_value(swap_value, price_a, Rounding::Down)?.unwrap_or(0);

        // Always buy at least the forced remainder
        let minimum = pricing.convert(Side::B, forced, Rounding::Up)?;
        let swap_a18 = swap_a18.max(minimum).min(b_a1);

        Ok((swap_a18, forced))
    }

    /// Swap that moves (`amount_a`, `amount_b`) to the target split. A→B swaps
    /// are capped at `available_a`; B→A swaps never exceed `amount_b`.
    fn swap_toward_target(
        &self,
        pricing: &PairPricing,
        amount_a: u128,
        amount_b: u128,
        available_a: u128,
    ) -> CoreResult<Option<SwapInstruction>> {
        let price_a = pricing.price(Side::A);
        let price_b = pricing.price(Side::B);

        let value_a = value_of(pricing.normalize(Side::A, amount_a)?, price_a)?;
        let value_b = value_of(pricing.normalize(Side::B, amount_b)?, price_b)?;
        let total = safe_add_u128(value_a, value_b)?;
        let target_b = wad_mul(total, self.input.target_prop_b(), Rounding::Down)?;

        let (side, amount18) = if value_b < target_b {
            let needed = amount_for_value(target_b - value_b, price_a, Rounding::Down)?.unwrap_or(0);
            (Side::A, needed)
        } else if value_b > target_b {
            let excess = amount_for_value(value_b - target_b, price_b, Rounding::Down)?.unwrap_or(0);
            (Side::B, excess)
        } else {
            return Ok(None);
        };

        let amount = pricing.denormalize(side, amount18, Rounding::Down)?;
        let cap = match side {
            Side::A => available_a,
            Side::B => amount_b,
        };

        Ok(self.guard_dust(side, amount.min(cap)))
    }

    /// Drop swaps that are empty or below the input asset's liquidation threshold
    fn guard_dust(&self, asset_in: Side, amount_in: u128) -> Option<SwapInstruction> {
        if amount_in == 0 || amount_in < self.input.threshold(asset_in) {
            return None;
        }
        Some(SwapInstruction { asset_in, amount_in })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::WAD;
    use crate::types::plan::PlanKind;

    fn planner(prices: [u128; 2], prop_b: u128) -> IterationPlanner {
        IterationPlanner::new(IterationPlanInput::new(prices, [18, 18], prop_b))
    }

    #[test]
    fn test_swap_only_both_directions() {
        let p = planner([WAD, WAD], WAD / 2);

        let plan = p.plan(1000, 200, 0, 0, 0, 0);
        assert_eq!(plan.kind(), PlanKind::SwapOnly);
        assert_eq!(plan.swap(), Some(SwapInstruction { asset_in: Side::A, amount_in: 400 }));

        let plan = p.plan(100, 500, 0, 0, 0, 0);
        assert_eq!(plan.swap(), Some(SwapInstruction { asset_in: Side::B, amount_in: 200 }));
    }

    #[test]
    fn test_already_balanced_is_noop() {
        let p = planner([WAD, WAD], WAD / 2);
        assert_eq!(p.plan(500, 500, 0, 0, 0, 0), RebalancePlan::noop());
    }

    #[test]
    fn test_unpriceable_returns_noop() {
        let p = planner([0, WAD], WAD / 2);
        assert_eq!(p.plan(1000, 0, 10, 10, 100, 100), RebalancePlan::noop());
    }

    #[test]
    fn test_repay_without_borrow_is_permissive() {
        let p = planner([WAD, WAD], WAD / 2);
        let plan = p.plan(1000, 200, 50, 0, 0, 0);
        assert_eq!(plan.kind(), PlanKind::SwapOnly);
        assert_eq!(plan.swap_amount_in(), 0);
    }

    #[test]
    fn test_swap_repay_sizes_against_post_repay_balances() {
        let p = planner([WAD, WAD], WAD / 2);
        // After repaying 100 B and receiving 150 A: [1150, 300] -> swap 425 A
        let plan = p.plan(1000, 400, 100, 150, 3000, 2000);
        assert_eq!(plan.kind(), PlanKind::SwapRepay);
        assert_eq!(plan.swap(), Some(SwapInstruction { asset_in: Side::A, amount_in: 425 }));
        assert_eq!(plan.repays(), vec![RepayInstruction::borrowed(100)]);
    }

    #[test]
    fn test_swap_repay_caps_swap_at_on_hand_a() {
        let p = planner([WAD, WAD], WAD);
        // Target is all B: wants 1100 A swapped but only 100 are on hand
        let plan = p.plan(100, 200, 200, 1000, 2000, 400);
        assert_eq!(plan.swap_amount_in(), 100);
    }

    #[test]
    fn test_dust_swap_keeps_repay() {
        let input = IterationPlanInput::new([WAD, WAD], [18, 18], WAD / 2).with_thresholds([500, 500]);
        let plan = IterationPlanner::new(input).plan(1000, 400, 100, 150, 3000, 2000);
        assert_eq!(plan, RebalancePlan::SwapRepay { swap: None, repay: RepayInstruction::borrowed(100) });
    }

    #[test]
    fn test_repay_swap_repay_forced_remainder() {
        // Debt is too small for a full swap; 300 B still has to be repaid
        let p = planner([WAD, WAD], 0);
        let plan = p.plan(1000, 200, 500, 400, 1200, 600);
        match plan {
            RebalancePlan::RepaySwapRepay { first_repay, swap, second_repay } => {
                assert_eq!(first_repay.amount, 200);
                // Target is all A, so the swap only buys the 300 B remainder
                assert_eq!(swap.map(|s| s.amount_in), Some(300));
                assert_eq!(second_repay, Some(RepayInstruction::borrowed(300)));
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn test_exact_repay_stops_at_requested_amount() {
        // 50 B on hand, 100 B requested, 225 A after the first repay
        let loose = planner([WAD, WAD], 0);
        let plan = loose.plan(150, 50, 100, 75, 600, 400);
        assert_eq!(plan.swap_amount_in(), 225);
        assert_eq!(plan.total_repay(), 50 + 225);

        let exact = IterationPlanner::new(IterationPlanInput::new([WAD, WAD], [18, 18], 0).with_exact_repay());
        match exact.plan(150, 50, 100, 75, 600, 400) {
            RebalancePlan::RepaySwapRepay { first_repay, swap, second_repay } => {
                assert_eq!(first_repay.amount, 50);
                assert_eq!(swap.map(|s| s.amount_in), Some(50));
                assert_eq!(second_repay, Some(RepayInstruction::borrowed(50)));
            }
            other => panic!("unexpected plan {:?}", other),
        }
    }
}
