//! # Plan Types
//!
//! Per-call planner input and the instruction set it produces. Plans are built
//! fresh for one call and consumed once.

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

use crate::constants::PROPORTION_ALL_B;
use crate::errors::{CoreResult, PairCoreError};
use crate::resolver::PairPricing;
use crate::types::asset::Side;

/// Immutable parameters of one planning call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IterationPlanInput {
    /// Prices of A and B, 18 decimals (0 = unavailable)
    pub prices: [u128; 2],
    /// Token decimals of A and B
    pub decimals: [u8; 2],
    /// Caller's target share of B, 18 decimals (0 = all A, 1e18 = all B)
    pub prop_b: u128,
    /// Per-asset amounts below which a swap is treated as dust (native units)
    pub liquidation_thresholds: [u128; 2],
    /// Use the pool-implied proportion instead of `prop_b`
    pub use_pool_proportion: bool,
    /// Pool-implied share of B, read from the pool tick ratio by the caller
    pub pool_prop_b: u128,
    /// Repay only what was requested; never swap further to close more debt
    pub exact_repay: bool,
}

impl IterationPlanInput {
    pub fn new(prices: [u128; 2], decimals: [u8; 2], prop_b: u128) -> Self {
        Self {
            prices,
            decimals,
            prop_b,
            liquidation_thresholds: [0, 0],
            use_pool_proportion: false,
            pool_prop_b: 0,
            exact_repay: false,
        }
    }

    pub fn with_thresholds(mut self, thresholds: [u128; 2]) -> Self {
        self.liquidation_thresholds = thresholds;
        self
    }

    pub fn with_pool_proportion(mut self, pool_prop_b: u128) -> Self {
        self.use_pool_proportion = true;
        self.pool_prop_b = pool_prop_b;
        self
    }

    pub fn with_exact_repay(mut self) -> Self {
        self.exact_repay = true;
        self
    }

    /// Target B share in effect for this call
    pub fn target_prop_b(&self) -> u128 {
        if self.use_pool_proportion {
            self.pool_prop_b
        } else {
            self.prop_b
        }
    }

    pub fn pricing(&self) -> PairPricing {
        PairPricing::new(self.prices, self.decimals)
    }

    pub fn threshold(&self, side: Side) -> u128 {
        self.liquidation_thresholds[side.index()]
    }

    /// Reject proportions outside [0, 1e18]
    pub fn validate(&self) -> CoreResult<()> {
        for prop in [self.prop_b, self.pool_prop_b] {
            if prop > PROPORTION_ALL_B {
                return Err(PairCoreError::InvalidProportion(prop));
            }
        }
        Ok(())
    }
}

/// Shape of a rebalance instruction set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub enum PlanKind {
    SwapOnly,
    SwapRepay,
    RepaySwapRepay,
}

/// Swap `amount_in` of one side for the other
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct SwapInstruction {
    pub asset_in: Side,
    pub amount_in: u128,
}

impl SwapInstruction {
    pub fn asset_out(&self) -> Side {
        self.asset_in.other()
    }
}

/// Repay `amount` of borrowed `asset`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct RepayInstruction {
    pub asset: Side,
    pub amount: u128,
}

impl RepayInstruction {
    pub fn borrowed(amount: u128) -> Self {
        Self {
            asset: Side::B,
            amount,
        }
    }
}

/// One step of an executable plan, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanStep {
    Swap(SwapInstruction),
    Repay(RepayInstruction),
}

/// Planner output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub enum RebalancePlan {
    /// Swap toward the target proportion, no debt change
    SwapOnly { swap: Option<SwapInstruction> },
    /// Swap first, then repay out of the remaining B balance
    SwapRepay {
        swap: Option<SwapInstruction>,
        repay: RepayInstruction,
    },
    /// Repay with the B on hand, swap A into B, repay the rest
    RepaySwapRepay {
        first_repay: RepayInstruction,
        swap: Option<SwapInstruction>,
        second_repay: Option<RepayInstruction>,
    },
}

impl RebalancePlan {
    /// The plan that does nothing
    pub const fn noop() -> Self {
        RebalancePlan::SwapOnly { swap: None }
    }

    pub fn kind(&self) -> PlanKind {
        match self {
            RebalancePlan::SwapOnly { .. } => PlanKind::SwapOnly,
            RebalancePlan::SwapRepay { .. } => PlanKind::SwapRepay,
            RebalancePlan::RepaySwapRepay { .. } => PlanKind::RepaySwapRepay,
        }
    }

    pub fn swap(&self) -> Option<SwapInstruction> {
        match self {
            RebalancePlan::SwapOnly { swap }
            | RebalancePlan::SwapRepay { swap, .. }
            | RebalancePlan::RepaySwapRepay { swap, .. } => *swap,
        }
    }

    /// Planned swap input, 0 when the plan does not swap
    pub fn swap_amount_in(&self) -> u128 {
        self.swap().map(|s| s.amount_in).unwrap_or(0)
    }

    /// Non-empty repay instructions in execution order
    pub fn repays(&self) -> Vec<RepayInstruction> {
        self.steps()
            .into_iter()
            .filter_map(|step| match step {
                PlanStep::Repay(repay) => Some(repay),
                PlanStep::Swap(_) => None,
            })
            .collect()
    }

    /// Total B the plan intends to repay
    pub fn total_repay(&self) -> u128 {
        self.repays().iter().map(|r| r.amount).sum()
    }

    /// Ordered steps: repay legs bracket the swap where the kind requires it.
    /// Zero-amount repays (no B on hand for a first leg) are skipped.
    pub fn steps(&self) -> Vec<PlanStep> {
        let mut steps = Vec::with_capacity(3);
        match self {
            RebalancePlan::SwapOnly { swap } => {
                steps.extend(swap.map(PlanStep::Swap));
            }
            RebalancePlan::SwapRepay { swap, repay } => {
                steps.extend(swap.map(PlanStep::Swap));
                steps.push(PlanStep::Repay(*repay));
            }
            RebalancePlan::RepaySwapRepay {
                first_repay,
                swap,
                second_repay,
            } => {
                steps.push(PlanStep::Repay(*first_repay));
                steps.extend(swap.map(PlanStep::Swap));
                steps.extend(second_repay.map(PlanStep::Repay));
            }
        }
        steps.retain(|step| !matches!(step, PlanStep::Repay(r) if r.amount == 0));
        steps
    }

    pub fn is_noop(&self) -> bool {
        self.steps().is_empty()
    }
}
