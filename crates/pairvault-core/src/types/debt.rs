//! # Debt Types
//!
//! Snapshot of the lending position backing a pair strategy: B borrowed against
//! A pledged as collateral.

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

use crate::constants::HEALTH_FACTOR_NO_DEBT;
use crate::errors::CoreResult;
use crate::resolver::PairPricing;

/// Debt status for (asset A collateral, asset B borrow)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct DebtStatus {
    /// Asset B owed (native units)
    pub total_debt_amount: u128,
    /// Asset A pledged (native units)
    pub total_collateral_amount: u128,
    /// Collateral value over debt value, 18 decimals
    pub health_factor: u128,
}

impl Default for DebtStatus {
    fn default() -> Self {
        Self {
            total_debt_amount: 0,
            total_collateral_amount: 0,
            health_factor: HEALTH_FACTOR_NO_DEBT,
        }
    }
}

impl DebtStatus {
    /// Build a status from lending totals, pricing the health factor
    pub fn evaluate(debt_b: u128, collateral_a: u128, pricing: &PairPricing) -> CoreResult<Self> {
        let health_factor = if pricing.is_priceable() {
            pricing.health_factor(collateral_a, debt_b)?
        } else if debt_b == 0 {
            HEALTH_FACTOR_NO_DEBT
        } else {
            // Unpriceable: keep the factor unknown rather than claim safety
            0
        };

        Ok(Self {
            total_debt_amount: debt_b,
            total_collateral_amount: collateral_a,
            health_factor,
        })
    }

    pub fn has_debt(&self) -> bool {
        self.total_debt_amount > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::WAD;

    #[test]
    fn test_evaluate() {
        let pricing = PairPricing::new([WAD, WAD], [6, 6]);
        let status = DebtStatus::evaluate(100_000_000, 160_000_000, &pricing).unwrap();
        assert_eq!(status.health_factor, 16 * WAD / 10);
        assert!(status.has_debt());

        let empty = DebtStatus::evaluate(0, 0, &pricing).unwrap();
        assert_eq!(empty, DebtStatus::default());

        let unpriced = DebtStatus::evaluate(1, 1, &PairPricing::new([0, WAD], [6, 6])).unwrap();
        assert_eq!(unpriced.health_factor, 0);
    }
}
