//! # Base-Amount Ledger
//!
//! Per-asset record of the funds a strategy owns, independent of what its
//! wallet happens to hold between the sub-steps of one operation (borrowed but
//! not yet deployed, received but not yet repaid).
//!
//! After every complete operation `base_amount(asset) == wallet balance`. The
//! ledger never rewrites itself to match the wallet: divergence is reported by
//! [`BaseAmountLedger::reconcile`] and left for an operator to investigate.
//!
//! Entries are created on first receipt and are never removed.

use std::collections::BTreeMap;

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

use crate::errors::{CoreResult, PairCoreError};
use crate::math::safe_math::{abs_diff_u128, safe_add_u128, signed_delta};
use crate::types::asset::AssetId;

/// Base amounts of one strategy instance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct BaseAmountLedger {
    entries: BTreeMap<AssetId, u128>,
}

/// One asset whose wallet balance diverged from its base amount
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct DriftEntry {
    pub asset: AssetId,
    pub base_amount: u128,
    pub wallet_balance: u128,
}

impl DriftEntry {
    /// `wallet - base`, saturated to the i128 range
    pub fn drift(&self) -> i128 {
        signed_delta(self.base_amount, self.wallet_balance).unwrap_or(if self.wallet_balance > self.base_amount {
            i128::MAX
        } else {
            i128::MIN
        })
    }
}

/// Result of comparing the ledger against wallet balances
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct DriftReport {
    /// Assets whose divergence exceeds their threshold
    pub entries: Vec<DriftEntry>,
}

impl DriftReport {
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }
}

impl BaseAmountLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a ledger from persisted entries
    pub fn from_entries(entries: impl IntoIterator<Item = (AssetId, u128)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    pub fn base_amount(&self, asset: &AssetId) -> u128 {
        self.entries.get(asset).copied().unwrap_or(0)
    }

    /// Entries in asset order
    pub fn entries(&self) -> impl Iterator<Item = (&AssetId, u128)> {
        self.entries.iter().map(|(asset, amount)| (asset, *amount))
    }

    /// Funds handed to the strategy by its vault
    pub fn record_receipt(&mut self, asset: &AssetId, amount: u128) -> CoreResult<()> {
        self.apply(asset, amount, 0)
    }

    /// Funds handed back to the vault
    pub fn record_payout(&mut self, asset: &AssetId, amount: u128) -> CoreResult<()> {
        self.apply(asset, 0, amount)
    }

    /// Deposit into the pool, borrowing the non-accounting assets against
    /// `collateral_spent` of the accounting asset.
    ///
    /// Every asset: `base += borrowed[i] - consumed[i]`; the accounting asset
    /// additionally `base -= collateral_spent`.
    pub fn record_deposit(
        &mut self,
        assets: &[AssetId],
        assets_consumed: &[u128],
        amounts_borrowed: &[u128],
        collateral_spent: u128,
        accounting_index: usize,
    ) -> CoreResult<()> {
        check_shape(assets, &[assets_consumed, amounts_borrowed], accounting_index)?;

        let mut staged = self.clone();
        for (i, asset) in assets.iter().enumerate() {
            let mut decrement = assets_consumed[i];
            if i == accounting_index {
                decrement = safe_add_u128(decrement, collateral_spent)?;
            }
            staged.apply(asset, amounts_borrowed[i], decrement)?;
        }

        *self = staged;
        Ok(())
    }

    /// Withdrawal from the pool and/or repayment of debt.
    ///
    /// Non-accounting assets: `base += withdrawn[i] - repaid[i]`. The accounting
    /// asset receives `collateral_received_plus_withdrawn` (pool output plus the
    /// collateral released by the repay) less anything repaid in it.
    pub fn record_withdraw(
        &mut self,
        assets: &[AssetId],
        withdrawn_amounts: &[u128],
        repaid_amounts: &[u128],
        accounting_index: usize,
        collateral_received_plus_withdrawn: u128,
    ) -> CoreResult<()> {
        check_shape(assets, &[withdrawn_amounts, repaid_amounts], accounting_index)?;

        let mut staged = self.clone();
        for (i, asset) in assets.iter().enumerate() {
            let increment = if i == accounting_index {
                collateral_received_plus_withdrawn
            } else {
                withdrawn_amounts[i]
            };
            staged.apply(asset, increment, repaid_amounts[i])?;
        }

        *self = staged;
        Ok(())
    }

    /// Swap of `amount_in` of one asset for `amount_out` of another (observed amounts)
    pub fn record_swap(
        &mut self,
        asset_in: &AssetId,
        amount_in: u128,
        asset_out: &AssetId,
        amount_out: u128,
    ) -> CoreResult<()> {
        let mut staged = self.clone();
        staged.apply(asset_in, 0, amount_in)?;
        staged.apply(asset_out, amount_out, 0)?;
        *self = staged;
        Ok(())
    }

    /// Rewards claimed from the pool and the lending abstraction.
    ///
    /// Both sources are added to the base amounts. The returned list merges
    /// duplicate assets by summation and drops zero amounts; it drives the
    /// compounding/forwarding decision.
    pub fn record_rewards_claim(
        &mut self,
        claimed_by_pool: &[(AssetId, u128)],
        claimed_by_lending: &[(AssetId, u128)],
    ) -> CoreResult<Vec<(AssetId, u128)>> {
        let mut merged: Vec<(AssetId, u128)> = Vec::new();
        for (asset, amount) in claimed_by_pool.iter().chain(claimed_by_lending) {
            if *amount == 0 {
                continue;
            }
            match merged.iter_mut().find(|(known, _)| known == asset) {
                Some((_, total)) => *total = safe_add_u128(*total, *amount)?,
                None => merged.push((asset.clone(), *amount)),
            }
        }

        let mut staged = self.clone();
        for (asset, amount) in &merged {
            staged.apply(asset, *amount, 0)?;
        }

        *self = staged;
        Ok(merged)
    }

    /// Compare against wallet balances. Assets missing on either side count as
    /// zero. Only divergences strictly above `threshold_for(asset)` are reported.
    pub fn reconcile(
        &self,
        wallet: &BTreeMap<AssetId, u128>,
        threshold_for: impl Fn(&AssetId) -> u128,
    ) -> DriftReport {
        let mut assets: Vec<&AssetId> = self.entries.keys().collect();
        assets.extend(wallet.keys().filter(|asset| !self.entries.contains_key(*asset)));

        let entries = assets
            .into_iter()
            .filter_map(|asset| {
                let base_amount = self.base_amount(asset);
                let wallet_balance = wallet.get(asset).copied().unwrap_or(0);
                (abs_diff_u128(base_amount, wallet_balance) > threshold_for(asset)).then(|| DriftEntry {
                    asset: asset.clone(),
                    base_amount,
                    wallet_balance,
                })
            })
            .collect();

        DriftReport { entries }
    }

    fn apply(&mut self, asset: &AssetId, increment: u128, decrement: u128) -> CoreResult<()> {
        let base = self.base_amount(asset);
        let raised = safe_add_u128(base, increment)?;
        let updated = raised
            .checked_sub(decrement)
            .ok_or_else(|| PairCoreError::ledger_underflow(asset.as_str(), raised, decrement))?;
        self.entries.insert(asset.clone(), updated);
        Ok(())
    }
}

fn check_shape(assets: &[AssetId], amounts: &[&[u128]], accounting_index: usize) -> CoreResult<()> {
    for list in amounts {
        if list.len() != assets.len() {
            return Err(PairCoreError::asset_count_mismatch(assets.len(), list.len()));
        }
    }
    if accounting_index >= assets.len() {
        return Err(PairCoreError::InvalidAccountingIndex(accounting_index));
    }
    Ok(())
}
