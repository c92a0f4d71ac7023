//! Persisted strategy state: base amounts and the last debt status, keyed by
//! `(strategy_id, asset)`.

use std::fs;
use std::path::Path;

use pairvault_core::{AssetId, AssetPair, AssetPosition, BaseAmountLedger, DebtStatus, TickRange};
use serde::{Deserialize, Serialize};

use crate::error::EngineResult;
use crate::strategy::StrategyState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    pub asset: AssetId,
    pub base_amount: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySnapshot {
    pub strategy_id: String,
    pub entries: Vec<SnapshotEntry>,
    pub debt: DebtStatus,
    /// Pool liquidity units and bounds held when captured
    #[serde(default)]
    pub liquidity: u128,
    #[serde(default)]
    pub range: TickRange,
}

impl StrategySnapshot {
    pub fn capture(strategy_id: &str, state: &StrategyState) -> Self {
        Self {
            strategy_id: strategy_id.to_string(),
            entries: state
                .ledger
                .entries()
                .map(|(asset, base_amount)| SnapshotEntry {
                    asset: asset.clone(),
                    base_amount,
                })
                .collect(),
            debt: state.debt,
            liquidity: state.position.liquidity,
            range: state.position.range,
        }
    }

    /// Base amount recorded for `(self.strategy_id, asset)`
    pub fn base_amount(&self, asset: &AssetId) -> u128 {
        self.entries
            .iter()
            .find(|entry| entry.asset == *asset)
            .map(|entry| entry.base_amount)
            .unwrap_or(0)
    }

    pub(crate) fn into_state(self, pair: AssetPair) -> StrategyState {
        let mut position = AssetPosition::new(pair, self.range);
        position.liquidity = self.liquidity;
        StrategyState {
            position,
            debt: self.debt,
            ledger: BaseAmountLedger::from_entries(
                self.entries.into_iter().map(|entry| (entry.asset, entry.base_amount)),
            ),
        }
    }

    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(content: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> EngineResult<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
