//! # Position Types
//!
//! A strategy's view of its concentrated pair position.

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

use crate::types::asset::{AssetPair, Side};

/// Tick bounds of a concentrated liquidity position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct TickRange {
    pub lower: i32,
    pub upper: i32,
}

impl TickRange {
    pub fn new(lower: i32, upper: i32) -> Self {
        Self { lower, upper }
    }

    /// Whether `tick` sits inside the range shrunk by `buffer` ticks on both sides.
    /// A buffer wider than half the range degenerates to the midpoint.
    pub fn contains_with_buffer(&self, tick: i32, buffer: i32) -> bool {
        let buffer = buffer.max(0);
        let half_width = self.upper.saturating_sub(self.lower) / 2;
        let buffer = buffer.min(half_width);
        tick >= self.lower.saturating_add(buffer) && tick <= self.upper.saturating_sub(buffer)
    }
}

/// One strategy's holdings in a pair: on-hand balances, pool liquidity and bounds
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct AssetPosition {
    pub pair: AssetPair,
    /// On-hand balances, A first
    pub balances: [u128; 2],
    /// Pool liquidity units held
    pub liquidity: u128,
    /// Current pool bounds
    pub range: TickRange,
}

impl AssetPosition {
    pub fn new(pair: AssetPair, range: TickRange) -> Self {
        Self {
            pair,
            balances: [0, 0],
            liquidity: 0,
            range,
        }
    }

    pub fn balance(&self, side: Side) -> u128 {
        self.balances[side.index()]
    }

    pub fn has_liquidity(&self) -> bool {
        self.liquidity > 0
    }
}
