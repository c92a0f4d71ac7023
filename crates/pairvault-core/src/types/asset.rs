//! # Asset Identity
//!
//! Assets are identified by an opaque id. Ordering inside a pair is positional:
//! asset A (the accounting unit) is always index 0, never derived from the id.

use std::fmt;

#[cfg(feature = "client")]
use serde::{Deserialize, Serialize};

use crate::constants::{INDEX_A, INDEX_B};

/// Opaque asset identifier (token address, mint, symbol)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize), serde(transparent))]
pub struct AssetId(String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Side of the pair an amount or instruction refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub enum Side {
    /// Accounting asset, pledged as collateral
    A,
    /// Paired asset, borrowed against A
    B,
}

impl Side {
    /// Position of this side in `[u128; 2]` amount arrays
    pub const fn index(self) -> usize {
        match self {
            Side::A => INDEX_A,
            Side::B => INDEX_B,
        }
    }

    pub const fn other(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// The two assets of a pair position, A first
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(Serialize, Deserialize))]
pub struct AssetPair {
    pub asset_a: AssetId,
    pub asset_b: AssetId,
}

impl AssetPair {
    pub fn new(asset_a: impl Into<AssetId>, asset_b: impl Into<AssetId>) -> Self {
        Self {
            asset_a: asset_a.into(),
            asset_b: asset_b.into(),
        }
    }

    pub fn asset(&self, side: Side) -> &AssetId {
        match side {
            Side::A => &self.asset_a,
            Side::B => &self.asset_b,
        }
    }

    /// Side of a given asset, if it belongs to the pair
    pub fn side_of(&self, asset: &AssetId) -> Option<Side> {
        if *asset == self.asset_a {
            Some(Side::A)
        } else if *asset == self.asset_b {
            Some(Side::B)
        } else {
            None
        }
    }

    /// Assets in amount-array order
    pub fn to_vec(&self) -> Vec<AssetId> {
        vec![self.asset_a.clone(), self.asset_b.clone()]
    }
}

impl From<String> for AssetId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
