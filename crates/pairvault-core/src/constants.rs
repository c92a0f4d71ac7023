//! # Protocol Constants
//!
//! Fixed-point scales and bounds shared by the planner, resolver and ledger.

// ============================================================================
// Fixed-Point Constants
// ============================================================================

/// 18-decimal fixed-point one (prices, proportions, normalized amounts)
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Number of decimals every amount is normalized to
pub const NORMALIZED_DECIMALS: u8 = 18;

/// Largest token decimal scale accepted by the resolver
pub const MAX_ASSET_DECIMALS: u8 = 36;

/// Proportion meaning "everything in asset B"
pub const PROPORTION_ALL_B: u128 = WAD;

/// Proportion meaning "everything in asset A"
pub const PROPORTION_ALL_A: u128 = 0;

/// Health factor reported when there is no debt
pub const HEALTH_FACTOR_NO_DEBT: u128 = u128::MAX;

// ============================================================================
// Asset Ordering
// ============================================================================

/// Index of the accounting asset in every amount array
pub const INDEX_A: usize = 0;

/// Index of the paired/borrowed asset in every amount array
pub const INDEX_B: usize = 1;
