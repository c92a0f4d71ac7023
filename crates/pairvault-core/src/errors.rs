//! # Core Error Types
//!
//! Errors raised by the pure layer. The planner itself never errors on adverse
//! market input (it degrades to a smaller plan); these cover arithmetic faults,
//! malformed parameters and ledger misuse.

use thiserror::Error;

/// Core errors shared by math, resolver and ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub enum PairCoreError {
    // ========================================================================
    // Math Errors
    // ========================================================================
    #[error("Math overflow")]
    MathOverflow,

    #[error("Math underflow")]
    MathUnderflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Conversion error")]
    ConversionError,

    // ========================================================================
    // Validation Errors
    // ========================================================================
    #[error("Invalid decimals: {0} (max {1})")]
    InvalidDecimals(u8, u8),

    #[error("Invalid proportion: {0} exceeds 1e18")]
    InvalidProportion(u128),

    #[error("Asset count mismatch: expected {expected}, got {actual}")]
    AssetCountMismatch { expected: usize, actual: usize },

    #[error("Accounting index {0} out of range")]
    InvalidAccountingIndex(usize),

    // ========================================================================
    // Ledger Errors
    // ========================================================================
    #[error("Ledger underflow for {asset}: base {base}, decrement {decrement}")]
    LedgerUnderflow {
        asset: String,
        base: u128,
        decrement: u128,
    },
}

/// Result type using core errors
pub type CoreResult<T> = Result<T, PairCoreError>;

// Helper functions for creating specific errors
impl PairCoreError {
    /// Create an asset count mismatch error
    pub fn asset_count_mismatch(expected: usize, actual: usize) -> Self {
        Self::AssetCountMismatch { expected, actual }
    }

    /// Create a ledger underflow error
    pub fn ledger_underflow(asset: &str, base: u128, decrement: u128) -> Self {
        Self::LedgerUnderflow {
            asset: asset.to_string(),
            base,
            decrement,
        }
    }
}
