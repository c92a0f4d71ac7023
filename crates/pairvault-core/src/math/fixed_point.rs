//! # Fixed-Point Arithmetic
//!
//! 18-decimal (WAD) operations. Every product goes through a 256-bit
//! intermediate so `a * b / c` is exact before the final rounding step, and the
//! rounding direction is always chosen explicitly by the caller.

use ethnum::U256;

use crate::constants::{MAX_ASSET_DECIMALS, WAD};
use crate::errors::{CoreResult, PairCoreError};

/// Rounding mode for division operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "client", derive(serde::Serialize, serde::Deserialize))]
pub enum Rounding {
    /// Round down (towards zero)
    Down,
    /// Round up (away from zero)
    Up,
}

/// Narrow a 256-bit value back to u128
fn to_u128(value: U256) -> CoreResult<u128> {
    let (hi, lo) = value.into_words();
    if hi != 0 {
        return Err(PairCoreError::MathOverflow);
    }
    Ok(lo)
}

/// Multiply two values and divide by a third with specified rounding
/// result = (a * b) / denominator
pub fn mul_div(a: u128, b: u128, denominator: u128, rounding: Rounding) -> CoreResult<u128> {
    if denominator == 0 {
        return Err(PairCoreError::DivisionByZero);
    }

    // Two u128 factors never overflow 256 bits
    let product = U256::new(a) * U256::new(b);
    let denominator = U256::new(denominator);

    let mut quotient = product / denominator;
    if rounding == Rounding::Up && product % denominator != U256::ZERO {
        quotient += U256::ONE;
    }

    to_u128(quotient)
}

/// Multiply two WAD values
pub fn wad_mul(a: u128, b: u128, rounding: Rounding) -> CoreResult<u128> {
    mul_div(a, b, WAD, rounding)
}

/// Divide two WAD values
pub fn wad_div(a: u128, b: u128, rounding: Rounding) -> CoreResult<u128> {
    mul_div(a, WAD, b, rounding)
}

/// 10^decimals as u128
pub fn pow10(decimals: u8) -> CoreResult<u128> {
    if decimals > MAX_ASSET_DECIMALS {
        return Err(PairCoreError::InvalidDecimals(decimals, MAX_ASSET_DECIMALS));
    }
    10u128
        .checked_pow(decimals as u32)
        .ok_or(PairCoreError::MathOverflow)
}

/// Complement of a WAD proportion (1e18 - p)
pub fn wad_complement(proportion: u128) -> CoreResult<u128> {
    WAD.checked_sub(proportion)
        .ok_or(PairCoreError::InvalidProportion(proportion))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_rounding() {
        // 30 / 4 = 7.5
        assert_eq!(mul_div(10, 3, 4, Rounding::Down).unwrap(), 7);
        assert_eq!(mul_div(10, 3, 4, Rounding::Up).unwrap(), 8);

        // Exact division never rounds
        assert_eq!(mul_div(10, 4, 5, Rounding::Up).unwrap(), 8);
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // The product exceeds u128 but the quotient fits
        let a = u128::MAX / 2;
        assert_eq!(mul_div(a, WAD, WAD, Rounding::Down).unwrap(), a);
        assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX, Rounding::Up).unwrap(), u128::MAX);
    }

    #[test]
    fn test_mul_div_errors() {
        assert_eq!(mul_div(1, 1, 0, Rounding::Down), Err(PairCoreError::DivisionByZero));
        assert_eq!(mul_div(u128::MAX, 2, 1, Rounding::Down), Err(PairCoreError::MathOverflow));
    }

    #[test]
    fn test_wad_helpers() {
        assert_eq!(wad_mul(2 * WAD, WAD / 2, Rounding::Down).unwrap(), WAD);
        assert_eq!(wad_div(WAD, 4 * WAD, Rounding::Down).unwrap(), WAD / 4);
        assert_eq!(wad_div(WAD, 3 * WAD, Rounding::Up).unwrap(), WAD / 3 + 1);
        assert_eq!(pow10(6).unwrap(), 1_000_000);
        assert!(pow10(37).is_err());
        assert_eq!(wad_complement(WAD / 4).unwrap(), 3 * WAD / 4);
        assert!(wad_complement(WAD + 1).is_err());
    }
}
