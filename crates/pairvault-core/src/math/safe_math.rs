//! # Safe Math Operations
//!
//! Overflow-checked arithmetic on the integer widths the ledger and planner use.

use crate::errors::{CoreResult, PairCoreError};

/// Macro to generate safe arithmetic functions
macro_rules! safe_arith {
    // Binary operations with checked methods
    ($fn_name:ident, $type:ty, $checked_method:ident, $error:expr) => {
        /// Checked binary operation returning a core error on overflow/underflow
        pub fn $fn_name(a: $type, b: $type) -> CoreResult<$type> {
            a.$checked_method(b).ok_or($error)
        }
    };

    // Simple cast with only max check
    (cast_max, $fn_name:ident, $from_type:ty, $to_type:ty, $max_val:expr) => {
        /// Safe narrowing cast
        pub fn $fn_name(value: $from_type) -> CoreResult<$to_type> {
            if value > $max_val {
                return Err(PairCoreError::ConversionError);
            }
            Ok(value as $to_type)
        }
    };
}

safe_arith!(safe_add_u128, u128, checked_add, PairCoreError::MathOverflow);
safe_arith!(safe_sub_u128, u128, checked_sub, PairCoreError::MathUnderflow);

safe_arith!(safe_sub_i128, i128, checked_sub, PairCoreError::MathUnderflow);

safe_arith!(cast_max, safe_cast_u128_to_i128, u128, i128, i128::MAX as u128);

/// Signed difference `after - before` of two balances
pub fn signed_delta(before: u128, after: u128) -> CoreResult<i128> {
    let before = safe_cast_u128_to_i128(before)?;
    let after = safe_cast_u128_to_i128(after)?;
    safe_sub_i128(after, before)
}

/// Absolute difference of two amounts
pub fn abs_diff_u128(a: u128, b: u128) -> u128 {
    if a >= b {
        a - b
    } else {
        b - a
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_ops() {
        assert_eq!(safe_add_u128(1, 2).unwrap(), 3);
        assert_eq!(safe_sub_u128(1, 2), Err(PairCoreError::MathUnderflow));
        assert_eq!(safe_add_u128(u128::MAX, 1), Err(PairCoreError::MathOverflow));
        assert_eq!(safe_sub_i128(i128::MIN, 1), Err(PairCoreError::MathUnderflow));
    }

    #[test]
    fn test_signed_deltas() {
        assert_eq!(signed_delta(10, 4).unwrap(), -6);
        assert_eq!(signed_delta(4, 10).unwrap(), 6);
        assert_eq!(signed_delta(0, u128::MAX), Err(PairCoreError::ConversionError));
    }
}
