//! # Mathematical Functions
//!
//! Overflow-checked integer arithmetic and 18-decimal fixed-point helpers.

pub mod fixed_point;
pub mod safe_math;

// Re-export commonly used functions
pub use fixed_point::*;
pub use safe_math::*;
