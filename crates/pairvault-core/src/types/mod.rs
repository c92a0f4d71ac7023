//! # Core Type Definitions
//!
//! Position, debt and plan types shared by the planner, ledger and rebalancer.

pub mod asset;
pub mod debt;
pub mod plan;
pub mod position;

// Re-export all types
pub use asset::*;
pub use debt::*;
pub use plan::*;
pub use position::*;
