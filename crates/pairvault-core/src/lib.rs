//! # Pairvault Core
//!
//! Pure, stateless logic behind leveraged pair-position strategies:
//!
//! - Fixed-point helpers for 18-decimal values with explicit rounding
//! - Price and proportion resolution across assets with different decimals
//! - The iteration planner that turns balances and debt into swap/repay plans
//! - The base-amount ledger separating owned funds from transient balances
//!
//! Nothing in this crate performs I/O. Collaborators (pool, lending, router,
//! oracle) live in the rebalancer crate.
//!
//! ## Feature Flags
//!
//! - `client`: Enables serde derives for persisted and configured types

pub mod constants;
pub mod errors;
pub mod ledger;
pub mod math;
pub mod planner;
pub mod resolver;
pub mod types;

// Re-export commonly used items
pub use constants::*;
pub use errors::{CoreResult, PairCoreError};
pub use ledger::{BaseAmountLedger, DriftEntry, DriftReport};
pub use math::fixed_point::Rounding;
pub use planner::IterationPlanner;
pub use resolver::PairPricing;
pub use types::*;
