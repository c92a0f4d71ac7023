//! # Pairvault Rebalancer
//!
//! Stateful engine driving a leveraged pair position against external
//! collaborators (pool, lending abstraction, swap router, price oracle,
//! custody). Planning and accounting math come from `pairvault-core`; this
//! crate sequences the calls, owns the operation lock and commits state only
//! when an operation completes.
//!
//! ```text
//! trigger ──► state machine ──► ledger + debt ──► planner ──► collaborators ──► ledger
//! ```

pub mod accountant;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod logging;
pub mod snapshot;
pub mod state_machine;
pub mod strategy;

mod execution;

pub use accountant::{withdraw_fraction, HardworkReport, WithdrawReport};
pub use collaborators::{Collaborators, Custody, LendingAdapter, Pool, PoolEntry, PriceOracle, RepayOutcome, SwapRouter};
pub use config::{AssetConfig, EngineConfig};
pub use error::{EngineResult, RebalancerError};
pub use execution::PlanReport;
pub use logging::{init_logging, LoggingConfig};
pub use snapshot::{SnapshotEntry, StrategySnapshot};
pub use state_machine::{Operation, OperationGuard, PositionPhase, PositionStateMachine};
pub use strategy::{needs_deleverage, size_borrow, DepositReport, PairStrategy, RebalanceReport, StrategyState};
