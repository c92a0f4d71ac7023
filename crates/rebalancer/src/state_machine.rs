//! # Position State Machine
//!
//! ```plain
//!            tick leaves window
//!   ┌─────────┐ ──────────────► ┌────────────────┐
//!   │ InRange │                 │ NeedsRebalance │
//!   └─────────┘ ◄────────────── └────────────────┘
//!        ▲        tick returns          │
//!        │                          begin(Rebalance)
//!        │                              ▼
//!        │   settle(InRange)    ┌─────────────┐
//!        └──────────────────────┤ Rebalancing ├──► NeedsRebalance
//!                               └─────────────┘   (price moved again)
//! ```
//!
//! One operation lock covers every state-changing call on a strategy. A second
//! call while one is in flight, including a call made from inside a collaborator
//! callback, fails immediately with `Locked`. The lock is released and the phase
//! restored when the guard drops, so an aborted operation leaves the phase it
//! found.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use pairvault_core::TickRange;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineResult, RebalancerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PositionPhase {
    InRange = 0,
    NeedsRebalance = 1,
    Rebalancing = 2,
}

impl PositionPhase {
    /// Phase implied by the pool tick against the held range
    pub fn from_tick(range: &TickRange, tick: i32, buffer: i32) -> Self {
        if range.contains_with_buffer(tick, buffer) {
            PositionPhase::InRange
        } else {
            PositionPhase::NeedsRebalance
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => PositionPhase::NeedsRebalance,
            2 => PositionPhase::Rebalancing,
            _ => PositionPhase::InRange,
        }
    }
}

/// Top-level operations serialized by the lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Deposit,
    Withdraw,
    WithdrawAll,
    Rebalance,
    ClaimRewards,
    Hardwork,
    EmergencyExit,
    Reconcile,
    Check,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Deposit => "deposit",
            Operation::Withdraw => "withdraw",
            Operation::WithdrawAll => "withdraw_all",
            Operation::Rebalance => "rebalance",
            Operation::ClaimRewards => "claim_rewards",
            Operation::Hardwork => "hardwork",
            Operation::EmergencyExit => "emergency_exit",
            Operation::Reconcile => "reconcile",
            Operation::Check => "check",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub struct PositionStateMachine {
    strategy_id: String,
    phase: AtomicU8,
    busy: AtomicBool,
}

impl PositionStateMachine {
    pub fn new(strategy_id: impl Into<String>) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            phase: AtomicU8::new(PositionPhase::InRange as u8),
            busy: AtomicBool::new(false),
        }
    }

    pub fn phase(&self) -> PositionPhase {
        PositionPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Classify the pool tick against the held range under the operation lock.
    /// Ignored while an operation is in flight; that operation settles the
    /// phase itself.
    pub fn evaluate(&self, range: &TickRange, tick: i32, buffer: i32) -> PositionPhase {
        match self.begin(Operation::Check) {
            Ok(guard) => {
                let phase = PositionPhase::from_tick(range, tick, buffer);
                guard.settle(phase);
                phase
            }
            Err(_) => self.phase(),
        }
    }

    /// Acquire the operation lock
    pub fn begin(&self, operation: Operation) -> EngineResult<OperationGuard<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(strategy = %self.strategy_id, %operation, "operation rejected, lock held");
            return Err(RebalancerError::Locked(self.strategy_id.clone()));
        }

        let mut guard = OperationGuard {
            machine: self,
            operation,
            restore_phase: self.phase(),
            settled: false,
        };
        if operation == Operation::Rebalance {
            guard.enter_rebalancing();
        }
        Ok(guard)
    }

    fn store(&self, phase: PositionPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }
}

/// Held for the duration of one operation
#[must_use = "dropping the guard releases the operation lock"]
pub struct OperationGuard<'a> {
    machine: &'a PositionStateMachine,
    operation: Operation,
    restore_phase: PositionPhase,
    settled: bool,
}

impl<'a> OperationGuard<'a> {
    pub fn operation(&self) -> Operation {
        self.operation
    }

    /// Move to `Rebalancing` inside an operation that rebalances as a sub-step
    pub fn enter_rebalancing(&mut self) {
        self.machine.store(PositionPhase::Rebalancing);
    }

    /// Commit the final phase and release the lock
    pub fn settle(mut self, phase: PositionPhase) {
        self.machine.store(phase);
        self.settled = true;
    }
}

impl Drop for OperationGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.machine.store(self.restore_phase);
        }
        self.machine.busy.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reentrant_begin_is_locked() {
        let machine = PositionStateMachine::new("s1");
        let guard = machine.begin(Operation::Deposit).unwrap();
        let err = machine.begin(Operation::Rebalance).err().unwrap();
        assert!(err.is_locked());
        drop(guard);
        assert!(machine.begin(Operation::Rebalance).is_ok());
    }

    #[test]
    fn test_aborted_rebalance_restores_phase() {
        let machine = PositionStateMachine::new("s1");
        assert_eq!(machine.evaluate(&TickRange::new(-100, 100), 150, 10), PositionPhase::NeedsRebalance);

        let guard = machine.begin(Operation::Rebalance).unwrap();
        assert_eq!(machine.phase(), PositionPhase::Rebalancing);
        drop(guard);
        assert_eq!(machine.phase(), PositionPhase::NeedsRebalance);
        assert!(!machine.is_busy());
    }

    #[test]
    fn test_settle_commits_phase() {
        let machine = PositionStateMachine::new("s1");
        let guard = machine.begin(Operation::Rebalance).unwrap();

        // Evaluation does not race the in-flight operation
        assert_eq!(machine.evaluate(&TickRange::new(-100, 100), 0, 10), PositionPhase::Rebalancing);

        guard.settle(PositionPhase::InRange);
        assert_eq!(machine.phase(), PositionPhase::InRange);
        assert!(!machine.is_busy());
    }

    #[test]
    fn test_evaluate_holds_the_lock() {
        let machine = PositionStateMachine::new("s1");
        assert_eq!(machine.evaluate(&TickRange::new(-100, 100), 150, 10), PositionPhase::NeedsRebalance);
        assert!(!machine.is_busy());

        // An evaluation in progress keeps operations out
        let guard = machine.begin(Operation::Check).unwrap();
        assert!(machine.begin(Operation::Hardwork).err().unwrap().is_locked());
        guard.settle(PositionPhase::InRange);
        assert_eq!(machine.phase(), PositionPhase::InRange);
    }
}
