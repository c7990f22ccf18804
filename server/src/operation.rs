//! The unit of deferred world-mutating work.
//!
//! An [`Operation`] is constructed without side effects, handed to the
//! [`Scheduler`](crate::scheduler::Scheduler), and later executed exactly once
//! per dequeue by the single dispatch loop in [`Game`](crate::game::Game).
//!
//! Lifecycle per instance:
//!
//! ```text
//! Pending --cancel--> Cancelled
//! Pending --dequeue--> Executing --> Completed
//!                                \-> Rescheduled --> Pending (same handle)
//! ```
//!
//! Periodic behaviour (auto-attack, spawn waves, AI) is expressed by returning
//! a non-zero [`Operation::repeat_after`] after executing, never by looping
//! inside `execute`.

use crate::context::OperationContext;
use crate::exhaustion::ExhaustionInfo;
use crate::world::WorldError;
use shared::{CreatureId, OperationKind};
use std::time::Duration;
use thiserror::Error;

/// What an execution achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The world changed; declared exhaustion costs are applied.
    Completed,
    /// A precondition no longer held (target gone, tile blocked). No cost.
    Skipped,
}

#[derive(Debug, Error)]
pub enum OperationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error(transparent)]
    World(#[from] WorldError),
    #[error("operation fault: {0}")]
    Fault(String),
}

pub trait Operation: Send {
    fn kind(&self) -> OperationKind;

    /// Actor on whose behalf the operation runs; `SYSTEM_ID` for server work.
    fn requestor(&self) -> CreatureId;

    /// Categories the operation requires (read before execution) and the cost
    /// it imposes (read again after a `Completed` execution, so operations may
    /// settle their cost while executing).
    fn exhaustion_info(&self) -> ExhaustionInfo {
        ExhaustionInfo::none()
    }

    fn execute(&mut self, ctx: &mut OperationContext<'_>) -> Result<Outcome, OperationError>;

    /// When set to a non-zero duration after `execute` returns, the operation
    /// is re-enqueued at `now + repeat_after` under the same handle.
    fn repeat_after(&self) -> Option<Duration> {
        None
    }

    fn describe(&self) -> String {
        format!("{} for creature {}", self.kind(), self.requestor())
    }
}
