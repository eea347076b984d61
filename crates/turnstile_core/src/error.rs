//! # Contract Violations
//!
//! The core has no recoverable errors: every operation either completes or
//! blocks. What remains are callers breaking the enter/exit contract. Each
//! one would desynchronize the counters if it were absorbed, so the
//! protocol operations treat them as fatal.

use thiserror::Error;

use crate::task::{TaskId, TaskRole, TaskState};

/// A broken enter/exit contract.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Exit called without a matching prior enter.
    #[error("double release: {role} task {task} left without entering")]
    DoubleRelease {
        /// The offending task.
        task: TaskId,
        /// The side of the protocol that was released.
        role: TaskRole,
    },

    /// The active reader count would drop below zero.
    #[error("negative reader count: exit_read with no active readers")]
    NegativeCount,

    /// The task id was never registered (or was deregistered).
    #[error("unknown task: {0}")]
    UnknownTask(TaskId),

    /// A reader used the writer protocol or the other way round.
    #[error("role mismatch: task {task} is a {actual}, called the {expected} protocol")]
    RoleMismatch {
        /// The offending task.
        task: TaskId,
        /// Role the called operation belongs to.
        expected: TaskRole,
        /// Role the task registered with.
        actual: TaskRole,
    },

    /// Enter called while the task is already waiting or inside.
    #[error("reentrant enter: task {task} is already {state}")]
    Reentrant {
        /// The offending task.
        task: TaskId,
        /// State the task was in.
        state: TaskState,
    },

    /// Deregistration of a task that is not idle.
    #[error("task {0} is busy and cannot be deregistered")]
    TaskBusy(TaskId),
}

/// Result type for core operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_task() {
        let err = SyncError::DoubleRelease {
            task: TaskId::from_raw(7),
            role: TaskRole::Writer,
        };
        assert_eq!(
            err.to_string(),
            "double release: writer task #7 left without entering"
        );

        let err = SyncError::Reentrant {
            task: TaskId::from_raw(3),
            state: TaskState::Active,
        };
        assert_eq!(err.to_string(), "reentrant enter: task #3 is already active");
    }
}
