//! # Snapshots
//!
//! Read-only copies of the core's state for reporters.

use std::collections::BTreeMap;

use crate::sync::{GateHolder, QueueStats};
use crate::task::{TaskId, TaskRole, TaskState, TaskStatus};

/// Point-in-time copy of the core, taken under the monitor lock.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Readers inside the critical section.
    pub active_readers: usize,
    /// Readers in the entry protocol.
    pub waiting_readers: usize,
    /// Writers in the entry protocol.
    pub waiting_writers: usize,
    /// Who holds the resource gate.
    pub gate: GateHolder,
    /// Completed reader critical sections.
    pub reader_sessions: u64,
    /// Completed writer critical sections.
    pub writer_sessions: u64,
    /// Free -> held transitions of the gate.
    pub gate_acquisitions: u64,
    /// Held -> free transitions of the gate.
    pub gate_releases: u64,
    /// Fairness queue counters.
    pub queue: QueueStats,
    /// Per-task state, ordered by id.
    pub tasks: BTreeMap<TaskId, TaskStatus>,
}

impl Snapshot {
    /// Whether a writer is inside the critical section.
    #[inline]
    #[must_use]
    pub fn writer_active(&self) -> bool {
        self.gate == GateHolder::Writer
    }

    /// Tasks currently in `state`.
    pub fn tasks_in(&self, state: TaskState) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks
            .iter()
            .filter(move |(_, status)| status.state == state)
            .map(|(id, _)| *id)
    }

    /// Number of registered tasks with `role`.
    #[must_use]
    pub fn count_role(&self, role: TaskRole) -> usize {
        self.tasks.values().filter(|status| status.role == role).count()
    }

    /// State of one task, if registered.
    #[must_use]
    pub fn state_of(&self, task: TaskId) -> Option<TaskState> {
        self.tasks.get(&task).map(|status| status.state)
    }
}
