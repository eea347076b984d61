//! # Core Observer
//!
//! Passive hook for displays and event logs. Events are delivered from the
//! thread that caused them, while the monitor lock is still held, so the
//! observed sequence matches the order of the state changes.

use crate::task::{TaskId, TaskRole};

/// Something that happened inside the core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CoreEvent {
    /// A task took its place in the fairness queue.
    Arrived {
        /// The task.
        task: TaskId,
        /// Its role.
        role: TaskRole,
        /// Ticket number (arrival order).
        ticket: u64,
    },
    /// A task entered the critical section.
    Admitted {
        /// The task.
        task: TaskId,
        /// Its role.
        role: TaskRole,
        /// Readers inside right after admission (0 for writers).
        active_readers: usize,
    },
    /// The first reader of a group took the gate, locking writers out.
    GateLockedByReaders {
        /// The first reader.
        task: TaskId,
    },
    /// The last reader of a group freed the gate for writers.
    GateReleasedByReaders {
        /// The last reader.
        task: TaskId,
    },
    /// A task left the critical section.
    Departed {
        /// The task.
        task: TaskId,
        /// Its role.
        role: TaskRole,
        /// Readers still inside (0 for writers).
        active_readers: usize,
    },
}

impl CoreEvent {
    /// The task the event is about.
    #[must_use]
    pub const fn task(&self) -> TaskId {
        match *self {
            Self::Arrived { task, .. }
            | Self::Admitted { task, .. }
            | Self::GateLockedByReaders { task }
            | Self::GateReleasedByReaders { task }
            | Self::Departed { task, .. } => task,
        }
    }
}

/// Receives [`CoreEvent`]s.
///
/// Called with the core's admission mutex held: implementations must
/// return quickly and must not call back into the core, not even
/// [`snapshot`](crate::SynchronizationCore::snapshot).
pub trait CoreObserver: Send + Sync {
    /// Called once per event.
    fn on_event(&self, event: CoreEvent);
}

impl<F> CoreObserver for F
where
    F: Fn(CoreEvent) + Send + Sync,
{
    fn on_event(&self, event: CoreEvent) {
        self(event);
    }
}
