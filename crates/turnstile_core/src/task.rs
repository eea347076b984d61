//! # Task Identity and State
//!
//! Per-task bookkeeping. Purely observational: nothing in here is consulted
//! by the admission logic except to validate the enter/exit contract.

use std::fmt;

/// Identifier handed out by [`SynchronizationCore::register`].
///
/// [`SynchronizationCore::register`]: crate::SynchronizationCore::register
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    /// Wraps a raw id. Ids not obtained from `register` are rejected by the core.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which side of the protocol a task uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskRole {
    /// Shared access.
    Reader,
    /// Exclusive access.
    Writer,
}

impl fmt::Display for TaskRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reader => "reader",
            Self::Writer => "writer",
        })
    }
}

/// Lifecycle of a task: `Idle -> Waiting -> Active -> Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Not interested in the resource.
    #[default]
    Idle,
    /// Inside an entry protocol, not yet admitted.
    Waiting,
    /// Inside the critical section.
    Active,
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Waiting => "waiting",
            Self::Active => "active",
        })
    }
}

/// Everything the core tracks about one task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskStatus {
    /// Registered role.
    pub role: TaskRole,
    /// Current state.
    pub state: TaskState,
    /// Completed critical sections.
    pub sessions: u64,
}

impl TaskStatus {
    pub(crate) const fn new(role: TaskRole) -> Self {
        Self {
            role,
            state: TaskState::Idle,
            sessions: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_id_ordering() {
        let a = TaskId::from_raw(1);
        let b = TaskId::from_raw(2);
        assert!(a < b);
        assert_eq!(b.raw(), 2);
        assert_eq!(a.to_string(), "#1");
    }

    #[test]
    fn test_new_status_is_idle() {
        let status = TaskStatus::new(TaskRole::Reader);
        assert_eq!(status.state, TaskState::Idle);
        assert_eq!(status.sessions, 0);
    }
}
