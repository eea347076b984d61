//! # Resource Gate
//!
//! The exclusive lock on the resource itself. Held by one writer, or by
//! the reader group as a whole: the first reader in acquires it on the
//! group's behalf and the last reader out releases it.
//!
//! Like the counter this is pure state. Blocking until the gate is free is
//! done by the monitor's condvar, never in here.

use std::fmt;

use crate::task::TaskRole;

/// Who holds the gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum GateHolder {
    /// Nobody.
    #[default]
    Free,
    /// The current group of active readers.
    Readers,
    /// Exactly one writer.
    Writer,
}

impl GateHolder {
    const fn for_role(role: TaskRole) -> Self {
        match role {
            TaskRole::Reader => Self::Readers,
            TaskRole::Writer => Self::Writer,
        }
    }
}

impl fmt::Display for GateHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Free => "free",
            Self::Readers => "readers",
            Self::Writer => "writer",
        })
    }
}

/// Binary exclusive gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceGate {
    holder: GateHolder,
    acquisitions: u64,
    releases: u64,
}

impl ResourceGate {
    /// Creates a free gate.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            holder: GateHolder::Free,
            acquisitions: 0,
            releases: 0,
        }
    }

    /// Current holder.
    #[inline]
    #[must_use]
    pub const fn holder(&self) -> GateHolder {
        self.holder
    }

    /// Whether nobody holds the gate.
    #[inline]
    #[must_use]
    pub fn is_free(&self) -> bool {
        self.holder == GateHolder::Free
    }

    /// Number of free -> held transitions so far.
    #[inline]
    #[must_use]
    pub const fn acquisitions(&self) -> u64 {
        self.acquisitions
    }

    /// Number of held -> free transitions so far.
    #[inline]
    #[must_use]
    pub const fn releases(&self) -> u64 {
        self.releases
    }

    /// Takes the gate for a writer or for the reader group.
    ///
    /// # Panics
    ///
    /// Panics if the gate is not free. The monitor only calls this after
    /// waiting for [`is_free`](Self::is_free), so a panic here is a bug in
    /// the monitor, not in a caller.
    pub fn acquire(&mut self, role: TaskRole) {
        assert!(
            self.is_free(),
            "Gate acquired while held by {}!",
            self.holder
        );
        self.holder = GateHolder::for_role(role);
        self.acquisitions += 1;
    }

    /// Frees the gate if `role` holds it.
    ///
    /// Returns `false`, leaving the gate untouched, when `role` is not the
    /// holder.
    #[must_use]
    pub fn release(&mut self, role: TaskRole) -> bool {
        if self.holder != GateHolder::for_role(role) {
            return false;
        }
        self.holder = GateHolder::Free;
        self.releases += 1;
        true
    }
}
