//! # Access Counter
//!
//! Reader and waiting-task counts. Pure state: it never blocks and owns no
//! lock of its own. The monitor keeps it behind the same mutex as the
//! [`ResourceGate`](super::ResourceGate), so "first reader" and "last
//! reader" are plain checks on this struct.

use crate::error::{SyncError, SyncResult};
use crate::task::TaskRole;

/// Counts of readers inside the resource and tasks queued for it.
///
/// `waiting_readers` / `waiting_writers` are advisory: they feed snapshots
/// and are never consulted by admission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccessCounter {
    active_readers: usize,
    waiting_readers: usize,
    waiting_writers: usize,
}

impl AccessCounter {
    /// Creates a counter with everything at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            active_readers: 0,
            waiting_readers: 0,
            waiting_writers: 0,
        }
    }

    /// Readers currently inside the critical section.
    #[inline]
    #[must_use]
    pub const fn active_readers(&self) -> usize {
        self.active_readers
    }

    /// Readers inside the entry protocol.
    #[inline]
    #[must_use]
    pub const fn waiting_readers(&self) -> usize {
        self.waiting_readers
    }

    /// Writers inside the entry protocol.
    #[inline]
    #[must_use]
    pub const fn waiting_writers(&self) -> usize {
        self.waiting_writers
    }

    /// Records a task starting its entry protocol.
    pub fn arrive(&mut self, role: TaskRole) {
        match role {
            TaskRole::Reader => self.waiting_readers += 1,
            TaskRole::Writer => self.waiting_writers += 1,
        }
    }

    /// Moves one reader from waiting to active and returns the new count.
    ///
    /// The caller must already hold the gate for readers when the count
    /// was zero.
    pub fn admit_reader(&mut self) -> usize {
        self.waiting_readers = self.waiting_readers.saturating_sub(1);
        self.active_readers += 1;
        self.active_readers
    }

    /// Removes one writer from the waiting count.
    pub fn admit_writer(&mut self) {
        self.waiting_writers = self.waiting_writers.saturating_sub(1);
    }

    /// Removes one active reader and returns the new count.
    ///
    /// A return of zero means the caller was the last reader out and must
    /// release the gate.
    ///
    /// # Errors
    ///
    /// [`SyncError::NegativeCount`] if no reader is active. The counter is
    /// left unchanged.
    pub fn depart_reader(&mut self) -> SyncResult<usize> {
        self.active_readers = self
            .active_readers
            .checked_sub(1)
            .ok_or(SyncError::NegativeCount)?;
        Ok(self.active_readers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_and_last_reader() {
        let mut counter = AccessCounter::new();
        counter.arrive(TaskRole::Reader);
        counter.arrive(TaskRole::Reader);
        assert_eq!(counter.waiting_readers(), 2);

        assert_eq!(counter.admit_reader(), 1);
        assert_eq!(counter.admit_reader(), 2);
        assert_eq!(counter.waiting_readers(), 0);

        assert_eq!(counter.depart_reader(), Ok(1));
        assert_eq!(counter.depart_reader(), Ok(0));
    }

    #[test]
    fn test_negative_count_is_rejected() {
        let mut counter = AccessCounter::new();
        assert_eq!(counter.depart_reader(), Err(SyncError::NegativeCount));
        assert_eq!(counter.active_readers(), 0);
    }

    #[test]
    fn test_writer_waiting_count() {
        let mut counter = AccessCounter::new();
        counter.arrive(TaskRole::Writer);
        assert_eq!(counter.waiting_writers(), 1);
        counter.admit_writer();
        assert_eq!(counter.waiting_writers(), 0);
        assert_eq!(counter.active_readers(), 0);
    }
}
