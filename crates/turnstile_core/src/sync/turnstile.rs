//! # Fairness Queue
//!
//! A ticket turnstile shared by readers and writers. Taking a ticket fixes
//! a task's place in line without blocking; waiting for the turn blocks
//! until every earlier ticket has been served. The turn is held only for
//! the admission decision, never for the critical section.
//!
//! ```text
//!   take_ticket()        wait_turn()             drop(Turn)
//!   ─────────────> [ 4 ] ───────────> serving 4 ───────────> serving 5
//!   (arrival fixed)       (blocks on 0..3)        (admits next)
//! ```

use parking_lot::{Condvar, Mutex};

/// Ticket counters.
#[derive(Debug, Default)]
struct TicketState {
    next_ticket: u64,
    now_serving: u64,
}

/// Turnstile statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tickets handed out.
    pub issued: u64,
    /// Turns completed.
    pub served: u64,
}

impl QueueStats {
    /// Tickets issued but not yet served, including the current holder.
    #[inline]
    #[must_use]
    pub const fn queued(&self) -> u64 {
        self.issued - self.served
    }
}

/// A place in line.
///
/// Every ticket must be passed to [`FairnessQueue::wait_turn`]. A dropped
/// ticket is never served and stalls every later one.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "an unused ticket stalls the queue"]
pub struct Ticket(u64);

impl Ticket {
    /// Position in the arrival order.
    #[inline]
    #[must_use]
    pub const fn number(&self) -> u64 {
        self.0
    }
}

/// Holding the turnstile. Dropping it admits the next ticket.
#[derive(Debug)]
#[must_use = "dropping the turn immediately admits the next ticket"]
pub struct Turn<'a> {
    queue: &'a FairnessQueue,
    ticket: u64,
}

impl Turn<'_> {
    /// The ticket being served.
    #[inline]
    #[must_use]
    pub const fn ticket(&self) -> u64 {
        self.ticket
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        {
            let mut state = self.queue.state.lock();
            debug_assert_eq!(state.now_serving, self.ticket);
            state.now_serving += 1;
        }
        self.queue.turn_passed.notify_all();
    }
}

/// FIFO admission across the combined reader/writer arrival stream.
#[derive(Debug, Default)]
pub struct FairnessQueue {
    state: Mutex<TicketState>,
    turn_passed: Condvar,
}

impl FairnessQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an arrival and returns its place in line. Never blocks.
    pub fn take_ticket(&self) -> Ticket {
        let mut state = self.state.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;
        Ticket(ticket)
    }

    /// Blocks until every earlier ticket has been served.
    pub fn wait_turn(&self, ticket: Ticket) -> Turn<'_> {
        let mut state = self.state.lock();
        while state.now_serving != ticket.0 {
            self.turn_passed.wait(&mut state);
        }
        Turn {
            queue: self,
            ticket: ticket.0,
        }
    }

    /// Takes a ticket and waits for it in one step.
    pub fn acquire(&self) -> Turn<'_> {
        let ticket = self.take_ticket();
        self.wait_turn(ticket)
    }

    /// Copies the ticket counters.
    #[must_use]
    pub fn stats(&self) -> QueueStats {
        let state = self.state.lock();
        QueueStats {
            issued: state.next_ticket,
            served: state.now_serving,
        }
    }
}
