//! # Synchronization Primitives for Readers and Writers
//!
//! ## The Problem
//!
//! ```text
//! Readers:  may share the resource with each other
//! Writers:  need it alone
//!
//! Naive first-reader/last-reader lock: a steady stream of readers keeps
//! the reader count above zero forever  →  WRITER STARVATION
//! ```
//!
//! ## The Solution: Turnstile + Monitor
//!
//! ```text
//! Arrival:   every task takes a ticket from ONE queue (readers and writers)
//! Admission: only the ticket holder may contend for the gate
//! Readers:   first in takes the gate, last out frees it
//! Writers:   take the gate alone
//! ```
//!
//! A writer's place in line is fixed when it arrives. No reader arriving
//! after it can join the active group ahead of it.

mod counter;
mod gate;
mod monitor;
mod turnstile;

pub use counter::AccessCounter;
pub use gate::{GateHolder, ResourceGate};
pub use monitor::{ReadSession, SynchronizationCore, WriteSession};
pub use turnstile::{FairnessQueue, QueueStats, Ticket, Turn};
