//! # TURNSTILE Core
//!
//! Starvation-free readers-writers coordination for one shared resource:
//! - Any number of readers inside together
//! - One writer inside alone
//! - FIFO admission across both classes, so neither starves
//!
//! ## Architecture Rules
//!
//! 1. **Never block while holding the bookkeeping lock** - gate waits are condvar waits
//! 2. **Fixed lock order** - fairness turn, then admission mutex
//! 3. **No timing in the core** - work is injected by the caller
//! 4. **Contract violations are fatal** - unmatched exits never get absorbed
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use turnstile_core::{SynchronizationCore, TaskRole};
//!
//! let core = Arc::new(SynchronizationCore::new());
//! let reader = core.register(TaskRole::Reader);
//!
//! let len = core.with_read(reader, || shared.len());
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod observer;
pub mod snapshot;
pub mod sync;
pub mod task;

pub use error::{SyncError, SyncResult};
pub use observer::{CoreEvent, CoreObserver};
pub use snapshot::Snapshot;
pub use sync::{
    AccessCounter, FairnessQueue, GateHolder, QueueStats, ReadSession, ResourceGate,
    SynchronizationCore, Ticket, Turn, WriteSession,
};
pub use task::{TaskId, TaskRole, TaskState, TaskStatus};
