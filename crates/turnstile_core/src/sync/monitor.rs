//! # Synchronization Core
//!
//! The readers-writers monitor. Composes the fairness queue, the access
//! counter and the resource gate into the four protocol operations.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌───────────────────────────────────┐
//!                    │        SynchronizationCore        │
//!                    │                                   │
//!   enter_read ──┐   │  ┌──────────────┐                 │
//!   enter_write ─┼──>│  │FairnessQueue │ (ticket, FIFO)  │
//!                │   │  └──────┬───────┘                 │
//!                │   │         ▼                         │
//!                │   │  ┌──────────────────────────────┐ │
//!   exit_read ───┴──>│  │ Mutex<Admission>             │ │
//!   exit_write       │  │  AccessCounter  ResourceGate │ │
//!                    │  │  task table     session stats│ │
//!                    │  └──────────────────────────────┘ │
//!                    │  Condvar: gate_released           │
//!                    └───────────────────────────────────┘
//! ```
//!
//! ## Lock Order
//!
//! - Entry: fairness turn, then the admission mutex.
//! - Exit: the admission mutex only. Gate release happens inside it.
//! - Waiting for the gate is a condvar wait, which releases the admission
//!   mutex. Nobody ever blocks while holding it.
//! - Observer events are sent while the admission mutex is held. An
//!   observer must return quickly and must not call back into the core.
//!
//! Only the task holding the fairness turn can be waiting for the gate, so
//! a reader or writer that arrived later cannot overtake one that arrived
//! earlier. A reader keeps the turn until its gate decision is resolved.

use std::collections::BTreeMap;
use std::fmt;

use parking_lot::{Condvar, Mutex};

use super::counter::AccessCounter;
use super::gate::ResourceGate;
use super::turnstile::{FairnessQueue, QueueStats, Ticket};
use crate::error::{SyncError, SyncResult};
use crate::observer::{CoreEvent, CoreObserver};
use crate::snapshot::Snapshot;
use crate::task::{TaskId, TaskRole, TaskState, TaskStatus};

/// Everything guarded by the admission mutex.
#[derive(Debug, Default)]
struct Admission {
    counter: AccessCounter,
    gate: ResourceGate,
    tasks: BTreeMap<TaskId, TaskStatus>,
    next_id: u64,
    reader_sessions: u64,
    writer_sessions: u64,
}

/// Finds a task and checks it is registered with `role`.
fn lookup(
    tasks: &mut BTreeMap<TaskId, TaskStatus>,
    task: TaskId,
    role: TaskRole,
) -> SyncResult<&mut TaskStatus> {
    let status = tasks.get_mut(&task).ok_or(SyncError::UnknownTask(task))?;
    if status.role != role {
        return Err(SyncError::RoleMismatch {
            task,
            expected: role,
            actual: status.role,
        });
    }
    Ok(status)
}

/// Logs and aborts on a broken enter/exit contract.
#[cold]
#[track_caller]
fn violation(err: SyncError) -> ! {
    tracing::error!(error = %err, "contract violation");
    panic!("{err}");
}

/// Starvation-free readers-writers monitor for one shared resource.
///
/// Share it between tasks by reference or `Arc`. Each task calls
/// [`register`](Self::register) once and then loops over
/// `enter_* -> work -> exit_*`.
///
/// ## Usage
///
/// ```rust,ignore
/// use turnstile_core::{SynchronizationCore, TaskRole};
///
/// let core = SynchronizationCore::new();
/// let reader = core.register(TaskRole::Reader);
/// let writer = core.register(TaskRole::Writer);
///
/// core.enter_read(reader);
/// assert_eq!(core.snapshot().active_readers, 1);
/// core.exit_read(reader);
///
/// let value = core.with_write(writer, || 42);
/// assert_eq!(value, 42);
/// ```
pub struct SynchronizationCore {
    admission: Mutex<Admission>,
    gate_released: Condvar,
    queue: FairnessQueue,
    observer: Option<Box<dyn CoreObserver>>,
}

impl SynchronizationCore {
    /// Creates a core with a free gate and no tasks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            admission: Mutex::new(Admission::default()),
            gate_released: Condvar::new(),
            queue: FairnessQueue::new(),
            observer: None,
        }
    }

    /// Creates a core that reports every [`CoreEvent`] to `observer`.
    #[must_use]
    pub fn with_observer(observer: impl CoreObserver + 'static) -> Self {
        Self {
            observer: Some(Box::new(observer)),
            ..Self::new()
        }
    }

    /// Registers a task. It starts `Idle`.
    pub fn register(&self, role: TaskRole) -> TaskId {
        let mut admission = self.admission.lock();
        let task = TaskId::from_raw(admission.next_id);
        admission.next_id += 1;
        admission.tasks.insert(task, TaskStatus::new(role));
        tracing::trace!(task = %task, role = %role, "registered");
        task
    }

    /// Removes an idle task from the state table.
    ///
    /// # Errors
    ///
    /// [`SyncError::UnknownTask`] if not registered, [`SyncError::TaskBusy`]
    /// if the task is waiting or active.
    pub fn deregister(&self, task: TaskId) -> SyncResult<()> {
        let mut admission = self.admission.lock();
        let status = admission
            .tasks
            .get(&task)
            .ok_or(SyncError::UnknownTask(task))?;
        if status.state != TaskState::Idle {
            return Err(SyncError::TaskBusy(task));
        }
        admission.tasks.remove(&task);
        Ok(())
    }

    // =========================================================================
    // Reader protocol
    // =========================================================================

    /// Blocks until `task` may read, then returns with shared access.
    ///
    /// The first reader of a group takes the gate for the whole group,
    /// waiting out any writer in progress.
    ///
    /// # Panics
    ///
    /// On a contract violation: unknown task, a writer task, or a task
    /// that is already waiting or active.
    pub fn enter_read(&self, task: TaskId) {
        let ticket = self
            .arrive(task, TaskRole::Reader)
            .unwrap_or_else(|err| violation(err));
        let turn = self.queue.wait_turn(ticket);

        let (active_readers, first) = {
            let mut admission = self.admission.lock();
            let first = admission.counter.active_readers() == 0;
            if first {
                while !admission.gate.is_free() {
                    self.gate_released.wait(&mut admission);
                }
                admission.gate.acquire(TaskRole::Reader);
            }
            let active_readers = admission.counter.admit_reader();
            if let Some(status) = admission.tasks.get_mut(&task) {
                status.state = TaskState::Active;
            }
            if first {
                self.emit(CoreEvent::GateLockedByReaders { task });
            }
            self.emit(CoreEvent::Admitted {
                task,
                role: TaskRole::Reader,
                active_readers,
            });
            (active_readers, first)
        };
        drop(turn);

        if first {
            tracing::debug!(task = %task, "first reader locked the gate");
        }
        tracing::trace!(task = %task, active_readers, "reader admitted");
    }

    /// Leaves the critical section entered by [`enter_read`](Self::enter_read).
    ///
    /// The last reader out releases the gate.
    ///
    /// # Panics
    ///
    /// On a contract violation, see [`try_exit_read`](Self::try_exit_read).
    pub fn exit_read(&self, task: TaskId) {
        self.try_exit_read(task).unwrap_or_else(|err| violation(err));
    }

    /// Fallible form of [`exit_read`](Self::exit_read).
    ///
    /// # Errors
    ///
    /// [`SyncError::DoubleRelease`] if the task is not inside,
    /// [`SyncError::NegativeCount`] if no reader is active, plus the
    /// identity errors. Nothing is changed on error.
    pub fn try_exit_read(&self, task: TaskId) -> SyncResult<()> {
        let remaining = {
            let mut admission = self.admission.lock();
            let Admission {
                counter,
                gate,
                tasks,
                reader_sessions,
                ..
            } = &mut *admission;

            let status = lookup(tasks, task, TaskRole::Reader)?;
            if status.state != TaskState::Active {
                return Err(SyncError::DoubleRelease {
                    task,
                    role: TaskRole::Reader,
                });
            }
            let remaining = counter.depart_reader()?;
            if remaining == 0 {
                let released = gate.release(TaskRole::Reader);
                assert!(released, "Active readers without the gate!");
            }
            status.state = TaskState::Idle;
            status.sessions += 1;
            *reader_sessions += 1;

            self.emit(CoreEvent::Departed {
                task,
                role: TaskRole::Reader,
                active_readers: remaining,
            });
            if remaining == 0 {
                self.emit(CoreEvent::GateReleasedByReaders { task });
            }
            remaining
        };

        if remaining == 0 {
            self.gate_released.notify_all();
            tracing::debug!(task = %task, "last reader released the gate");
        }
        Ok(())
    }

    // =========================================================================
    // Writer protocol
    // =========================================================================

    /// Blocks until `task` holds the gate exclusively.
    ///
    /// # Panics
    ///
    /// On a contract violation: unknown task, a reader task, or a task
    /// that is already waiting or active.
    pub fn enter_write(&self, task: TaskId) {
        let ticket = self
            .arrive(task, TaskRole::Writer)
            .unwrap_or_else(|err| violation(err));
        let turn = self.queue.wait_turn(ticket);

        {
            let mut admission = self.admission.lock();
            while !admission.gate.is_free() {
                self.gate_released.wait(&mut admission);
            }
            admission.gate.acquire(TaskRole::Writer);
            admission.counter.admit_writer();
            if let Some(status) = admission.tasks.get_mut(&task) {
                status.state = TaskState::Active;
            }
            self.emit(CoreEvent::Admitted {
                task,
                role: TaskRole::Writer,
                active_readers: 0,
            });
        }
        drop(turn);

        tracing::debug!(task = %task, "writer holds the gate");
    }

    /// Releases the gate taken by [`enter_write`](Self::enter_write).
    ///
    /// # Panics
    ///
    /// On a contract violation, see [`try_exit_write`](Self::try_exit_write).
    pub fn exit_write(&self, task: TaskId) {
        self.try_exit_write(task).unwrap_or_else(|err| violation(err));
    }

    /// Fallible form of [`exit_write`](Self::exit_write).
    ///
    /// # Errors
    ///
    /// [`SyncError::DoubleRelease`] if the task is not inside, plus the
    /// identity errors. Nothing is changed on error.
    pub fn try_exit_write(&self, task: TaskId) -> SyncResult<()> {
        {
            let mut admission = self.admission.lock();
            let Admission {
                gate,
                tasks,
                writer_sessions,
                ..
            } = &mut *admission;

            let status = lookup(tasks, task, TaskRole::Writer)?;
            if status.state != TaskState::Active {
                return Err(SyncError::DoubleRelease {
                    task,
                    role: TaskRole::Writer,
                });
            }
            let released = gate.release(TaskRole::Writer);
            assert!(released, "Active writer without the gate!");
            status.state = TaskState::Idle;
            status.sessions += 1;
            *writer_sessions += 1;

            self.emit(CoreEvent::Departed {
                task,
                role: TaskRole::Writer,
                active_readers: 0,
            });
        }
        self.gate_released.notify_all();

        tracing::debug!(task = %task, "writer released the gate");
        Ok(())
    }

    // =========================================================================
    // Scoped access
    // =========================================================================

    /// Enters as a reader and returns a guard that exits on drop.
    pub fn read(&self, task: TaskId) -> ReadSession<'_> {
        self.enter_read(task);
        ReadSession { core: self, task }
    }

    /// Enters as a writer and returns a guard that exits on drop.
    pub fn write(&self, task: TaskId) -> WriteSession<'_> {
        self.enter_write(task);
        WriteSession { core: self, task }
    }

    /// Runs `work` inside a read critical section.
    pub fn with_read<R>(&self, task: TaskId, work: impl FnOnce() -> R) -> R {
        let _session = self.read(task);
        work()
    }

    /// Runs `work` inside a write critical section.
    pub fn with_write<R>(&self, task: TaskId, work: impl FnOnce() -> R) -> R {
        let _session = self.write(task);
        work()
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Copies the counters, gate holder and per-task states.
    ///
    /// Holds the admission mutex only for the copy. Never waits on the gate
    /// or the fairness queue.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let admission = self.admission.lock();
        Snapshot {
            active_readers: admission.counter.active_readers(),
            waiting_readers: admission.counter.waiting_readers(),
            waiting_writers: admission.counter.waiting_writers(),
            gate: admission.gate.holder(),
            reader_sessions: admission.reader_sessions,
            writer_sessions: admission.writer_sessions,
            gate_acquisitions: admission.gate.acquisitions(),
            gate_releases: admission.gate.releases(),
            queue: self.queue.stats(),
            tasks: admission.tasks.clone(),
        }
    }

    /// Fairness queue counters.
    #[must_use]
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Validates the task, takes its ticket and marks it waiting.
    ///
    /// The ticket is issued under the admission mutex so that a task seen
    /// as `Waiting` always already has its place in line.
    fn arrive(&self, task: TaskId, role: TaskRole) -> SyncResult<Ticket> {
        let ticket = {
            let mut admission = self.admission.lock();
            let Admission { counter, tasks, .. } = &mut *admission;

            let status = lookup(tasks, task, role)?;
            if status.state != TaskState::Idle {
                return Err(SyncError::Reentrant {
                    task,
                    state: status.state,
                });
            }
            status.state = TaskState::Waiting;
            counter.arrive(role);
            let ticket = self.queue.take_ticket();
            self.emit(CoreEvent::Arrived {
                task,
                role,
                ticket: ticket.number(),
            });
            ticket
        };

        tracing::trace!(task = %task, role = %role, ticket = ticket.number(), "arrived");
        Ok(ticket)
    }

    /// Reports to the observer. Always called with the admission mutex
    /// held, so observed order is state-change order.
    #[inline]
    fn emit(&self, event: CoreEvent) {
        if let Some(observer) = &self.observer {
            observer.on_event(event);
        }
    }
}

impl Default for SynchronizationCore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SynchronizationCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynchronizationCore")
            .field("admission", &*self.admission.lock())
            .field("queue", &self.queue.stats())
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

/// Shared access held by one reader. Dropping it runs the exit protocol.
///
/// ## Usage
///
/// ```rust,ignore
/// use turnstile_core::{SynchronizationCore, TaskRole};
///
/// let core = SynchronizationCore::new();
/// let reader = core.register(TaskRole::Reader);
/// {
///     let session = core.read(reader);
///     assert_eq!(session.task(), reader);
/// }
/// assert_eq!(core.snapshot().active_readers, 0);
/// ```
#[must_use = "dropping the session leaves the critical section"]
pub struct ReadSession<'a> {
    core: &'a SynchronizationCore,
    task: TaskId,
}

impl ReadSession<'_> {
    /// The reader holding this session.
    #[inline]
    #[must_use]
    pub const fn task(&self) -> TaskId {
        self.task
    }
}

impl Drop for ReadSession<'_> {
    fn drop(&mut self) {
        self.core.exit_read(self.task);
    }
}

/// Exclusive access held by one writer. Dropping it runs the exit protocol.
#[must_use = "dropping the session leaves the critical section"]
pub struct WriteSession<'a> {
    core: &'a SynchronizationCore,
    task: TaskId,
}

impl WriteSession<'_> {
    /// The writer holding this session.
    #[inline]
    #[must_use]
    pub const fn task(&self) -> TaskId {
        self.task
    }
}

impl Drop for WriteSession<'_> {
    fn drop(&mut self) {
        self.core.exit_write(self.task);
    }
}
