//! # Simulation Event Bus
//!
//! Tasks and the core's observer hook push events; the reporter drains
//! them once per report.
//!
//! ```text
//! ┌─────────────┐                            ┌─────────────┐
//! │ task thread │──┐                         │             │
//! ├─────────────┤  │    ┌───────────────┐    │  Reporter   │
//! │ task thread │──┼───>│ bounded chan  │───>│  (drain)    │
//! ├─────────────┤  │    └───────────────┘    │             │
//! │ core events │──┘                         └─────────────┘
//! └─────────────┘
//! ```
//!
//! Sends never block. A full channel drops the event and counts it, so a
//! slow display can never stall a task inside the protocol.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use turnstile_core::{CoreEvent, CoreObserver, TaskId, TaskRole};

/// Something a task did or the core reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimEvent {
    /// A reader decided to read.
    WantsToRead {
        /// The reader.
        task: TaskId,
    },
    /// A writer decided to write.
    WantsToWrite {
        /// The writer.
        task: TaskId,
    },
    /// A writer took its ticket and is waiting for exclusive access.
    WaitingForExclusive {
        /// The writer.
        task: TaskId,
    },
    /// A reader is inside.
    Reading {
        /// The reader.
        task: TaskId,
        /// Readers inside, including this one.
        active_readers: usize,
    },
    /// A writer is inside, alone.
    Writing {
        /// The writer.
        task: TaskId,
    },
    /// First reader of a group locked writers out.
    FirstReaderLocked {
        /// The reader.
        task: TaskId,
    },
    /// Last reader of a group let writers back in.
    LastReaderReleased {
        /// The reader.
        task: TaskId,
    },
    /// A reader left.
    FinishedReading {
        /// The reader.
        task: TaskId,
    },
    /// A writer left.
    FinishedWriting {
        /// The writer.
        task: TaskId,
    },
}

impl SimEvent {
    /// Maps a core event. Reader arrivals are already covered by
    /// [`SimEvent::WantsToRead`] and map to `None`.
    #[must_use]
    pub const fn from_core(event: CoreEvent) -> Option<Self> {
        Some(match event {
            CoreEvent::Arrived {
                task,
                role: TaskRole::Writer,
                ..
            } => Self::WaitingForExclusive { task },
            CoreEvent::Arrived { .. } => return None,
            CoreEvent::Admitted {
                task,
                role: TaskRole::Reader,
                active_readers,
            } => Self::Reading {
                task,
                active_readers,
            },
            CoreEvent::Admitted { task, .. } => Self::Writing { task },
            CoreEvent::GateLockedByReaders { task } => Self::FirstReaderLocked { task },
            CoreEvent::GateReleasedByReaders { task } => Self::LastReaderReleased { task },
            CoreEvent::Departed {
                task,
                role: TaskRole::Reader,
                ..
            } => Self::FinishedReading { task },
            CoreEvent::Departed { task, .. } => Self::FinishedWriting { task },
        })
    }
}

impl fmt::Display for SimEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WantsToRead { task } => write!(f, "[reader {task}] wants to read"),
            Self::WantsToWrite { task } => write!(f, "[writer {task}] wants to write"),
            Self::WaitingForExclusive { task } => {
                write!(f, "[writer {task}] waiting for exclusive access")
            }
            Self::Reading {
                task,
                active_readers,
            } => write!(f, "[reader {task}] *** READING *** ({active_readers} readers total)"),
            Self::Writing { task } => write!(f, "[writer {task}] >>> WRITING (EXCLUSIVE) <<<"),
            Self::FirstReaderLocked { task } => {
                write!(f, "  -> first reader {task} locking writers out")
            }
            Self::LastReaderReleased { task } => {
                write!(f, "  -> last reader {task} releasing writers")
            }
            Self::FinishedReading { task } => write!(f, "[reader {task}] finished reading"),
            Self::FinishedWriting { task } => write!(f, "[writer {task}] finished writing"),
        }
    }
}

/// An event stamped with time since the simulation started.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimedEvent {
    /// Offset from simulation start.
    pub at: Duration,
    /// The event.
    pub event: SimEvent,
}

impl fmt::Display for TimedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let millis = self.at.as_millis();
        write!(f, "{:>4}.{:03}s  {}", millis / 1000, millis % 1000, self.event)
    }
}

/// Bounded event channel shared by every task.
pub struct EventBus {
    sender: Sender<TimedEvent>,
    receiver: Receiver<TimedEvent>,
    dropped: Arc<AtomicU64>,
    epoch: Instant,
}

impl EventBus {
    /// Creates a bus holding at most `capacity` undrained events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            dropped: Arc::new(AtomicU64::new(0)),
            epoch: Instant::now(),
        }
    }

    /// Creates a sender handle.
    #[must_use]
    pub fn sender(&self) -> EventSender {
        EventSender {
            sender: self.sender.clone(),
            dropped: Arc::clone(&self.dropped),
            epoch: self.epoch,
        }
    }

    /// Creates a receiver handle.
    #[must_use]
    pub fn receiver(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.receiver.clone(),
            dropped: Arc::clone(&self.dropped),
            epoch: self.epoch,
        }
    }
}

/// Sender handle for task threads and the core observer.
#[derive(Clone)]
pub struct EventSender {
    sender: Sender<TimedEvent>,
    dropped: Arc<AtomicU64>,
    epoch: Instant,
}

impl EventSender {
    /// Sends without blocking. Returns `false` if the event was dropped.
    #[inline]
    pub fn send(&self, event: SimEvent) -> bool {
        let timed = TimedEvent {
            at: self.epoch.elapsed(),
            event,
        };
        match self.sender.try_send(timed) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
            // Reporter already gone: shutdown in progress.
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

impl CoreObserver for EventSender {
    fn on_event(&self, event: CoreEvent) {
        if let Some(event) = SimEvent::from_core(event) {
            self.send(event);
        }
    }
}

/// Receiver handle for the reporter.
#[derive(Clone)]
pub struct EventReceiver {
    receiver: Receiver<TimedEvent>,
    dropped: Arc<AtomicU64>,
    epoch: Instant,
}

impl EventReceiver {
    /// Takes every pending event.
    #[inline]
    pub fn drain(&self) -> Vec<TimedEvent> {
        self.receiver.try_iter().collect()
    }

    /// Events dropped because the channel was full.
    #[inline]
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Instant every event timestamp is measured from.
    #[inline]
    #[must_use]
    pub const fn epoch(&self) -> Instant {
        self.epoch
    }

    /// Time on the event clock.
    #[inline]
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Number of events waiting.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_and_drain() {
        let bus = EventBus::new(8);
        let sender = bus.sender();
        let receiver = bus.receiver();
        let task = TaskId::from_raw(1);

        assert!(sender.send(SimEvent::WantsToRead { task }));
        assert!(sender.send(SimEvent::FinishedReading { task }));
        assert_eq!(receiver.pending_count(), 2);

        let events: Vec<_> = receiver.drain().into_iter().map(|e| e.event).collect();
        assert_eq!(
            events,
            vec![SimEvent::WantsToRead { task }, SimEvent::FinishedReading { task }]
        );
        assert_eq!(receiver.pending_count(), 0);
    }

    #[test]
    fn test_full_bus_drops_and_counts() {
        let bus = EventBus::new(1);
        let sender = bus.sender();
        let task = TaskId::from_raw(0);

        assert!(sender.send(SimEvent::Writing { task }));
        assert!(!sender.send(SimEvent::FinishedWriting { task }));
        assert_eq!(bus.receiver().dropped(), 1);
    }

    #[test]
    fn test_core_event_mapping() {
        let task = TaskId::from_raw(2);
        assert_eq!(
            SimEvent::from_core(CoreEvent::Arrived {
                task,
                role: TaskRole::Reader,
                ticket: 0
            }),
            None
        );
        assert_eq!(
            SimEvent::from_core(CoreEvent::Arrived {
                task,
                role: TaskRole::Writer,
                ticket: 1
            }),
            Some(SimEvent::WaitingForExclusive { task })
        );
        assert_eq!(
            SimEvent::from_core(CoreEvent::Departed {
                task,
                role: TaskRole::Writer,
                active_readers: 0
            }),
            Some(SimEvent::FinishedWriting { task })
        );
    }

    #[test]
    fn test_observer_forwards_core_events() {
        let bus = EventBus::new(8);
        let sender = bus.sender();
        let task = TaskId::from_raw(3);

        sender.on_event(CoreEvent::GateLockedByReaders { task });
        let events = bus.receiver().drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, SimEvent::FirstReaderLocked { task });
        assert!(events[0].to_string().contains("first reader #3"));
    }
}
