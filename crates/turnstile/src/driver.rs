//! # Simulation Driver
//!
//! THE ORCHESTRATION:
//! ```text
//! Each task thread, forever (until stop):
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. THINK      sleep a random time from the role's think range       │
//! │ 2. ANNOUNCE   "wants to read/write", pause                          │
//! │ 3. ENTER      core.enter_read / enter_write (may block)             │
//! │ 4. WORK       sleep read_ms / write_ms inside the critical section  │
//! │ 5. EXIT       core.exit_read / exit_write                           │
//! └─────────────────────────────────────────────────────────────────────┘
//!
//! Reporter thread: every report_interval_ms, drain events + snapshot.
//! Main thread: wait run_for_secs (or for a stop request), stop, join.
//! ```
//!
//! All timing lives here. The core only ever sees enter/exit calls.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::bounded;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use turnstile_core::{Snapshot, SynchronizationCore, TaskId, TaskRole};

use crate::config::{SimConfig, ThinkRange};
use crate::display::renderer_for;
use crate::error::{SimError, SimResult};
use crate::events::{EventBus, EventSender, SimEvent};
use crate::reporter::{Reporter, ReporterSummary};

/// Longest uninterrupted sleep; bounds how late a stop request is noticed.
const NAP_SLICE: Duration = Duration::from_millis(25);

/// Shared stop flag. Cloning is cheap; every clone controls the same run.
#[derive(Clone, Debug, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Asks every task to finish its current iteration and exit.
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether a stop was requested.
    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Sleeps up to `duration`, waking early on stop.
    ///
    /// Returns `false` if the stop was requested.
    pub fn nap(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_stopped() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(NAP_SLICE));
        }
    }
}

/// Outcome of a finished run.
#[derive(Clone, Debug)]
pub struct SimReport {
    /// Wall time from start to the last join.
    pub elapsed: Duration,
    /// Core state after every task stopped.
    pub snapshot: Snapshot,
    /// Reporter totals.
    pub reporter: ReporterSummary,
}

/// Everything one task thread needs.
struct TaskContext {
    core: Arc<SynchronizationCore>,
    events: EventSender,
    stop: StopHandle,
    task: TaskId,
    role: TaskRole,
    think: ThinkRange,
    work: Duration,
    announce: Duration,
    rng: ChaCha8Rng,
}

impl TaskContext {
    fn run(mut self) {
        tracing::debug!(task = %self.task, role = %self.role, "task started");
        loop {
            let think = self.rng.gen_range(self.think.min_ms..=self.think.max_ms);
            if !self.stop.nap(Duration::from_millis(think)) {
                break;
            }

            self.events.send(match self.role {
                TaskRole::Reader => SimEvent::WantsToRead { task: self.task },
                TaskRole::Writer => SimEvent::WantsToWrite { task: self.task },
            });
            if !self.stop.nap(self.announce) {
                break;
            }

            // A stop during the work still runs the exit protocol.
            match self.role {
                TaskRole::Reader => self.core.with_read(self.task, || self.stop.nap(self.work)),
                TaskRole::Writer => self.core.with_write(self.task, || self.stop.nap(self.work)),
            };
        }
        tracing::debug!(task = %self.task, "task stopped");
    }
}

/// A configured, not yet started simulation.
pub struct Simulation {
    config: SimConfig,
    core: Arc<SynchronizationCore>,
    bus: EventBus,
    stop: StopHandle,
    seed: u64,
}

impl Simulation {
    /// Validates `config` and builds the shared core and event bus.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidConfig`] if the config does not validate.
    pub fn new(config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let bus = EventBus::new(config.event_capacity);
        let core = Arc::new(SynchronizationCore::with_observer(bus.sender()));
        let seed = config.seed.unwrap_or_else(clock_seed);
        Ok(Self {
            config,
            core,
            bus,
            stop: StopHandle::default(),
            seed,
        })
    }

    /// The shared core.
    #[must_use]
    pub fn core(&self) -> &Arc<SynchronizationCore> {
        &self.core
    }

    /// Seed actually used for think times.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Handle that stops the run from another thread.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Runs until `run_for_secs` elapses or a stop is requested, writing
    /// reports to `out`.
    ///
    /// # Errors
    ///
    /// [`SimError::Spawn`] if a thread cannot be started (already started
    /// threads are stopped and joined first), [`SimError::TaskPanicked`] if
    /// any task or the reporter panicked.
    pub fn run(self, out: impl Write + Send + 'static) -> SimResult<SimReport> {
        let started = Instant::now();
        let config = &self.config;
        tracing::info!(
            readers = config.readers,
            writers = config.writers,
            seed = self.seed,
            display = %config.display,
            "simulation starting"
        );

        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let reporter = Reporter::new(
            Arc::clone(&self.core),
            self.bus.receiver(),
            renderer_for(config.display, config.log_capacity, config.color),
            config.report_interval(),
        );
        let reporter_handle = spawn_named("reporter".to_string(), move || {
            let mut out = out;
            reporter.run(&shutdown_rx, &mut out)
        })?;

        let roles = std::iter::repeat(TaskRole::Reader)
            .take(config.readers)
            .chain(std::iter::repeat(TaskRole::Writer).take(config.writers));
        let mut tasks: Vec<(String, JoinHandle<()>)> = Vec::new();
        for role in roles {
            match self.spawn_task(role) {
                Ok(spawned) => tasks.push(spawned),
                Err(err) => {
                    self.stop.stop();
                    drop(shutdown_tx);
                    // Already failing; panics here add nothing.
                    let _ = join_all(tasks);
                    let _ = reporter_handle.join();
                    return Err(err);
                }
            }
        }

        match config.run_for() {
            Some(limit) => {
                self.stop.nap(limit);
            }
            None => {
                while self.stop.nap(Duration::from_secs(3600)) {}
            }
        }
        self.stop.stop();
        tracing::info!("stop requested, waiting for tasks");

        let joined = join_all(tasks);
        drop(shutdown_tx);
        let reporter_summary = reporter_handle
            .join()
            .map_err(|_| SimError::TaskPanicked("reporter".to_string()));
        joined?;
        let reporter_summary = reporter_summary?;

        let snapshot = self.core.snapshot();
        tracing::info!(
            reads = snapshot.reader_sessions,
            writes = snapshot.writer_sessions,
            "simulation finished"
        );
        Ok(SimReport {
            elapsed: started.elapsed(),
            snapshot,
            reporter: reporter_summary,
        })
    }

    fn spawn_task(&self, role: TaskRole) -> SimResult<(String, JoinHandle<()>)> {
        let task = self.core.register(role);
        let (think, work) = match role {
            TaskRole::Reader => (self.config.reader_think, self.config.read_duration()),
            TaskRole::Writer => (self.config.writer_think, self.config.write_duration()),
        };
        let context = TaskContext {
            core: Arc::clone(&self.core),
            events: self.bus.sender(),
            stop: self.stop.clone(),
            task,
            role,
            think,
            work,
            announce: self.config.announce_duration(),
            rng: ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(task.raw())),
        };

        let name = format!("{role}-{}", task.raw());
        let handle = spawn_named(name.clone(), move || context.run())?;
        Ok((name, handle))
    }
}

fn spawn_named<T, F>(name: String, body: F) -> SimResult<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|source| SimError::Spawn { name, source })
}

/// Joins every task, reporting the first one that panicked.
fn join_all(tasks: Vec<(String, JoinHandle<()>)>) -> SimResult<()> {
    let mut first_panic = None;
    for (name, handle) in tasks {
        if handle.join().is_err() {
            tracing::error!(task = %name, "task panicked");
            first_panic.get_or_insert(name);
        }
    }
    match first_panic {
        Some(name) => Err(SimError::TaskPanicked(name)),
        None => Ok(()),
    }
}

fn clock_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() ^ u64::from(elapsed.subsec_nanos()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nap_wakes_on_stop() {
        let stop = StopHandle::default();
        assert!(stop.nap(Duration::from_millis(1)));

        let remote = stop.clone();
        let waker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.stop();
        });

        let started = Instant::now();
        assert!(!stop.nap(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(5));
        waker.join().unwrap();
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = SimConfig {
            readers: 0,
            writers: 0,
            ..SimConfig::default()
        };
        assert!(matches!(Simulation::new(config), Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_fixed_seed_is_kept() {
        let config = SimConfig {
            seed: Some(42),
            ..SimConfig::default()
        };
        let simulation = Simulation::new(config).unwrap();
        assert_eq!(simulation.seed(), 42);
        assert!(simulation.core().snapshot().tasks.is_empty());
    }
}
