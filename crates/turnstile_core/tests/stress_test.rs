//! Concurrent stress tests with seeded random hold and think times:
//! mutual exclusion, counter consistency, FIFO admission, event order and
//! writer progress under a continuous reader stream.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use turnstile_core::{CoreEvent, GateHolder, SynchronizationCore, TaskId, TaskRole};

/// Shared occupancy counters checked inside every critical section.
#[derive(Default)]
struct Occupancy {
    readers: AtomicUsize,
    writers: AtomicUsize,
}

impl Occupancy {
    fn read(&self, hold: Duration) {
        self.readers.fetch_add(1, Ordering::SeqCst);
        assert_eq!(self.writers.load(Ordering::SeqCst), 0, "reader inside with a writer");
        pause(hold);
        assert_eq!(self.writers.load(Ordering::SeqCst), 0, "writer joined a reader");
        self.readers.fetch_sub(1, Ordering::SeqCst);
    }

    fn write(&self, hold: Duration) {
        let writers = self.writers.fetch_add(1, Ordering::SeqCst) + 1;
        assert_eq!(writers, 1, "two writers inside");
        assert_eq!(self.readers.load(Ordering::SeqCst), 0, "writer inside with readers");
        pause(hold);
        assert_eq!(self.readers.load(Ordering::SeqCst), 0, "reader joined a writer");
        self.writers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Zero means just yield.
fn pause(duration: Duration) {
    if duration.is_zero() {
        thread::yield_now();
    } else {
        thread::sleep(duration);
    }
}

/// Random pause of up to `max_micros`, zero about half the time.
fn jitter(rng: &mut ChaCha8Rng, max_micros: u64) -> Duration {
    if rng.gen_bool(0.5) {
        Duration::ZERO
    } else {
        Duration::from_micros(rng.gen_range(1..=max_micros))
    }
}

#[test]
fn test_50_readers_10_writers_stress() {
    let core = Arc::new(SynchronizationCore::new());
    let occupancy = Arc::new(Occupancy::default());
    let stop = Arc::new(AtomicBool::new(false));
    let reader_entries = Arc::new(AtomicUsize::new(0));
    let writer_entries = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for i in 0..60_u64 {
        let role = if i < 50 { TaskRole::Reader } else { TaskRole::Writer };
        let task = core.register(role);
        let core = Arc::clone(&core);
        let occupancy = Arc::clone(&occupancy);
        let stop = Arc::clone(&stop);
        let entries = Arc::clone(match role {
            TaskRole::Reader => &reader_entries,
            TaskRole::Writer => &writer_entries,
        });

        handles.push(thread::spawn(move || {
            let mut rng = ChaCha8Rng::seed_from_u64(0x5eed ^ i);
            while !stop.load(Ordering::Relaxed) {
                pause(jitter(&mut rng, 300));
                let hold = jitter(&mut rng, 200);
                match role {
                    TaskRole::Reader => core.with_read(task, || occupancy.read(hold)),
                    TaskRole::Writer => core.with_write(task, || occupancy.write(hold)),
                }
                entries.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    // Observe from outside while the workers run.
    let deadline = Instant::now() + Duration::from_millis(400);
    let mut observed = 0;
    while Instant::now() < deadline {
        let snapshot = core.snapshot();
        assert!(
            !(snapshot.active_readers > 0 && snapshot.writer_active()),
            "readers and writer inside together: {snapshot:?}"
        );
        match snapshot.gate {
            GateHolder::Readers => assert!(snapshot.active_readers > 0),
            GateHolder::Free | GateHolder::Writer => assert_eq!(snapshot.active_readers, 0),
        }
        assert!(snapshot.gate_acquisitions - snapshot.gate_releases <= 1);
        observed += 1;
        thread::sleep(Duration::from_micros(200));
    }
    stop.store(true, Ordering::Relaxed);

    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = core.snapshot();
    assert!(observed > 0);
    assert_eq!(snapshot.active_readers, 0);
    assert_eq!(snapshot.waiting_readers, 0);
    assert_eq!(snapshot.waiting_writers, 0);
    assert_eq!(snapshot.gate, GateHolder::Free);
    assert_eq!(snapshot.gate_acquisitions, snapshot.gate_releases);
    assert_eq!(snapshot.reader_sessions as usize, reader_entries.load(Ordering::Relaxed));
    assert_eq!(snapshot.writer_sessions as usize, writer_entries.load(Ordering::Relaxed));
    assert_eq!(snapshot.queue.queued(), 0);
    assert!(snapshot.writer_sessions > 0);
}

#[test]
fn test_admission_respects_ticket_order() {
    let tickets: Arc<Mutex<HashMap<TaskId, Vec<u64>>>> = Arc::default();
    let sink = Arc::clone(&tickets);
    let core = Arc::new(SynchronizationCore::with_observer(move |event: CoreEvent| {
        if let CoreEvent::Arrived { task, ticket, .. } = event {
            sink.lock().entry(task).or_default().push(ticket);
        }
    }));
    let admissions = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for i in 0..12 {
        let role = if i % 4 == 0 { TaskRole::Writer } else { TaskRole::Reader };
        let task = core.register(role);
        let core = Arc::clone(&core);
        let admissions = Arc::clone(&admissions);

        handles.push(thread::spawn(move || {
            for _ in 0..40 {
                match role {
                    TaskRole::Reader => {
                        core.enter_read(task);
                        admissions.lock().push((task, role));
                        thread::yield_now();
                        core.exit_read(task);
                    }
                    TaskRole::Writer => {
                        core.enter_write(task);
                        admissions.lock().push((task, role));
                        thread::yield_now();
                        core.exit_write(task);
                    }
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    // Pair each admission with the ticket of the same session.
    let tickets = tickets.lock();
    let mut seen: HashMap<TaskId, usize> = HashMap::new();
    let admitted: Vec<(u64, TaskRole)> = admissions
        .lock()
        .iter()
        .map(|&(task, role)| {
            let nth = seen.entry(task).or_default();
            let ticket = tickets[&task][*nth];
            *nth += 1;
            (ticket, role)
        })
        .collect();
    assert_eq!(admitted.len(), 12 * 40);

    // Whenever a writer is involved, the earlier ticket must be admitted first.
    for (i, &(earlier_ticket, earlier_role)) in admitted.iter().enumerate() {
        for &(later_ticket, later_role) in &admitted[i + 1..] {
            if earlier_role == TaskRole::Writer || later_role == TaskRole::Writer {
                assert!(
                    earlier_ticket < later_ticket,
                    "ticket {later_ticket} ({later_role}) admitted after {earlier_ticket} ({earlier_role})"
                );
            }
        }
    }
}

#[test]
fn test_writer_progress_under_reader_stream() {
    let core = Arc::new(SynchronizationCore::new());
    let stop = Arc::new(AtomicBool::new(false));
    let writer_done = Arc::new(AtomicBool::new(false));

    // Readers overlap continuously: without the turnstile the count never
    // reaches zero and the writer would wait forever.
    let readers: Vec<_> = (0..8)
        .map(|_| {
            let task = core.register(TaskRole::Reader);
            let core = Arc::clone(&core);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    core.with_read(task, || thread::sleep(Duration::from_millis(2)));
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(20));

    let writer = {
        let task = core.register(TaskRole::Writer);
        let core = Arc::clone(&core);
        let writer_done = Arc::clone(&writer_done);
        thread::spawn(move || {
            for _ in 0..5 {
                core.with_write(task, || thread::sleep(Duration::from_millis(1)));
            }
            writer_done.store(true, Ordering::SeqCst);
        })
    };

    let deadline = Instant::now() + Duration::from_secs(5);
    while !writer_done.load(Ordering::SeqCst) && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }
    let finished_in_time = writer_done.load(Ordering::SeqCst);
    stop.store(true, Ordering::Relaxed);

    writer.join().unwrap();
    for handle in readers {
        handle.join().unwrap();
    }

    assert!(finished_in_time, "writer starved by the reader stream");
    let snapshot = core.snapshot();
    assert_eq!(snapshot.writer_sessions, 5);
    assert!(snapshot.reader_sessions > 0);
}

/// Replays observer events and checks they never show readers and a
/// writer inside together.
#[test]
fn test_event_stream_never_overlaps() {
    let events: Arc<Mutex<Vec<CoreEvent>>> = Arc::default();
    let sink = Arc::clone(&events);
    let core = Arc::new(SynchronizationCore::with_observer(move |event: CoreEvent| {
        sink.lock().push(event);
    }));

    let mut handles = Vec::new();
    for i in 0..8_u64 {
        let role = if i < 6 { TaskRole::Reader } else { TaskRole::Writer };
        let task = core.register(role);
        let core = Arc::clone(&core);
        handles.push(thread::spawn(move || {
            let mut rng = ChaCha8Rng::seed_from_u64(i);
            for _ in 0..500 {
                let hold = jitter(&mut rng, 50);
                match role {
                    TaskRole::Reader => core.with_read(task, || pause(hold)),
                    TaskRole::Writer => core.with_write(task, || pause(hold)),
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    let events = events.lock();
    let mut readers_inside = 0_usize;
    let mut writer_inside: Option<TaskId> = None;
    let mut gate_held_by_readers = false;
    for (at, event) in events.iter().enumerate() {
        match *event {
            CoreEvent::Arrived { .. } => {}
            CoreEvent::GateLockedByReaders { task } => {
                assert!(writer_inside.is_none(), "event {at}: {task} locked the gate under a writer");
                assert!(!gate_held_by_readers, "event {at}: gate locked twice");
                gate_held_by_readers = true;
            }
            CoreEvent::GateReleasedByReaders { task } => {
                assert_eq!(readers_inside, 0, "event {at}: {task} released with readers inside");
                gate_held_by_readers = false;
            }
            CoreEvent::Admitted {
                task,
                role: TaskRole::Reader,
                active_readers,
            } => {
                assert!(writer_inside.is_none(), "event {at}: reader {task} admitted while writer inside");
                assert!(gate_held_by_readers);
                readers_inside += 1;
                assert_eq!(active_readers, readers_inside, "event {at}");
            }
            CoreEvent::Admitted { task, .. } => {
                assert_eq!(readers_inside, 0, "event {at}: writer {task} admitted with readers inside");
                assert!(!gate_held_by_readers, "event {at}: writer {task} admitted before release");
                assert!(writer_inside.is_none(), "event {at}: two writers inside");
                writer_inside = Some(task);
            }
            CoreEvent::Departed {
                task,
                role: TaskRole::Reader,
                active_readers,
            } => {
                readers_inside -= 1;
                assert_eq!(active_readers, readers_inside, "event {at}: {task}");
            }
            CoreEvent::Departed { task, .. } => {
                assert_eq!(writer_inside, Some(task), "event {at}");
                writer_inside = None;
            }
        }
    }
    assert_eq!(readers_inside, 0);
    assert!(writer_inside.is_none());
    let groups = events
        .iter()
        .filter(|e| matches!(e, CoreEvent::GateLockedByReaders { .. }))
        .count();
    assert_eq!(events.len(), 8 * 500 * 3 + 2 * groups);
}
