//! # Displays
//!
//! Three ways to show a running simulation, all fed the same
//! [`ReportFrame`] by the reporter:
//!
//! - [`ConsoleRenderer`]: one line per event
//! - [`DashboardRenderer`]: full-screen panel, redrawn every report
//! - [`EventLogRenderer`]: counters header over a rolling event window
//!
//! With colour on, event lines are tinted by class:
//!
//! ```text
//! reader intent / finish   cyan        writer intent / finish   magenta
//! reading                  bold green  writing                  bold red
//! gate lock / release      yellow
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::io::{self, Write};
use std::time::Duration;

use turnstile_core::{Snapshot, TaskRole, TaskState};

use crate::config::DisplayMode;
use crate::events::{SimEvent, TimedEvent};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const RESET: &str = "\x1b[0m";
const CYAN: &str = "\x1b[36m";
const BOLD_GREEN: &str = "\x1b[1;32m";
const YELLOW: &str = "\x1b[33m";
const MAGENTA: &str = "\x1b[35m";
const BOLD_RED: &str = "\x1b[1;31m";

/// What the reporter hands a renderer each period.
#[derive(Clone, Copy, Debug)]
pub struct ReportFrame<'a> {
    /// Time since the simulation started.
    pub elapsed: Duration,
    /// Core state at this report.
    pub snapshot: &'a Snapshot,
    /// Events since the previous report, oldest first.
    pub events: &'a [TimedEvent],
    /// Events lost to a full channel so far.
    pub dropped: u64,
}

/// Turns report frames into text.
pub trait Renderer: Send {
    /// Writes one report.
    ///
    /// # Errors
    ///
    /// Propagates write errors from `out`.
    fn render(&mut self, frame: &ReportFrame<'_>, out: &mut dyn Write) -> io::Result<()>;
}

/// Builds the renderer for `mode`. `color` turns on ANSI event colours.
#[must_use]
pub fn renderer_for(mode: DisplayMode, log_capacity: usize, color: bool) -> Box<dyn Renderer> {
    match mode {
        DisplayMode::Console => Box::new(ConsoleRenderer { color }),
        DisplayMode::Dashboard => Box::new(DashboardRenderer {
            color,
            ..DashboardRenderer::default()
        }),
        DisplayMode::Log => Box::new(EventLogRenderer::new(log_capacity).with_color(color)),
    }
}

/// ANSI colour for an event class.
#[must_use]
pub const fn event_color(event: &SimEvent) -> &'static str {
    match event {
        SimEvent::WantsToRead { .. } | SimEvent::FinishedReading { .. } => CYAN,
        SimEvent::Reading { .. } => BOLD_GREEN,
        SimEvent::FirstReaderLocked { .. } | SimEvent::LastReaderReleased { .. } => YELLOW,
        SimEvent::WantsToWrite { .. }
        | SimEvent::WaitingForExclusive { .. }
        | SimEvent::FinishedWriting { .. } => MAGENTA,
        SimEvent::Writing { .. } => BOLD_RED,
    }
}

fn write_event_line(
    out: &mut dyn Write,
    line: impl fmt::Display,
    event: &SimEvent,
    color: bool,
) -> io::Result<()> {
    if color {
        writeln!(out, "{}{line}{RESET}", event_color(event))
    } else {
        writeln!(out, "{line}")
    }
}

fn task_label(role: TaskRole) -> &'static str {
    match role {
        TaskRole::Reader => "reader",
        TaskRole::Writer => "writer",
    }
}

fn state_badge(state: TaskState) -> &'static str {
    match state {
        TaskState::Idle => "  idle   ",
        TaskState::Waiting => " WAITING ",
        TaskState::Active => " ACTIVE  ",
    }
}

fn write_counters(snapshot: &Snapshot, out: &mut dyn Write) -> io::Result<()> {
    writeln!(
        out,
        "  readers inside: {:<3} waiting readers: {:<3} waiting writers: {:<3} gate: {}",
        snapshot.active_readers, snapshot.waiting_readers, snapshot.waiting_writers, snapshot.gate
    )?;
    writeln!(
        out,
        "  reads: {:<6} writes: {:<6} gate cycles: {:<6} queue: {}/{}",
        snapshot.reader_sessions,
        snapshot.writer_sessions,
        snapshot.gate_acquisitions,
        snapshot.queue.served,
        snapshot.queue.issued
    )
}

/// One line per event, nothing else.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleRenderer {
    /// Tint lines by event class.
    pub color: bool,
}

impl Renderer for ConsoleRenderer {
    fn render(&mut self, frame: &ReportFrame<'_>, out: &mut dyn Write) -> io::Result<()> {
        for event in frame.events {
            write_event_line(out, event.event, &event.event, self.color)?;
        }
        out.flush()
    }
}

/// Full-screen panel: counters, per-task state table, latest events.
#[derive(Clone, Copy, Debug)]
pub struct DashboardRenderer {
    /// Recent events shown under the table.
    pub tail: usize,
    /// Tint event lines by class.
    pub color: bool,
}

impl Default for DashboardRenderer {
    fn default() -> Self {
        Self {
            tail: 6,
            color: false,
        }
    }
}

impl Renderer for DashboardRenderer {
    fn render(&mut self, frame: &ReportFrame<'_>, out: &mut dyn Write) -> io::Result<()> {
        let snapshot = frame.snapshot;

        write!(out, "{CLEAR_SCREEN}")?;
        writeln!(out, "═══════════════════════════════════════════════════════════════════")?;
        writeln!(
            out,
            "                 READERS / WRITERS        t = {:>6.1}s",
            frame.elapsed.as_secs_f64()
        )?;
        writeln!(out, "═══════════════════════════════════════════════════════════════════")?;
        write_counters(snapshot, out)?;
        writeln!(out)?;

        writeln!(out, "┌─ TASKS ────────────────────────────────────────────────────────┐")?;
        for (task, status) in &snapshot.tasks {
            writeln!(
                out,
                "│ {} {:<5} [{}] sessions: {:<6}",
                task_label(status.role),
                task.to_string(),
                state_badge(status.state),
                status.sessions
            )?;
        }
        writeln!(out, "└────────────────────────────────────────────────────────────────┘")?;

        let skip = frame.events.len().saturating_sub(self.tail);
        for event in &frame.events[skip..] {
            write!(out, "  ")?;
            write_event_line(out, event, &event.event, self.color)?;
        }
        if frame.dropped > 0 {
            writeln!(out, "  ({} events dropped)", frame.dropped)?;
        }
        out.flush()
    }
}

/// Counters header over the last `capacity` events.
#[derive(Clone, Debug)]
pub struct EventLogRenderer {
    window: VecDeque<TimedEvent>,
    capacity: usize,
    color: bool,
}

impl EventLogRenderer {
    /// Creates a log keeping at most `capacity` events (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
            color: false,
        }
    }

    /// Turns event colours on or off.
    #[must_use]
    pub const fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Events currently in the window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = &TimedEvent> {
        self.window.iter()
    }

    fn push(&mut self, event: TimedEvent) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(event);
    }
}

impl Renderer for EventLogRenderer {
    fn render(&mut self, frame: &ReportFrame<'_>, out: &mut dyn Write) -> io::Result<()> {
        for event in frame.events {
            self.push(*event);
        }

        write!(out, "{CLEAR_SCREEN}")?;
        writeln!(out, "── t = {:>6.1}s ─────────────────────────────────────────", frame.elapsed.as_secs_f64())?;
        write_counters(frame.snapshot, out)?;
        writeln!(out, "── last {} events ──", self.capacity)?;
        for event in &self.window {
            write_event_line(out, event, &event.event, self.color)?;
        }
        out.flush()
    }
}
