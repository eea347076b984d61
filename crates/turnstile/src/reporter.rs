//! # Reporter
//!
//! Background thread that periodically drains the event bus, snapshots the
//! core and hands both to the configured renderer. It only reads: the
//! snapshot call holds the core's admission mutex just long enough to copy.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use turnstile_core::{Snapshot, SynchronizationCore};

use crate::display::{ReportFrame, Renderer};
use crate::events::EventReceiver;

/// Totals from one reporter run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReporterSummary {
    /// Reports rendered.
    pub reports: u64,
    /// Events passed to the renderer.
    pub events: u64,
    /// Events lost to a full bus.
    pub dropped: u64,
}

/// Polls the core and renders reports.
pub struct Reporter {
    core: Arc<SynchronizationCore>,
    events: EventReceiver,
    renderer: Box<dyn Renderer>,
    interval: Duration,
    summary: ReporterSummary,
    output_failed: bool,
}

impl Reporter {
    /// Creates a reporter. Frame times use the event bus clock, so headers
    /// and event timestamps agree.
    #[must_use]
    pub fn new(
        core: Arc<SynchronizationCore>,
        events: EventReceiver,
        renderer: Box<dyn Renderer>,
        interval: Duration,
    ) -> Self {
        Self {
            core,
            events,
            renderer,
            interval,
            summary: ReporterSummary::default(),
            output_failed: false,
        }
    }

    /// Renders one report and returns the snapshot it showed.
    ///
    /// A failing writer is logged once; later reports still drain events
    /// but skip rendering.
    pub fn report_once(&mut self, out: &mut dyn Write) -> Snapshot {
        let events = self.events.drain();
        let snapshot = self.core.snapshot();
        let dropped = self.events.dropped();

        self.summary.reports += 1;
        self.summary.events += events.len() as u64;
        if dropped > self.summary.dropped {
            tracing::warn!(dropped, "event bus full, events dropped");
        }
        self.summary.dropped = dropped;

        if !self.output_failed {
            let frame = ReportFrame {
                elapsed: self.events.elapsed(),
                snapshot: &snapshot,
                events: &events,
                dropped,
            };
            if let Err(err) = self.renderer.render(&frame, out) {
                tracing::warn!(error = %err, "display output failed, rendering disabled");
                self.output_failed = true;
            }
        }
        snapshot
    }

    /// Reports every interval until `shutdown` disconnects, then renders a
    /// final report and returns the totals.
    pub fn run(mut self, shutdown: &Receiver<()>, out: &mut dyn Write) -> ReporterSummary {
        loop {
            match shutdown.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) | Ok(()) => {
                    self.report_once(out);
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.report_once(out);
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::ConsoleRenderer;
    use crate::events::{EventBus, SimEvent};
    use crossbeam_channel::bounded;
    use turnstile_core::TaskRole;

    #[test]
    fn test_report_once_drains_events() {
        let bus = EventBus::new(16);
        let core = Arc::new(SynchronizationCore::with_observer(bus.sender()));
        let reader = core.register(TaskRole::Reader);
        core.with_read(reader, || ());

        let mut reporter = Reporter::new(
            Arc::clone(&core),
            bus.receiver(),
            Box::new(ConsoleRenderer::default()),
            Duration::from_millis(10),
        );
        let mut out = Vec::new();
        let snapshot = reporter.report_once(&mut out);

        assert_eq!(snapshot.reader_sessions, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("first reader #0"));
        assert!(text.contains("last reader #0"));
        assert_eq!(bus.receiver().pending_count(), 0);
    }

    /// Records frame time and the newest event time of each frame.
    struct ClockRecorder(Arc<parking_lot::Mutex<Vec<(Duration, Duration)>>>);

    impl Renderer for ClockRecorder {
        fn render(&mut self, frame: &ReportFrame<'_>, _out: &mut dyn Write) -> std::io::Result<()> {
            let newest = frame.events.iter().map(|e| e.at).max().unwrap_or_default();
            self.0.lock().push((frame.elapsed, newest));
            Ok(())
        }
    }

    #[test]
    fn test_frame_time_shares_event_clock() {
        let bus = EventBus::new(16);
        let core = Arc::new(SynchronizationCore::new());
        let writer = core.register(TaskRole::Writer);

        // Events sent well before the reporter exists still sort before
        // the frame that shows them.
        std::thread::sleep(Duration::from_millis(30));
        bus.sender().send(SimEvent::WantsToWrite { task: writer });

        let frames = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut reporter = Reporter::new(
            core,
            bus.receiver(),
            Box::new(ClockRecorder(Arc::clone(&frames))),
            Duration::from_millis(10),
        );
        reporter.report_once(&mut std::io::sink());

        let frames = frames.lock();
        let (elapsed, newest) = frames[0];
        assert!(newest >= Duration::from_millis(30));
        assert!(elapsed >= newest, "frame at {elapsed:?} shows event from {newest:?}");
    }

    #[test]
    fn test_run_stops_on_disconnect() {
        let bus = EventBus::new(16);
        let core = Arc::new(SynchronizationCore::new());
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let sender = bus.sender();
        sender.send(SimEvent::WantsToWrite {
            task: core.register(TaskRole::Writer),
        });

        let reporter = Reporter::new(
            core,
            bus.receiver(),
            Box::new(ConsoleRenderer::default()),
            Duration::from_millis(5),
        );
        drop(shutdown_tx);

        let mut out = Vec::new();
        let summary = reporter.run(&shutdown_rx, &mut out);
        assert_eq!(summary.reports, 1);
        assert_eq!(summary.events, 1);
        assert_eq!(String::from_utf8(out).unwrap(), "[writer #0] wants to write\n");
    }
}
