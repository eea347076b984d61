//! # Simulation Configuration
//!
//! Loaded once at startup from TOML. Every field has a default, so an
//! empty file is a valid config.
//!
//! ```toml
//! readers = 5
//! writers = 2
//! read_ms = 3000
//! write_ms = 4000
//! reader_think = { min_ms = 2000, max_ms = 4000 }
//! writer_think = { min_ms = 4000, max_ms = 7000 }
//! run_for_secs = 30
//! display = "dashboard"
//! color = false
//! ```

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{SimError, SimResult};

/// How the reporter renders what happens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// One line per event.
    #[default]
    Console,
    /// Full-screen panel redrawn every report.
    Dashboard,
    /// Counters header over a rolling window of recent events.
    Log,
}

impl FromStr for DisplayMode {
    type Err = SimError;

    fn from_str(s: &str) -> SimResult<Self> {
        match s {
            "console" => Ok(Self::Console),
            "dashboard" => Ok(Self::Dashboard),
            "log" => Ok(Self::Log),
            other => Err(SimError::InvalidArgument {
                flag: "--display".to_string(),
                reason: format!("unknown display '{other}' (console, dashboard, log)"),
            }),
        }
    }
}

impl fmt::Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Console => "console",
            Self::Dashboard => "dashboard",
            Self::Log => "log",
        })
    }
}

/// Inclusive range of idle time between two sessions of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThinkRange {
    /// Shortest pause in milliseconds.
    pub min_ms: u64,
    /// Longest pause in milliseconds.
    pub max_ms: u64,
}

impl ThinkRange {
    /// Creates a range. Not validated until [`SimConfig::validate`].
    #[must_use]
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }
}

/// Configuration for one simulation run.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimConfig {
    /// Number of reader tasks.
    pub readers: usize,
    /// Number of writer tasks.
    pub writers: usize,
    /// Time a reader spends inside (ms).
    pub read_ms: u64,
    /// Time a writer spends inside (ms).
    pub write_ms: u64,
    /// Idle time between reads.
    pub reader_think: ThinkRange,
    /// Idle time between writes.
    pub writer_think: ThinkRange,
    /// Pause between announcing intent and entering (ms).
    pub announce_ms: u64,
    /// Stop after this many seconds. `None` runs until interrupted.
    pub run_for_secs: Option<u64>,
    /// Reporter period (ms).
    pub report_interval_ms: u64,
    /// Output style.
    pub display: DisplayMode,
    /// ANSI colours for event lines.
    pub color: bool,
    /// Events kept by the rolling log display.
    pub log_capacity: usize,
    /// Capacity of the task -> reporter event channel.
    pub event_capacity: usize,
    /// Seed for think times. `None` seeds from the clock.
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            readers: 5,
            writers: 2,
            read_ms: 3_000,
            write_ms: 4_000,
            reader_think: ThinkRange::new(2_000, 4_000),
            writer_think: ThinkRange::new(4_000, 7_000),
            announce_ms: 1_000,
            run_for_secs: None,
            report_interval_ms: 500,
            display: DisplayMode::Console,
            color: true,
            log_capacity: 12,
            event_capacity: 1024,
            seed: None,
        }
    }
}

impl SimConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`SimError::ConfigParse`] for malformed TOML or unknown keys,
    /// [`SimError::InvalidConfig`] if [`validate`](Self::validate) fails.
    pub fn from_toml_str(source: &str) -> SimResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`SimError::ConfigIo`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| SimError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks the values are usable.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> SimResult<()> {
        if self.readers + self.writers == 0 {
            return Err(SimError::InvalidConfig(
                "at least one reader or writer is required".to_string(),
            ));
        }
        for (name, range) in [
            ("reader_think", self.reader_think),
            ("writer_think", self.writer_think),
        ] {
            if range.min_ms > range.max_ms {
                return Err(SimError::InvalidConfig(format!(
                    "{name}: min_ms {} exceeds max_ms {}",
                    range.min_ms, range.max_ms
                )));
            }
        }
        if self.report_interval_ms == 0 {
            return Err(SimError::InvalidConfig(
                "report_interval_ms must be positive".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(SimError::InvalidConfig(
                "event_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Divides every duration by `factor` for quick demos and tests.
    #[must_use]
    pub fn compressed(mut self, factor: u64) -> Self {
        let factor = factor.max(1);
        self.read_ms /= factor;
        self.write_ms /= factor;
        self.announce_ms /= factor;
        self.reader_think = ThinkRange::new(
            self.reader_think.min_ms / factor,
            self.reader_think.max_ms / factor,
        );
        self.writer_think = ThinkRange::new(
            self.writer_think.min_ms / factor,
            self.writer_think.max_ms / factor,
        );
        self.report_interval_ms = (self.report_interval_ms / factor).max(1);
        self
    }

    /// Time a reader spends inside.
    #[must_use]
    pub const fn read_duration(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }

    /// Time a writer spends inside.
    #[must_use]
    pub const fn write_duration(&self) -> Duration {
        Duration::from_millis(self.write_ms)
    }

    /// Pause between announcing intent and entering.
    #[must_use]
    pub const fn announce_duration(&self) -> Duration {
        Duration::from_millis(self.announce_ms)
    }

    /// Reporter period.
    #[must_use]
    pub const fn report_interval(&self) -> Duration {
        Duration::from_millis(self.report_interval_ms)
    }

    /// Total run time, if bounded.
    #[must_use]
    pub fn run_for(&self) -> Option<Duration> {
        self.run_for_secs.map(Duration::from_secs)
    }
}
