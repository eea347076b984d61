//! # TURNSTILE
//!
//! Readers-writers simulator built on [`turnstile_core`].
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          TURNSTILE SIMULATOR                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐   │
//! │  │   Task threads  │────>│   Core          │     │   Reporter      │   │
//! │  │                 │     │                 │<────│                 │   │
//! │  │  • think        │     │  • counter      │     │  • snapshot     │   │
//! │  │  • enter / exit │     │  • gate         │     │  • drain events │   │
//! │  │  • work         │     │  • turnstile    │     │  • render       │   │
//! │  └────────┬────────┘     └────────┬────────┘     └────────▲────────┘   │
//! │           │                       │                       │            │
//! │           │              ┌────────▼────────┐              │            │
//! │           └─────────────>│   Event bus     │──────────────┘            │
//! │                          └─────────────────┘                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: TOML run configuration
//! - `driver`: task threads and run orchestration
//! - `events`: task and core events, bounded bus
//! - `reporter`: periodic snapshot + render
//! - `display`: console, dashboard and log renderers

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod display;
pub mod driver;
pub mod error;
pub mod events;
pub mod reporter;

pub use turnstile_core as core;

pub use config::{DisplayMode, SimConfig, ThinkRange};
pub use display::{
    event_color, renderer_for, ConsoleRenderer, DashboardRenderer, EventLogRenderer, Renderer,
    ReportFrame,
};
pub use driver::{SimReport, Simulation, StopHandle};
pub use error::{SimError, SimResult};
pub use events::{EventBus, EventReceiver, EventSender, SimEvent, TimedEvent};
pub use reporter::{Reporter, ReporterSummary};
