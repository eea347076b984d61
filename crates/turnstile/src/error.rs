//! # Simulator Error Types

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while configuring or running a simulation.
#[derive(Error, Debug)]
pub enum SimError {
    /// Config file could not be read.
    #[error("cannot read config {path}: {source}")]
    ConfigIo {
        /// File that failed.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`SimConfig`](crate::SimConfig).
    #[error("cannot parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Config values are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A command line argument could not be used.
    #[error("invalid argument {flag}: {reason}")]
    InvalidArgument {
        /// The flag.
        flag: String,
        /// What was wrong with it.
        reason: String,
    },

    /// An OS thread could not be spawned.
    #[error("cannot spawn {name}: {source}")]
    Spawn {
        /// Thread name.
        name: String,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// A task or the reporter panicked.
    #[error("thread {0} panicked")]
    TaskPanicked(String),
}

/// Result type for simulator operations.
pub type SimResult<T> = Result<T, SimError>;
