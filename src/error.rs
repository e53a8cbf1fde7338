//! Error type shared by buffers, synchronizers, pipelines and analysis
//!
//! Configuration errors are detected when a component is set up and are
//! fatal for that component. [`Error::Underrun`] is transient and handled by
//! waiting; [`Error::Overflow`] means data would be lost and is always fatal.

use std::time::Duration;

use thiserror::Error;

use crate::pipeline::Lifecycle;

/// Errors reported by this crate
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration (rates, frame sizes, window lengths, options)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Write would overwrite samples not yet consumed by the slowest reader
    #[error(
        "buffer overflow: writing {requested} samples at position {position} \
         would overrun reader at {reader} (capacity {capacity})"
    )]
    Overflow {
        /// Number of samples in the rejected batch
        requested: usize,
        /// Write position before the rejected batch
        position: u64,
        /// Minimum read cursor of all registered readers
        reader: u64,
        /// Buffer capacity in samples
        capacity: usize,
    },

    /// Requested window extends past the current write position
    #[error("underrun: window {start}+{count} not yet written (write position {written})")]
    Underrun {
        /// First requested sample index
        start: u64,
        /// Number of requested samples
        count: usize,
        /// Write position at the time of the request
        written: u64,
    },

    /// Requested window starts before the oldest retained sample
    #[error("window {start}+{count} no longer available (oldest retained sample {oldest})")]
    NotAvailable {
        /// First requested sample index
        start: u64,
        /// Number of requested samples
        count: usize,
        /// Oldest sample index still held by the buffer
        oldest: u64,
    },

    /// Waiting for input data took longer than allowed
    #[error("timed out after {0:?} waiting for input")]
    Timeout(Duration),

    /// Buffer was released (flushed) while being used
    #[error("stream closed")]
    Closed,

    /// Malformed input data (e.g. batch not a multiple of the dimension)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Illegal lifecycle transition
    #[error("illegal lifecycle transition from {from:?} to {to:?}")]
    Lifecycle {
        /// Current state
        from: Lifecycle,
        /// Requested state
        to: Lifecycle,
    },

    /// Named options could not be converted into a configuration struct
    #[error("invalid options: {0}")]
    Options(#[from] serde_json::Error),

    /// Component task panicked or was aborted
    #[error("component task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl Error {
    /// True for errors that only mean "not yet", i.e. waiting may resolve them
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Underrun { .. })
    }
}

/// Result type used throughout this crate
pub type Result<T> = std::result::Result<T, Error>;

pub(crate) fn config_error(msg: impl Into<String>) -> Error {
    Error::Config(msg.into())
}
