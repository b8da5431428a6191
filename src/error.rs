use thiserror::Error;

use crate::config::ConfigError;

/// Failure raised by a [`LogSink`](crate::metrics::LogSink).
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("sink rejected record: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum PerfLogError {
    /// Raised from `end_operation` after the statistics were already updated.
    #[error("sink failed for probe '{probe}'")]
    Sink {
        probe: String,
        #[source]
        source: SinkError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = PerfLogError> = std::result::Result<T, E>;
