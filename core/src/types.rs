use std::io;
use std::path::PathBuf;

use crate::config::ConfigError;
use crate::headers::HeaderError;
use crate::sink::AttributeError;

/// Unified writer error covering open, format, write, attribute and config failures.
/// - `From<T>` impls enable `?` across the layers.
/// - Messages aim to be stable for logs and telemetry.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Destination could not be created. The active target is untouched.
    #[error("cannot open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Header encode/decode or fixed-size invariant failure.
    #[error("header format error: {0}")]
    Format(#[from] HeaderError),

    /// A write failed or stored zero bytes. `persisted` records of the batch made it out.
    #[error("write failed after {persisted} records: {source}")]
    Write {
        persisted: usize,
        #[source]
        source: io::Error,
    },

    /// Attribute update refused.
    #[error("attribute error: {0}")]
    Attribute(#[from] AttributeError),

    /// Invalid construction parameters.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed batch or call sequence.
    #[error("validation error: {0}")]
    Validation(String),

    /// Flush/close I/O outside the batch write path.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl SinkError {
    /// Records persisted before the failure, when the error came from a batch write.
    pub fn persisted(&self) -> Option<usize> {
        match self {
            SinkError::Write { persisted, .. } => Some(*persisted),
            _ => None,
        }
    }
}
