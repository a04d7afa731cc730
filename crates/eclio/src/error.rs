//! Error types for record files and restart streams

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ecl_data::ArrType;

/// Result type alias for record file operations
pub type Result<T> = std::result::Result<T, EclError>;

/// Errors reading or writing record files
#[derive(Debug, Error)]
pub enum EclError {
    /// Underlying I/O failure
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        /// File being accessed
        path: PathBuf,
        /// OS error
        #[source]
        source: io::Error,
    },

    /// Array names are at most 8 printable ASCII characters, no `'`
    #[error("Array name '{0}' is not at most 8 printable ASCII characters without apostrophes")]
    InvalidName(String),

    /// CHAR elements are at most 8 printable ASCII characters, no `'`
    #[error("CHAR element '{0}' is not at most 8 printable ASCII characters without apostrophes")]
    InvalidString(String),

    /// Element count does not fit a record header
    #[error("Array '{name}' has {len} elements, more than a record header can describe")]
    TooManyElements {
        /// Array name
        name: String,
        /// Element count
        len: usize,
    },

    /// Report step numbers are non-negative
    #[error("Invalid report step {0}")]
    InvalidStep(i32),

    /// An existing file with the unified restart name has no SEQNUM
    #[error(
        "Purported existing unified restart file '{}' does not appear to be a unified restart file",
        .0.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
    )]
    NotUnifiedRestart(PathBuf),

    /// `write` or `message` called with no step open
    #[error("Restart stream is not open, call prepare_step first")]
    StreamNotOpen,

    /// No array with this name
    #[error("Key '{0}' not found")]
    KeyNotFound(String),

    /// Array index past the end of the file index
    #[error("Array index {index} out of range, file has {len} arrays")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of arrays
        len: usize,
    },

    /// Array exists with a different element type
    #[error("Array '{name}' is of type {found}, requested {expected}")]
    TypeMismatch {
        /// Array name
        name: String,
        /// Requested type
        expected: ArrType,
        /// Type on disk
        found: ArrType,
    },

    /// Array data was requested before it was loaded
    #[error("Array '{0}' has not been loaded")]
    NotLoaded(String),

    /// Report step missing from a restart file
    #[error("Report step {0} not found")]
    UnknownStep(i32),

    /// Report step arrays were requested before the step was loaded
    #[error("Report step {0} has not been loaded")]
    StepNotLoaded(i32),

    /// File content does not follow the record format
    #[error("Malformed record file '{}' at offset {offset}: {reason}", path.display())]
    Malformed {
        /// File being read
        path: PathBuf,
        /// Byte offset of the record where decoding failed
        offset: u64,
        /// What was wrong
        reason: String,
    },
}

impl EclError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: &Path, source: io::Error) -> Self {
        EclError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Classify a decoding failure.
    ///
    /// Invalid or truncated content becomes [`EclError::Malformed`]; any
    /// other I/O error stays [`EclError::Io`].
    pub(crate) fn decode(path: &Path, offset: u64, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::InvalidData | io::ErrorKind::UnexpectedEof => EclError::Malformed {
                path: path.to_path_buf(),
                offset,
                reason: source.to_string(),
            },
            _ => EclError::io(path, source),
        }
    }
}

pub(crate) fn invalid_data(reason: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, reason.into())
}
