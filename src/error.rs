//! Error types for streamzip.

use std::io;

use thiserror::Error;

/// Result type for streamzip operations
pub type Result<T> = std::result::Result<T, ZipStreamError>;

/// Everything that can abort reading an archive.
///
/// None of these are recoverable mid-sequence: the underlying byte streams
/// are forward-only, so once a read fails the position of every later record
/// is unknown and the whole output sequence ends with the error.
#[derive(Error, Debug)]
pub enum ZipStreamError {
    /// A required signature did not match, or a stream ended in the middle of
    /// a record.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    /// Scanning backward through the whole source found no usable
    /// end-of-central-directory record.
    #[error("central directory not found")]
    CentralDirectoryNotFound,

    /// The entry uses a compression method other than store or deflate.
    #[error("unsupported compression method {method} for '{path}'")]
    UnsupportedCompression { path: String, method: u16 },

    /// The total size of a remote source could not be determined.
    #[error("source length could not be determined: {0}")]
    MissingLengthMetadata(String),

    /// A range outside of `[0, length)` was requested from a source.
    #[error("invalid byte range {start}-{end} for a source of {length} bytes")]
    InvalidRange { start: u64, end: u64, length: u64 },

    #[error("HTTP request failed with status: {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    /// A batch worker panicked or was cancelled before it finished.
    #[error("batch fetch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ZipStreamError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ZipStreamError::MalformedArchive(msg.into())
    }
}
