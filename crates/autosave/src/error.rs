//! Error types for remote content writes.

use thiserror::Error;

/// Result type alias for `ContentWriter` operations.
pub type WriteResult<T> = Result<T, WriteError>;

/// Errors a `ContentWriter` can report.
///
/// The controller treats every variant the same way: the content is kept in
/// the offline store and the save is reported as failed.
#[derive(Error, Debug)]
pub enum WriteError {
    /// The write never reached the remote side.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote side refused the content.
    #[error("Write rejected: {0}")]
    Rejected(String),

    /// Local I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
