//! Error taxonomy for the Ferry protocol core.
//!
//! Hard protocol violations (byte counts that do not reconcile, frames that
//! cannot be decoded, a peer that vanished mid-operation) terminate the
//! current operation and are never retried. `NotFound` and `InvalidLocalFile`
//! are expected outcomes communicated in-band; callers report them and keep
//! the session alive.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A send or receive moved zero bytes before the frame completed.
    #[error("connection broken: {0}")]
    ConnectionBroken(&'static str),

    /// The stream closed before a frame's declared byte count was read.
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: u64, got: u64 },

    /// Fewer bytes were written than the frame declared.
    #[error("short write: expected {expected} bytes, wrote {wrote}")]
    ShortWrite { expected: u64, wrote: u64 },

    /// The peer answered a download request with the not-found status.
    #[error("file {0:?} not found on server")]
    NotFound(String),

    /// The local upload candidate is missing or not a regular file.
    #[error("invalid local file: {}", .0.display())]
    InvalidLocalFile(PathBuf),

    /// An interrupt asked for orderly shutdown between chunk iterations.
    #[error("transfer cancelled")]
    Cancelled,

    /// The peer sent something the codec cannot interpret.
    #[error("bad frame: {0}")]
    BadFrame(String),

    /// Local filesystem failure; the session survives, the operation aborts.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Expected in-band outcomes that leave the session usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::InvalidLocalFile(_) | Error::Io(_)
        )
    }
}
