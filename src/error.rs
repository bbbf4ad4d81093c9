//! Errors raised at the cursor boundary.
//!
//! Engine internals report failures through [`Status`]. A cursor turns those
//! into [`Error::Storage`], and adds the misuse errors that only make sense
//! for a closable, asynchronously positioned resource.

use thiserror::Error;

use crate::util::Status;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The operation is not allowed in the cursor's current state: it was
    /// closed, it is not positioned on an entry, or a positioning task is
    /// still in flight.
    #[error("Illegal state: {0}")]
    IllegalState(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure reported by the storage engine.
    #[error("Storage error: {0}")]
    Storage(#[from] Status),

    /// The worker running a positioning task panicked.
    #[error("Positioning task aborted")]
    Aborted,
}

impl Error {
    pub fn is_illegal_state(&self) -> bool {
        matches!(self, Error::IllegalState(_))
    }

    /// Engine status carried by a storage error.
    pub fn status(&self) -> Option<&Status> {
        match self {
            Error::Storage(status) => Some(status),
            _ => None,
        }
    }
}
