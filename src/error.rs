//! Error types for aura-fs

use std::io;
use thiserror::Error;

/// Error type for aura-fs operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error reported by the kernel
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Proactor creation failed
    #[error("Failed to create engine: {0}")]
    EngineCreate(#[source] io::Error),

    /// Operation was cancelled by the kernel
    #[error("Operation cancelled")]
    Cancelled,

    /// The file already owns an open descriptor
    #[error("File is already open")]
    AlreadyOpen,

    /// The file was closed and cannot be opened again
    #[error("File has been closed")]
    Closed,

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),
}

/// Result type alias for aura-fs operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error from a raw errno value (the negation of a completion result)
    pub fn from_raw_os_error(code: i32) -> Self {
        if code == libc::ECANCELED {
            Error::Cancelled
        } else {
            Error::Io(io::Error::from_raw_os_error(code))
        }
    }

    /// Convert a raw completion result into a byte count or descriptor.
    ///
    /// Negative values carry a negated errno.
    pub fn from_completion(res: i32) -> Result<usize> {
        if res < 0 {
            // wrapping_neg keeps i32::MIN from overflowing; it maps to EIO below
            let errno = res.wrapping_neg();
            Err(Error::from_raw_os_error(if errno > 0 { errno } else { libc::EIO }))
        } else {
            Ok(res as usize)
        }
    }

    /// The underlying OS error code, if there is one
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Io(e) | Error::EngineCreate(e) => e.raw_os_error(),
            Error::Cancelled => Some(libc::ECANCELED),
            Error::AlreadyOpen | Error::Closed | Error::InvalidArgument(_) => None,
        }
    }
}
