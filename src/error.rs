//! Error types for the reactor and the echo client.
//!
//! I/O operations report failures as values (`PosixResult`) handed to the
//! continuation that consumes them. Everything above the syscall layer uses
//! the crate-wide [`Error`].

use std::fmt;
use std::io;
use thiserror::Error;

/// Result of a single non-blocking I/O operation.
pub type PosixResult<T> = std::result::Result<T, PosixError>;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// An OS-level error code (`errno`).
///
/// A code of zero is [`PosixError::OK`] and means success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PosixError(i32);

impl PosixError {
    /// The success code.
    pub const OK: PosixError = PosixError(0);

    /// Wrap a raw `errno` value.
    pub const fn new(code: i32) -> Self {
        PosixError(code)
    }

    /// The raw `errno` value.
    pub fn code(&self) -> i32 {
        self.0
    }

    /// True if this carries a failure code.
    pub fn is_err(&self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for PosixError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("Success");
        }
        write!(f, "{}", io::Error::from_raw_os_error(self.0))
    }
}

impl std::error::Error for PosixError {}

impl From<io::Error> for PosixError {
    fn from(e: io::Error) -> Self {
        // Synthetic io errors carry no errno; EIO is the closest fit.
        PosixError(e.raw_os_error().unwrap_or(libc::EIO))
    }
}

/// Errors surfaced by the runtime and the echo session.
#[derive(Debug, Error)]
pub enum Error {
    /// A socket operation failed.
    #[error("{0}")]
    Posix(#[from] PosixError),

    /// The OS polling primitive could not be created.
    #[error("failed to create reactor: {0}")]
    ReactorInit(#[source] io::Error),

    /// Polling for readiness failed.
    #[error("reactor poll failed: {0}")]
    Poll(#[source] io::Error),

    /// A value was read from a future that has not resolved.
    #[error("value accessed before it was available")]
    InvalidAccess,

    /// A promise was resolved a second time.
    #[error("future resolved twice")]
    DoubleResolve,

    /// A scoped value was accessed after its binding released it.
    #[error("scoped value accessed after release")]
    ScopeReleased,

    /// A write of a non-empty range made no progress.
    #[error("write returned zero bytes")]
    WriteZero,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posix_error_ok() {
        assert!(!PosixError::OK.is_err());
        assert_eq!(PosixError::OK.to_string(), "Success");
    }

    #[test]
    fn test_posix_error_from_io() {
        let e = PosixError::from(io::Error::from_raw_os_error(libc::ECONNREFUSED));
        assert!(e.is_err());
        assert_eq!(e.code(), libc::ECONNREFUSED);
        assert!(e.to_string().contains("refused"));

        let synthetic = PosixError::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(synthetic.code(), libc::EIO);
    }

    #[test]
    fn test_error_wraps_posix_description() {
        let err = Error::from(PosixError::new(libc::ECONNRESET));
        assert_eq!(
            err.to_string(),
            io::Error::from_raw_os_error(libc::ECONNRESET).to_string()
        );
    }
}
