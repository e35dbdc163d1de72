//! Top-level client session: connect, echo, report.

use crate::error::Error;
use crate::net::{ConnectOptions, TcpStream};
use crate::protocols::echo::echo_stream;
use crate::runtime::{Either, Future, Handle, Ready};
use std::io::{self, Write};
use std::net::SocketAddr;
use tracing::debug;

/// Connect to `addr` and echo until the peer closes.
///
/// Resolves to the bytes echoed, or to the connect or I/O error.
pub fn echo_session(
    handle: &Handle,
    addr: SocketAddr,
    options: &ConnectOptions,
    buffer_size: usize,
) -> Future<Result<u64, Error>> {
    type Outcome = Result<u64, Error>;

    TcpStream::connect(handle, addr, options).then(
        move |res| -> Either<Future<Outcome>, Ready<Outcome>> {
            match res {
                Ok(stream) => {
                    debug!(addr = %addr, "Connected");
                    Either::Left(echo_stream(stream, buffer_size))
                }
                Err(e) => Either::Right(Ready::new(Err(e.into()))),
            }
        },
    )
}

/// [`echo_session`] with its outcome reported; failures go to stderr.
pub fn connect_and_echo(
    handle: &Handle,
    addr: SocketAddr,
    options: &ConnectOptions,
    buffer_size: usize,
) -> Future<()> {
    echo_session(handle, addr, options, buffer_size)
        .map(move |outcome| report(addr, &outcome, &mut io::stderr()))
}

/// Write a failed outcome's description and a newline to `out`.
pub fn report<W: Write>(addr: SocketAddr, outcome: &Result<u64, Error>, out: &mut W) {
    match outcome {
        Ok(bytes) => debug!(addr = %addr, bytes, "Session closed"),
        Err(e) => {
            debug!(addr = %addr, error = %e, "Session failed");
            if let Err(write_err) = writeln!(out, "{e}") {
                debug!(error = %write_err, "Failed to report session failure");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PosixError;

    fn addr() -> SocketAddr {
        "127.0.0.1:2222".parse().unwrap()
    }

    #[test]
    fn test_report_success_prints_nothing() {
        let mut out = Vec::new();
        report(addr(), &Ok(12), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn test_report_failure_prints_description() {
        let mut out = Vec::new();
        let err = Error::from(PosixError::new(libc::ECONNREFUSED));
        let expected = format!("{err}\n");

        report(addr(), &Err(err), &mut out);
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    /// Sink whose every write fails.
    struct BrokenPipe {
        attempts: usize,
    }

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            self.attempts += 1;
            Err(io::Error::from_raw_os_error(libc::EPIPE))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_report_survives_failed_write() {
        let mut out = BrokenPipe { attempts: 0 };
        let err = Error::from(PosixError::new(libc::ECONNRESET));

        report(addr(), &Err(err), &mut out);
        assert_eq!(out.attempts, 1);
    }
}
