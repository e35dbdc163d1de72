//! Non-blocking TCP stream driven by the reactor.
//!
//! Every operation is attempted immediately. Only `WouldBlock` parks it in
//! the reactor, which re-attempts it when the socket reports readiness. The
//! parked operation holds its own handles to the socket and buffer, so the
//! stream's owner can live anywhere (typically a scoped binding).

use crate::error::{PosixError, PosixResult};
use crate::runtime::{Attempt, Direction, Future, Handle, IoBuf, Promise, Waiter};
use mio::Token;
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::ops::Range;
use std::os::unix::io::AsRawFd;
use std::rc::Rc;
use tracing::{debug, error, trace};

/// Asynchronous byte stream.
///
/// `read` resolving to `Ok(0)` means the peer closed. `write` may be short.
pub trait Transport: 'static {
    /// Read up to `max_len` bytes into the front of `buf`.
    fn read(&self, buf: &IoBuf, max_len: usize) -> Future<PosixResult<usize>>;

    /// Write the bytes of `buf` in `range`.
    fn write(&self, buf: &IoBuf, range: Range<usize>) -> Future<PosixResult<usize>>;
}

/// Socket options applied before connecting.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConnectOptions {
    /// Disable Nagle's algorithm.
    pub nodelay: bool,
}

/// A connected TCP socket registered with a reactor.
///
/// Dropping it deregisters the socket and discards parked operations. The
/// descriptor closes once the last in-flight operation lets go of it.
pub struct TcpStream {
    socket: Rc<mio::net::TcpStream>,
    token: Token,
    handle: Handle,
}

impl TcpStream {
    /// Start connecting to `addr`.
    ///
    /// Resolves once the handshake completes or fails.
    pub fn connect(
        handle: &Handle,
        addr: SocketAddr,
        options: &ConnectOptions,
    ) -> Future<PosixResult<TcpStream>> {
        let stream = match start_connect(handle, addr, options) {
            Ok(stream) => stream,
            Err(e) => {
                debug!(addr = %addr, error = %e, "Connect failed immediately");
                return Future::ready(Err(e));
            }
        };

        match stream.poll_connected() {
            Some(Ok(())) => return Future::ready(Ok(stream)),
            Some(Err(e)) => return Future::ready(Err(e)),
            None => {}
        }

        trace!(addr = %addr, "Connect in progress");

        let (promise, future) = Promise::new();
        let handle = stream.handle.clone();
        let token = stream.token;
        let mut pending = Some(stream);

        let waiter: Waiter = Box::new(move || {
            let stream = match pending.take() {
                Some(stream) => stream,
                None => return Attempt::Done,
            };
            match stream.poll_connected() {
                None => {
                    pending = Some(stream);
                    Attempt::Blocked
                }
                Some(result) => {
                    // On failure the stream drops here and deregisters itself
                    let outcome = result.map(|()| stream);
                    if let Err(e) = promise.resolve(outcome) {
                        error!(error = %e, "Connect resolved twice");
                    }
                    Attempt::Done
                }
            }
        });

        match handle.park(token, Direction::Write, waiter) {
            Ok(()) => future,
            Err(e) => Future::ready(Err(e)),
        }
    }

    /// Adopt an already-connected std stream.
    pub fn from_std(handle: &Handle, stream: std::net::TcpStream) -> PosixResult<TcpStream> {
        stream.set_nonblocking(true)?;
        let socket = mio::net::TcpStream::from_std(stream);
        let token = handle.register(socket.as_raw_fd())?;
        Ok(TcpStream {
            socket: Rc::new(socket),
            token,
            handle: handle.clone(),
        })
    }

    pub fn local_addr(&self) -> PosixResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn peer_addr(&self) -> PosixResult<SocketAddr> {
        Ok(self.socket.peer_addr()?)
    }

    /// `None` while the handshake is still in flight.
    fn poll_connected(&self) -> Option<PosixResult<()>> {
        match self.socket.take_error() {
            Ok(Some(e)) | Err(e) => return Some(Err(e.into())),
            Ok(None) => {}
        }
        match self.socket.peer_addr() {
            Ok(_) => Some(Ok(())),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => None,
            Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => None,
            Err(e) => Some(Err(e.into())),
        }
    }

    fn park_op<F>(&self, direction: Direction, mut attempt: F) -> Future<PosixResult<usize>>
    where
        F: FnMut() -> Option<PosixResult<usize>> + 'static,
    {
        let (promise, future) = Promise::new();
        let waiter: Waiter = Box::new(move || match attempt() {
            None => Attempt::Blocked,
            Some(result) => {
                if let Err(e) = promise.resolve(result) {
                    error!(error = %e, "I/O operation resolved twice");
                }
                Attempt::Done
            }
        });

        match self.handle.park(self.token, direction, waiter) {
            Ok(()) => future,
            Err(e) => Future::ready(Err(e)),
        }
    }
}

impl Transport for TcpStream {
    fn read(&self, buf: &IoBuf, max_len: usize) -> Future<PosixResult<usize>> {
        if let Some(result) = try_read(&self.socket, buf, max_len) {
            return Future::ready(result);
        }
        let socket = Rc::clone(&self.socket);
        let buf = buf.clone();
        self.park_op(Direction::Read, move || try_read(&socket, &buf, max_len))
    }

    fn write(&self, buf: &IoBuf, range: Range<usize>) -> Future<PosixResult<usize>> {
        if range.end > buf.len() || range.start > range.end {
            return Future::ready(Err(PosixError::new(libc::EINVAL)));
        }
        if let Some(result) = try_write(&self.socket, buf, range.clone()) {
            return Future::ready(result);
        }
        let socket = Rc::clone(&self.socket);
        let buf = buf.clone();
        self.park_op(Direction::Write, move || {
            try_write(&socket, &buf, range.clone())
        })
    }
}

impl Drop for TcpStream {
    fn drop(&mut self) {
        self.handle.deregister(self.token);
        trace!(token = self.token.0, "Stream dropped");
    }
}

fn start_connect(
    handle: &Handle,
    addr: SocketAddr,
    options: &ConnectOptions,
) -> PosixResult<TcpStream> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nonblocking(true)?;
    if options.nodelay {
        socket.set_nodelay(true)?;
    }

    match socket.connect(&SockAddr::from(addr)) {
        Ok(()) => {}
        Err(e) if e.raw_os_error() == Some(libc::EINPROGRESS) => {}
        Err(e) => return Err(e.into()),
    }

    TcpStream::from_std(handle, socket.into())
}

/// `None` means `WouldBlock`.
fn try_read(socket: &mio::net::TcpStream, buf: &IoBuf, max_len: usize) -> Option<PosixResult<usize>> {
    loop {
        let res = buf.with_mut(|bytes| {
            let n = max_len.min(bytes.len());
            (&*socket).read(&mut bytes[..n])
        });
        match res {
            Ok(n) => return Some(Ok(n)),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return None,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Some(Err(e.into())),
        }
    }
}

/// `None` means `WouldBlock`.
fn try_write(
    socket: &mio::net::TcpStream,
    buf: &IoBuf,
    range: Range<usize>,
) -> Option<PosixResult<usize>> {
    loop {
        let res = buf.with(|bytes| (&*socket).write(&bytes[range.clone()]));
        match res {
            Ok(n) => return Some(Ok(n)),
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return None,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Some(Err(e.into())),
        }
    }
}
