//! Single-threaded readiness reactor.
//!
//! Readiness-based model: operations are attempted eagerly and only park in
//! the reactor after `WouldBlock`. `poll` tells us which sources became
//! ready; each parked waiter for that readiness is taken out and re-attempted.
//! A waiter that completes resolves its promise, which runs the attached
//! continuations right there, and those may park further waiters.
//!
//! Uses epoll on Linux and kqueue on macOS via mio. Sources are registered
//! once, edge-triggered, for both directions.
//!
//! The internal `RefCell` is never borrowed while a waiter runs or is dropped,
//! so continuations are free to register, park and drop streams.

use super::future::{Future, Promise};
use super::token::{Attempt, Direction, SourceRegistry, Waiter};
use crate::error::{Error, PosixResult};
use mio::event::Event;
use mio::unix::SourceFd;
use mio::{Events, Interest, Poll, Token};
use std::cell::{Cell, RefCell};
use std::io;
use std::os::unix::io::RawFd;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, error, trace, warn};

/// Default event batch size per poll.
pub const DEFAULT_EVENTS: usize = 1024;

struct Core {
    poll: Poll,
    events: Events,
    sources: SourceRegistry,
}

/// Cloneable reference to a reactor, passed explicitly to whatever needs to
/// register I/O.
#[derive(Clone)]
pub struct Handle {
    core: Rc<RefCell<Core>>,
}

impl Handle {
    /// Register `fd` for read and write readiness.
    pub fn register(&self, fd: RawFd) -> PosixResult<Token> {
        let mut core = self.core.borrow_mut();
        let Core { poll, sources, .. } = &mut *core;

        let token = sources.next_token();
        poll.registry().register(
            &mut SourceFd(&fd),
            token,
            Interest::READABLE | Interest::WRITABLE,
        )?;
        let inserted = sources.insert(fd);
        debug_assert_eq!(inserted, token);

        trace!(fd, token = token.0, "Registered source");
        Ok(token)
    }

    /// Deregister a source and drop any waiters still parked on it.
    ///
    /// `fd` must still be open.
    pub fn deregister(&self, token: Token) {
        let removed = {
            let mut core = self.core.borrow_mut();
            let Core { poll, sources, .. } = &mut *core;
            let removed = sources.remove(token);
            if let Some(source) = &removed {
                if let Err(e) = poll.registry().deregister(&mut SourceFd(&source.fd())) {
                    debug!(fd = source.fd(), error = %e, "Deregister failed");
                }
                trace!(fd = source.fd(), token = token.0, "Deregistered source");
            }
            removed
        };
        // Parked waiters may own streams whose drop re-enters the reactor
        drop(removed);
    }

    /// Park `waiter` until `token` is ready in `direction`.
    pub fn park(&self, token: Token, direction: Direction, waiter: Waiter) -> PosixResult<()> {
        let parked = self.core.borrow_mut().sources.park(token, direction, waiter);
        match parked {
            Ok(()) => Ok(()),
            Err(rejected) => {
                let reason = rejected.reason;
                drop(rejected.waiter);
                Err(reason)
            }
        }
    }

    /// Number of parked waiters.
    pub fn parked(&self) -> usize {
        self.core.borrow().sources.parked()
    }
}

/// Readiness directions carried by one event.
#[derive(Debug, Clone, Copy)]
struct Readiness {
    read: bool,
    write: bool,
}

impl Readiness {
    fn of(event: &Event) -> Self {
        // Errors and hangups wake both sides; the retried syscall reports them.
        Self {
            read: event.is_readable() || event.is_read_closed() || event.is_error(),
            write: event.is_writable() || event.is_write_closed() || event.is_error(),
        }
    }
}

/// The event loop: owns the poller and tracks top-level futures.
pub struct Reactor {
    handle: Handle,
    outstanding: Rc<Cell<usize>>,
}

impl Reactor {
    /// Create a reactor with the default event batch size.
    pub fn new() -> Result<Self, Error> {
        Self::with_capacity(DEFAULT_EVENTS)
    }

    /// Create a reactor that handles up to `events` readiness events per poll.
    pub fn with_capacity(events: usize) -> Result<Self, Error> {
        let poll = Poll::new().map_err(Error::ReactorInit)?;
        let core = Core {
            poll,
            events: Events::with_capacity(events),
            sources: SourceRegistry::new(64),
        };

        debug!(events, "Reactor created");

        Ok(Self {
            handle: Handle {
                core: Rc::new(RefCell::new(core)),
            },
            outstanding: Rc::new(Cell::new(0)),
        })
    }

    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Track a top-level future until it resolves.
    pub fn add(&self, future: Future<()>) {
        self.outstanding.set(self.outstanding.get() + 1);
        let outstanding = Rc::clone(&self.outstanding);
        future.on_ready(move |()| outstanding.set(outstanding.get() - 1));
    }

    /// Number of added futures that have not resolved yet.
    pub fn outstanding(&self) -> usize {
        self.outstanding.get()
    }

    /// Poll and dispatch until every added future has resolved.
    ///
    /// Also returns if futures are outstanding but nothing is parked, since
    /// no readiness event could ever resolve them.
    pub fn run(&self) -> Result<(), Error> {
        while self.outstanding.get() > 0 {
            if self.handle.parked() == 0 {
                warn!(
                    outstanding = self.outstanding.get(),
                    "Nothing parked in reactor; stopping with unresolved futures"
                );
                break;
            }
            self.turn(None)?;
        }
        Ok(())
    }

    /// Run until `future` resolves and return its value.
    ///
    /// Fails with [`Error::InvalidAccess`] if the reactor runs dry first.
    pub fn block_on<T: 'static>(&self, future: Future<T>) -> Result<T, Error> {
        let (promise, result) = Promise::new();
        self.add(future.map(move |value| {
            if let Err(e) = promise.resolve(value) {
                error!(error = %e, "block_on result resolved twice");
            }
        }));
        self.run()?;
        result.into_value()
    }

    /// One poll-dispatch cycle. Returns the number of events handled.
    pub fn turn(&self, timeout: Option<Duration>) -> Result<usize, Error> {
        let ready: Vec<(Token, Readiness)> = {
            let mut core = self.handle.core.borrow_mut();
            let Core { poll, events, .. } = &mut *core;
            match poll.poll(events, timeout) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => return Ok(0),
                Err(e) => return Err(Error::Poll(e)),
            }
            events
                .iter()
                .map(|event| (event.token(), Readiness::of(event)))
                .collect()
        };

        for &(token, readiness) in &ready {
            if readiness.read {
                self.dispatch(token, Direction::Read);
            }
            if readiness.write {
                self.dispatch(token, Direction::Write);
            }
        }

        Ok(ready.len())
    }

    fn dispatch(&self, token: Token, direction: Direction) {
        let waiter = self.handle.core.borrow_mut().sources.take(token, direction);
        let mut waiter = match waiter {
            Some(waiter) => waiter,
            None => return,
        };

        match waiter() {
            Attempt::Done => {
                trace!(token = token.0, ?direction, "Operation completed");
            }
            Attempt::Blocked => {
                let leftover = self
                    .handle
                    .core
                    .borrow_mut()
                    .sources
                    .restore(token, direction, waiter);
                drop(leftover);
            }
        }
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        let sources = {
            let mut core = self.handle.core.borrow_mut();
            let registered = core.sources.len();
            if registered > 0 {
                debug!(count = registered, "Dropping sources still registered");
            }
            core.sources.drain()
        };
        drop(sources);
    }
}
