//! Source tracking for readiness correlation.
//!
//! Every registered socket gets a slab slot whose index is its mio `Token`.
//! The slot holds one parked read waiter and one parked write waiter, so a
//! readiness event maps straight to the operations it can unblock.

use crate::error::PosixError;
use mio::Token;
use slab::Slab;
use std::os::unix::io::RawFd;

/// Result of re-attempting a parked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    /// The operation finished and resolved its promise.
    Done,
    /// Still `WouldBlock`; park again.
    Blocked,
}

/// A parked, re-attemptable I/O operation.
pub type Waiter = Box<dyn FnMut() -> Attempt>;

/// Which readiness a waiter needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// A waiter the registry would not accept, handed back so the caller can
/// drop it outside any reactor borrow.
pub struct Rejected {
    pub waiter: Waiter,
    pub reason: PosixError,
}

/// A registered socket and its parked waiters.
pub struct Source {
    fd: RawFd,
    read: Option<Waiter>,
    write: Option<Waiter>,
}

impl Source {
    pub fn fd(&self) -> RawFd {
        self.fd
    }

    fn slot(&mut self, direction: Direction) -> &mut Option<Waiter> {
        match direction {
            Direction::Read => &mut self.read,
            Direction::Write => &mut self.write,
        }
    }
}

/// Registry of sources with O(1) token lookup.
pub struct SourceRegistry {
    sources: Slab<Source>,
}

impl SourceRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            sources: Slab::with_capacity(capacity),
        }
    }

    /// Token the next `insert` will hand out.
    pub fn next_token(&self) -> Token {
        Token(self.sources.vacant_key())
    }

    pub fn insert(&mut self, fd: RawFd) -> Token {
        Token(self.sources.insert(Source {
            fd,
            read: None,
            write: None,
        }))
    }

    /// Remove a source along with any waiters still parked on it.
    pub fn remove(&mut self, token: Token) -> Option<Source> {
        self.sources.try_remove(token.0)
    }

    /// Park `waiter` until `token` reports `direction` readiness.
    ///
    /// Rejects with `EBADF` for an unknown token and `EBUSY` if another
    /// operation is already parked in the same direction.
    pub fn park(
        &mut self,
        token: Token,
        direction: Direction,
        waiter: Waiter,
    ) -> Result<(), Rejected> {
        let source = match self.sources.get_mut(token.0) {
            Some(source) => source,
            None => {
                return Err(Rejected {
                    waiter,
                    reason: PosixError::new(libc::EBADF),
                })
            }
        };
        let slot = source.slot(direction);
        if slot.is_some() {
            return Err(Rejected {
                waiter,
                reason: PosixError::new(libc::EBUSY),
            });
        }
        *slot = Some(waiter);
        Ok(())
    }

    /// Take the waiter parked on `token` for `direction`, if any.
    pub fn take(&mut self, token: Token, direction: Direction) -> Option<Waiter> {
        self.sources.get_mut(token.0)?.slot(direction).take()
    }

    /// Put back a waiter that is still blocked.
    ///
    /// Hands it back if the source is gone or the slot was refilled.
    pub fn restore(&mut self, token: Token, direction: Direction, waiter: Waiter) -> Option<Waiter> {
        match self.sources.get_mut(token.0) {
            Some(source) => {
                let slot = source.slot(direction);
                if slot.is_some() {
                    return Some(waiter);
                }
                *slot = Some(waiter);
                None
            }
            None => Some(waiter),
        }
    }

    /// Number of parked waiters across all sources.
    pub fn parked(&self) -> usize {
        self.sources
            .iter()
            .map(|(_, s)| s.read.is_some() as usize + s.write.is_some() as usize)
            .sum()
    }

    /// Number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Remove every source, returning them for the caller to drop.
    pub fn drain(&mut self) -> Vec<Source> {
        self.sources.drain().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waiter(result: Attempt) -> Waiter {
        Box::new(move || result)
    }

    #[test]
    fn test_insert_and_remove() {
        let mut registry = SourceRegistry::new(4);

        let expected = registry.next_token();
        let t1 = registry.insert(10);
        let t2 = registry.insert(11);
        assert_eq!(t1, expected);
        assert_eq!(registry.len(), 2);

        let removed = registry.remove(t1).unwrap();
        assert_eq!(removed.fd(), 10);
        assert!(registry.remove(t1).is_none());
        assert_eq!(registry.len(), 1);

        // Slab reuses slots
        let t3 = registry.insert(12);
        assert_eq!(t3, t1);
        assert_ne!(t3, t2);
    }

    #[test]
    fn test_park_take_restore() {
        let mut registry = SourceRegistry::new(4);
        let token = registry.insert(3);

        assert!(registry.park(token, Direction::Read, waiter(Attempt::Blocked)).is_ok());
        assert!(registry.park(token, Direction::Write, waiter(Attempt::Done)).is_ok());
        assert_eq!(registry.parked(), 2);

        let mut read = registry.take(token, Direction::Read).unwrap();
        assert_eq!(read(), Attempt::Blocked);
        assert!(registry.take(token, Direction::Read).is_none());
        assert_eq!(registry.parked(), 1);

        assert!(registry.restore(token, Direction::Read, read).is_none());
        assert_eq!(registry.parked(), 2);
    }

    #[test]
    fn test_park_busy_slot_rejected() {
        let mut registry = SourceRegistry::new(4);
        let token = registry.insert(3);

        assert!(registry.park(token, Direction::Read, waiter(Attempt::Done)).is_ok());
        let rejected = registry
            .park(token, Direction::Read, waiter(Attempt::Done))
            .err()
            .unwrap();
        assert_eq!(rejected.reason.code(), libc::EBUSY);
    }

    #[test]
    fn test_park_unknown_token_rejected() {
        let mut registry = SourceRegistry::new(4);
        let rejected = registry
            .park(Token(7), Direction::Write, waiter(Attempt::Done))
            .err()
            .unwrap();
        assert_eq!(rejected.reason.code(), libc::EBADF);
    }

    #[test]
    fn test_restore_after_remove_hands_back() {
        let mut registry = SourceRegistry::new(4);
        let token = registry.insert(3);
        registry.park(token, Direction::Write, waiter(Attempt::Blocked)).ok();
        let w = registry.take(token, Direction::Write).unwrap();

        registry.remove(token);
        assert!(registry.restore(token, Direction::Write, w).is_some());
    }

    #[test]
    fn test_drain() {
        let mut registry = SourceRegistry::new(4);
        registry.insert(1);
        registry.insert(2);
        assert_eq!(registry.drain().len(), 2);
        assert_eq!(registry.len(), 0);
    }
}
