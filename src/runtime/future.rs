//! Single-assignment futures with one attachable continuation.
//!
//! A [`Promise`] is the write side and a [`Future`] the read side of the same
//! cell. Attaching a continuation to a resolved future runs it on the spot;
//! attaching to a pending one parks it until [`Promise::resolve`] is called,
//! at which point it runs on the resolver's stack.
//!
//! Errors are never propagated implicitly. I/O futures resolve to a
//! `PosixResult`, and each continuation decides what to do with it.

use crate::error::Error;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use tracing::error;

type Continuation<T> = Box<dyn FnOnce(T)>;

struct Slot<T> {
    /// Value parked until a continuation is attached.
    value: Option<T>,
    /// Continuation parked until the value arrives.
    continuation: Option<Continuation<T>>,
    resolved: bool,
}

/// Write side of a [`Future`].
pub struct Promise<T> {
    slot: Rc<RefCell<Slot<T>>>,
}

impl<T: 'static> Promise<T> {
    /// Create a connected promise/future pair.
    pub fn new() -> (Promise<T>, Future<T>) {
        let slot = Rc::new(RefCell::new(Slot {
            value: None,
            continuation: None,
            resolved: false,
        }));
        let future = Future {
            state: State::Pending(Rc::clone(&slot)),
        };
        (Promise { slot }, future)
    }

    /// Assign the value, running the attached continuation if there is one.
    ///
    /// Returns [`Error::DoubleResolve`] if the cell already holds a value.
    pub fn resolve(&self, value: T) -> Result<(), Error> {
        let continuation = {
            let mut slot = self.slot.borrow_mut();
            if slot.resolved {
                return Err(Error::DoubleResolve);
            }
            slot.resolved = true;
            match slot.continuation.take() {
                Some(continuation) => continuation,
                None => {
                    slot.value = Some(value);
                    return Ok(());
                }
            }
        };
        continuation(value);
        Ok(())
    }

    pub fn is_resolved(&self) -> bool {
        self.slot.borrow().resolved
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("resolved", &self.slot.borrow().resolved)
            .finish()
    }
}

enum State<T> {
    Ready(T),
    Pending(Rc<RefCell<Slot<T>>>),
}

/// A value that is available now or will be assigned later.
///
/// `then`, `map` and `on_ready` consume the future, so at most one
/// continuation is ever attached.
#[must_use = "a future does nothing unless a continuation is attached or it is added to a reactor"]
pub struct Future<T> {
    state: State<T>,
}

impl<T: 'static> Future<T> {
    /// A future that is already resolved.
    pub fn ready(value: T) -> Self {
        Future {
            state: State::Ready(value),
        }
    }

    pub fn is_resolved(&self) -> bool {
        match &self.state {
            State::Ready(_) => true,
            State::Pending(slot) => slot.borrow().value.is_some(),
        }
    }

    /// Take the value if it has arrived, otherwise hand the future back.
    pub fn try_take(self) -> Result<T, Self> {
        match self.state {
            State::Ready(value) => Ok(value),
            State::Pending(slot) => {
                let value = slot.borrow_mut().value.take();
                match value {
                    Some(value) => Ok(value),
                    None => Err(Future {
                        state: State::Pending(slot),
                    }),
                }
            }
        }
    }

    /// Take the value, failing with [`Error::InvalidAccess`] if it has not
    /// arrived yet.
    pub fn into_value(self) -> Result<T, Error> {
        self.try_take().map_err(|_| Error::InvalidAccess)
    }

    /// Attach a terminal continuation.
    pub fn on_ready<F>(self, f: F)
    where
        F: FnOnce(T) + 'static,
    {
        let slot = match self.state {
            State::Ready(value) => return f(value),
            State::Pending(slot) => slot,
        };
        let value = slot.borrow_mut().value.take();
        match value {
            Some(value) => f(value),
            None => {
                let mut slot = slot.borrow_mut();
                debug_assert!(slot.continuation.is_none());
                slot.continuation = Some(Box::new(f));
            }
        }
    }

    /// Chain a continuation producing the next future-like value.
    ///
    /// Runs `f` immediately when this future is already resolved.
    pub fn then<U, D, F>(self, f: F) -> Future<U>
    where
        U: 'static,
        D: Deferred<Output = U>,
        F: FnOnce(T) -> D + 'static,
    {
        match self.try_take() {
            Ok(value) => f(value).into_future(),
            Err(pending) => {
                let (promise, future) = Promise::new();
                pending.on_ready(move |value| f(value).into_future().forward(promise));
                future
            }
        }
    }

    pub fn map<U, F>(self, f: F) -> Future<U>
    where
        U: 'static,
        F: FnOnce(T) -> U + 'static,
    {
        self.then(move |value| Ready::new(f(value)))
    }

    /// Resolve `promise` with this future's value once it arrives.
    pub(crate) fn forward(self, promise: Promise<T>) {
        self.on_ready(move |value| {
            if let Err(e) = promise.resolve(value) {
                error!(error = %e, "forwarded into a resolved promise");
            }
        });
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved = match &self.state {
            State::Ready(_) => true,
            State::Pending(slot) => slot.borrow().value.is_some(),
        };
        f.debug_struct("Future").field("resolved", &resolved).finish()
    }
}

/// A value that is known up front but travels where a future is expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ready<T>(T);

impl<T> Ready<T> {
    pub fn new(value: T) -> Self {
        Ready(value)
    }

    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Anything that can stand in for a [`Future`]: what a continuation returns
/// and what each arm of an `Either` holds.
pub trait Deferred: Sized + 'static {
    type Output: 'static;

    fn is_resolved(&self) -> bool;

    fn into_future(self) -> Future<Self::Output>;

    fn then<U, D, F>(self, f: F) -> Future<U>
    where
        U: 'static,
        D: Deferred<Output = U>,
        F: FnOnce(Self::Output) -> D + 'static,
    {
        self.into_future().then(f)
    }

    fn map<U, F>(self, f: F) -> Future<U>
    where
        U: 'static,
        F: FnOnce(Self::Output) -> U + 'static,
    {
        self.into_future().map(f)
    }
}

impl<T: 'static> Deferred for Future<T> {
    type Output = T;

    fn is_resolved(&self) -> bool {
        Future::is_resolved(self)
    }

    fn into_future(self) -> Future<T> {
        self
    }
}

impl<T: 'static> Deferred for Ready<T> {
    type Output = T;

    fn is_resolved(&self) -> bool {
        true
    }

    fn into_future(self) -> Future<T> {
        Future::ready(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_ready_runs_continuation_immediately() {
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);

        let out = Future::ready(2).map(move |v| {
            flag.set(true);
            v * 21
        });

        assert!(ran.get());
        assert_eq!(out.into_value().unwrap(), 42);
    }

    #[test]
    fn test_pending_runs_on_resolve() {
        let (promise, future) = Promise::new();
        let seen = Rc::new(Cell::new(0));
        let sink = Rc::clone(&seen);

        let out = future.map(move |v: u32| {
            sink.set(sink.get() + 1);
            v + 1
        });
        assert!(!out.is_resolved());
        assert_eq!(seen.get(), 0);

        promise.resolve(9).unwrap();
        assert_eq!(seen.get(), 1);
        assert_eq!(out.into_value().unwrap(), 10);
    }

    #[test]
    fn test_resolve_before_attach() {
        let (promise, future) = Promise::new();
        promise.resolve("early").unwrap();
        assert!(future.is_resolved());

        let out = future.then(|v| Future::ready(v.len()));
        assert_eq!(out.into_value().unwrap(), 5);
    }

    #[test]
    fn test_double_resolve_rejected() {
        let (promise, future) = Promise::new();
        promise.resolve(1).unwrap();
        assert!(promise.is_resolved());
        assert!(matches!(promise.resolve(2), Err(Error::DoubleResolve)));

        // The first value wins
        assert_eq!(future.into_value().unwrap(), 1);
    }

    #[test]
    fn test_double_resolve_after_continuation_ran() {
        let (promise, future) = Promise::new();
        let total = Rc::new(Cell::new(0));
        let sink = Rc::clone(&total);
        future.on_ready(move |v| sink.set(sink.get() + v));

        promise.resolve(5).unwrap();
        assert!(matches!(promise.resolve(7), Err(Error::DoubleResolve)));
        assert_eq!(total.get(), 5);
    }

    #[test]
    fn test_into_value_pending_is_invalid_access() {
        let (_promise, future) = Promise::<u8>::new();
        assert!(matches!(future.into_value(), Err(Error::InvalidAccess)));
    }

    #[test]
    fn test_then_flattens_nested_pending() {
        let (outer, outer_future) = Promise::new();
        let (inner, inner_future) = Promise::new();

        let out = outer_future.then(move |a: u32| inner_future.map(move |b: u32| a + b));

        outer.resolve(1).unwrap();
        assert!(!out.is_resolved());
        inner.resolve(2).unwrap();
        assert_eq!(out.into_value().unwrap(), 3);
    }

    #[test]
    fn test_dropped_promise_drops_continuation() {
        let marker = Rc::new(());
        let held = Rc::clone(&marker);
        let (promise, future) = Promise::<()>::new();
        future.on_ready(move |_| drop(held));

        assert_eq!(Rc::strong_count(&marker), 2);
        drop(promise);
        assert_eq!(Rc::strong_count(&marker), 1);
    }

    #[test]
    fn test_ready_is_deferred() {
        let ready = Ready::new(3);
        assert!(Deferred::is_resolved(&ready));
        let out = Deferred::map(ready, |v| v * 2);
        assert_eq!(out.into_value().unwrap(), 6);
    }
}
