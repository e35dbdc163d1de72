//! Scoped binding: tie a value's lifetime to an asynchronous chain.
//!
//! [`do_with`] owns the value and gives the chain a [`Scope`], a non-owning
//! handle. The owner lives in the chain's terminal continuation and is
//! dropped exactly once, right before the chain's result is passed on.

use super::future::Future;
use crate::error::Error;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Non-owning access to a value bound by [`do_with`].
pub struct Scope<V> {
    value: Weak<RefCell<V>>,
}

impl<V> Scope<V> {
    /// Run `f` against the bound value.
    ///
    /// Fails with [`Error::ScopeReleased`] once the binding has dropped it.
    /// Calls must not nest on the same scope.
    pub fn with<R>(&self, f: impl FnOnce(&mut V) -> R) -> Result<R, Error> {
        let value = self.value.upgrade().ok_or(Error::ScopeReleased)?;
        let mut value = value.borrow_mut();
        Ok(f(&mut value))
    }

    pub fn is_released(&self) -> bool {
        self.value.strong_count() == 0
    }
}

impl<V> Clone for Scope<V> {
    fn clone(&self) -> Self {
        Scope {
            value: Weak::clone(&self.value),
        }
    }
}

/// Keep `value` alive until the chain built by `chain` resolves.
///
/// The value is dropped on every exit path, before the returned future
/// resolves.
pub fn do_with<V, T, F>(value: V, chain: F) -> Future<T>
where
    V: 'static,
    T: 'static,
    F: FnOnce(Scope<V>) -> Future<T>,
{
    let owner = Rc::new(RefCell::new(value));
    let scope = Scope {
        value: Rc::downgrade(&owner),
    };
    chain(scope).map(move |out| {
        drop(owner);
        out
    })
}
