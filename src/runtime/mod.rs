//! Continuation runtime: futures, combinators and the I/O reactor.
//!
//! Everything here is single-threaded. Continuations run on the reactor's
//! thread, one at a time, and suspension only happens at I/O boundaries.
//!
//! - `Future`/`Promise`: single-assignment cells with one continuation
//! - `repeat`/`StopSignal`: trampolined loops
//! - `Either`: branches of different future shapes
//! - `do_with`/`Scope`: values that live exactly as long as a chain
//! - `Reactor`/`Handle`: readiness polling and waiter dispatch

mod buffer;
mod either;
mod future;
mod reactor;
mod repeat;
mod scope;
mod token;

pub use buffer::IoBuf;
pub use either::Either;
pub use future::{Deferred, Future, Promise, Ready};
pub use reactor::{Handle, Reactor, DEFAULT_EVENTS};
pub use repeat::{repeat, StopSignal};
pub use scope::{do_with, Scope};
pub use token::{Attempt, Direction, Waiter};
