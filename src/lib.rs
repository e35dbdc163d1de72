//! echo-reactor: continuation futures on a single-threaded reactor.
//!
//! The [`runtime`] module provides the future/promise cell, its combinators
//! (`then`, `repeat`, `Either`, `do_with`) and the mio-backed reactor that
//! resumes parked I/O. [`net`] adds a non-blocking TCP stream, and
//! [`protocols::echo`] uses both to copy everything a peer sends back to it.

pub mod client;
pub mod config;
pub mod error;
pub mod net;
pub mod protocols;
pub mod runtime;
