//! Protocol implementations.
//!
//! - `echo`: echo every byte back to the peer until it closes
pub mod echo;
