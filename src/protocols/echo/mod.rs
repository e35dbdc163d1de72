//! Echo protocol implementation.
//!
//! Raw byte echo with no framing: every byte read from the stream is written
//! back, in order, until the peer closes. Reads are capped at the session
//! buffer size, and each chunk is flushed completely before the next read.
//!
//! ## Use Cases
//!
//! 1. **Combinator coverage**: a session exercises every runtime primitive
//!    (sequencing, scoped binding, nested loops, `Either` branches) against
//!    real sockets.
//!
//! 2. **Short read/write handling**: large payloads and slow peers force
//!    partial writes and buffer-capped reads.
//!
//! 3. **Correctness validation**: the peer can compare what it sent with what
//!    came back.

pub mod handler;

pub use handler::echo_stream;
