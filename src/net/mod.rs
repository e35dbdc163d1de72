//! TCP networking on top of the reactor.
//!
//! - [`TcpStream`]: non-blocking client socket with `connect`, `read`, `write`
//! - [`Transport`]: the read/write surface protocol logic is written against

mod tcp_stream;

pub use tcp_stream::{ConnectOptions, TcpStream, Transport};
