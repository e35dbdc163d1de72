//! Echo session built from the runtime combinators.
//!
//! ```text
//! Reading --n > 0--> Writing --all n written--> Reading
//! Reading --n == 0--> Closed
//! any     --error--> Failed(error)
//! ```
//!
//! The session (stream + buffer) is owned by a scoped binding for as long as
//! the loop runs; each round reads into the front of the buffer and writes
//! exactly those bytes back before reading again.

use crate::error::Error;
use crate::net::Transport;
use crate::runtime::{do_with, repeat, Either, Future, IoBuf, Ready, Scope, StopSignal};
use tracing::trace;

type Step<T> = StopSignal<Result<T, Error>>;

struct Session<S> {
    stream: S,
    buf: IoBuf,
    /// Total bytes written back so far.
    echoed: u64,
}

/// Echo everything read from `stream` back onto it until the peer closes.
///
/// Resolves to the number of bytes echoed on a clean close, or to the first
/// error. `stream` and the `buffer_size`-byte buffer are released before the
/// returned future resolves.
pub fn echo_stream<S: Transport>(stream: S, buffer_size: usize) -> Future<Result<u64, Error>> {
    let session = Session {
        stream,
        buf: IoBuf::new(buffer_size),
        echoed: 0,
    };
    do_with(session, |session| repeat(move || echo_round(&session)))
}

fn echo_round<S: Transport>(session: &Scope<Session<S>>) -> Future<Step<u64>> {
    let read = match session.with(|s| s.stream.read(&s.buf, s.buf.len())) {
        Ok(read) => read,
        Err(e) => return Future::ready(StopSignal::Stop(Err(e))),
    };

    let session = session.clone();
    read.then(move |res| -> Either<Ready<Step<u64>>, Future<Step<u64>>> {
        match res {
            Err(e) => {
                trace!(error = %e, "Read failed");
                Either::Left(Ready::new(StopSignal::Stop(Err(e.into()))))
            }
            Ok(0) => {
                trace!("Peer closed");
                let echoed = session.with(|s| s.echoed);
                Either::Left(Ready::new(StopSignal::Stop(echoed)))
            }
            Ok(n) => {
                trace!(bytes = n, "Writing back");
                Either::Right(write_back(session, n))
            }
        }
    })
}

fn write_back<S: Transport>(session: Scope<Session<S>>, n: usize) -> Future<Step<u64>> {
    write_all(session.clone(), n).map(move |res| match res {
        Ok(()) => match session.with(|s| s.echoed += n as u64) {
            Ok(()) => StopSignal::Continue,
            Err(e) => StopSignal::Stop(Err(e)),
        },
        Err(e) => {
            trace!(error = %e, "Write failed");
            StopSignal::Stop(Err(e))
        }
    })
}

/// Write the first `len` bytes of the session buffer, looping on short
/// writes. Never requests bytes past `len`.
fn write_all<S: Transport>(session: Scope<Session<S>>, len: usize) -> Future<Result<(), Error>> {
    do_with(0usize, move |written| {
        repeat(move || write_once(&session, &written, len))
    })
}

fn write_once<S: Transport>(
    session: &Scope<Session<S>>,
    written: &Scope<usize>,
    len: usize,
) -> Future<Step<()>> {
    let write = written
        .with(|w| *w)
        .and_then(|start| session.with(|s| s.stream.write(&s.buf, start..len)));
    let write = match write {
        Ok(write) => write,
        Err(e) => return Future::ready(StopSignal::Stop(Err(e))),
    };

    let written = written.clone();
    write.map(move |res| match res {
        Err(e) => StopSignal::Stop(Err(e.into())),
        Ok(0) => StopSignal::Stop(Err(Error::WriteZero)),
        Ok(n) => match written.with(|w| {
            *w += n;
            *w
        }) {
            Ok(total) if total >= len => StopSignal::Stop(Ok(())),
            Ok(_) => StopSignal::Continue,
            Err(e) => StopSignal::Stop(Err(e)),
        },
    })
}
