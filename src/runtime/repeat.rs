//! Repeat-until-stop loop combinator.
//!
//! `repeat(body)` calls `body` until one of its futures resolves to
//! [`StopSignal::Stop`]. Iterations that resolve synchronously are driven by a
//! loop in the current frame. An iteration that suspends hands the loop state
//! to its continuation, which resumes from the resolver's frame (typically the
//! reactor's dispatch), so stack depth stays flat however long the loop runs.

use super::future::{Future, Promise};
use tracing::error;

/// Outcome of one loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopSignal<T> {
    Continue,
    Stop(T),
}

impl<T> StopSignal<T> {
    pub fn stop(value: T) -> Self {
        StopSignal::Stop(value)
    }
}

/// Run `body` until it yields `Stop(v)`; the returned future resolves to `v`.
///
/// A body that only ever yields `Continue` never resolves.
pub fn repeat<T, F>(body: F) -> Future<T>
where
    T: 'static,
    F: FnMut() -> Future<StopSignal<T>> + 'static,
{
    let (promise, future) = Promise::new();
    drive(body, promise);
    future
}

fn drive<T, F>(mut body: F, promise: Promise<T>)
where
    T: 'static,
    F: FnMut() -> Future<StopSignal<T>> + 'static,
{
    loop {
        match body().try_take() {
            Ok(StopSignal::Continue) => continue,
            Ok(StopSignal::Stop(value)) => return finish(&promise, value),
            Err(pending) => {
                pending.on_ready(move |signal| match signal {
                    StopSignal::Continue => drive(body, promise),
                    StopSignal::Stop(value) => finish(&promise, value),
                });
                return;
            }
        }
    }
}

fn finish<T: 'static>(promise: &Promise<T>, value: T) {
    if let Err(e) = promise.resolve(value) {
        error!(error = %e, "loop stopped twice");
    }
}
