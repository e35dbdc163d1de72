//! Two-way branching over differently shaped futures.
//!
//! The arms of a conditional inside a continuation often produce different
//! types, e.g. a [`Ready`](super::Ready) short-circuit on one side and a long
//! chain on the other. `Either` gives both arms a single type.

use super::future::{Deferred, Future};

/// One of two future-like values with the same output.
///
/// The variant is fixed at construction.
#[derive(Debug)]
pub enum Either<A, B> {
    Left(A),
    Right(B),
}

impl<A, B> Either<A, B> {
    pub fn is_left(&self) -> bool {
        matches!(self, Either::Left(_))
    }
}

impl<T, A, B> Deferred for Either<A, B>
where
    T: 'static,
    A: Deferred<Output = T>,
    B: Deferred<Output = T>,
{
    type Output = T;

    fn is_resolved(&self) -> bool {
        match self {
            Either::Left(a) => a.is_resolved(),
            Either::Right(b) => b.is_resolved(),
        }
    }

    fn into_future(self) -> Future<T> {
        match self {
            Either::Left(a) => a.into_future(),
            Either::Right(b) => b.into_future(),
        }
    }
}
