//! The failure-injecting primitive.

use crate::compose::{Composable, Continuation, Stage};
use crate::fault::Fault;
use crate::interrupt::Interrupt;

/// A step that fails its successor when started.
///
/// Created by [`raise`].
pub struct Raise<E> {
    error: E,
}

/// Fail the chain with `error` when this step is started. Failures and
/// stops arriving from upstream pass through unchanged, so an earlier
/// failure wins over a later `raise`.
///
/// Accepts anything convertible to [`Fault`]: a bare string is wrapped in
/// [`Message`](crate::fault::Message), and a typed error goes through
/// [`Fault::new`].
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// let fault = run(just(1).pipe(raise("boom"))).unwrap_fault();
/// assert_eq!(fault.to_string(), "boom");
/// ```
pub fn raise<E>(error: E) -> Raise<E>
where
    E: Into<Fault>,
{
    Raise { error }
}

impl<E> Stage for Raise<E> {}

impl<In, E> Composable<In> for Raise<E>
where
    E: Into<Fault>,
{
    // The value type passes through untouched so a raise can sit anywhere
    // in a chain.
    type Value = In;

    type Fused<K>
        = RaiseContinuation<E, K>
    where
        K: Continuation<In> + Send + 'static;

    fn fuse<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<In> + Send + 'static,
    {
        RaiseContinuation {
            error: Some(self.error),
            k,
        }
    }
}

pub struct RaiseContinuation<E, K> {
    error: Option<E>,
    k: K,
}

impl<In, E, K> Continuation<In> for RaiseContinuation<E, K>
where
    E: Into<Fault>,
    K: Continuation<In>,
{
    fn start(&mut self, _value: In) {
        let error = self.error.take().expect("started twice");
        self.k.fail(error.into());
    }

    fn fail(&mut self, fault: Fault) {
        self.k.fail(fault);
    }

    fn stop(&mut self) {
        self.k.stop();
    }

    fn register(&mut self, interrupt: &Interrupt) {
        self.k.register(interrupt);
    }
}
