//! The constant-value primitive.

use crate::compose::{Composable, Continuation, Stage};
use crate::fault::Fault;
use crate::interrupt::Interrupt;

/// A step that starts its successor with a fixed value.
///
/// Created by [`just`].
pub struct Just<T> {
    value: T,
}

/// Produce `value` for the successor, ignoring the upstream value.
/// Failures and stops pass through unchanged.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// assert_eq!(run(just(42)).unwrap(), 42);
/// ```
pub fn just<T>(value: T) -> Just<T> {
    Just { value }
}

impl<T> Stage for Just<T> {}

impl<In, T> Composable<In> for Just<T> {
    type Value = T;

    type Fused<K>
        = JustContinuation<T, K>
    where
        K: Continuation<T> + Send + 'static;

    fn fuse<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<T> + Send + 'static,
    {
        JustContinuation {
            value: Some(self.value),
            k,
        }
    }
}

pub struct JustContinuation<T, K> {
    value: Option<T>,
    k: K,
}

impl<In, T, K> Continuation<In> for JustContinuation<T, K>
where
    K: Continuation<T>,
{
    fn start(&mut self, _value: In) {
        let value = self.value.take().expect("started twice");
        self.k.start(value);
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
