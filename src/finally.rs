//! Three-channel folding.
//!
//! [`finally`] converts whichever channel arrives into a single
//! [`Outcome`] value handed to its hook; the composable the hook returns
//! continues the chain normally. Use it to observe or recover from every
//! way a chain can settle, including cooperative stops, which no other
//! combinator can see.

use crate::compose::{Composable, Continuation, Stage};
use crate::fault::{Fault, Outcome};
use crate::interrupt::Interrupt;
use crate::then::Adaptor;

/// A step folding all three channels into one value. Created by
/// [`finally`].
pub struct Finally<F> {
    f: F,
}

/// Fold the three channels into an [`Outcome`] delivered to `f`. The
/// composable returned by `f` is fused into the chain and driven, so a
/// `finally` hook can itself recover, re-raise, or continue eventually.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// let chain = just(42)
///     .pipe(raise("error"))
///     .pipe(finally(|outcome: Outcome<i32>| just(outcome.is_fault())));
/// assert!(run(chain).unwrap());
/// ```
pub fn finally<F>(f: F) -> Finally<F> {
    Finally { f }
}

impl<F> Stage for Finally<F> {}

impl<In, F, C> Composable<In> for Finally<F>
where
    F: FnOnce(Outcome<In>) -> C,
    C: Composable<()>,
{
    type Value = C::Value;

    type Fused<K>
        = FinallyContinuation<F, K>
    where
        K: Continuation<C::Value> + Send + 'static;

    fn fuse<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<C::Value> + Send + 'static,
    {
        FinallyContinuation {
            f: Some(self.f),
            interrupt: None,
            k: Some(k),
        }
    }
}

pub struct FinallyContinuation<F, K> {
    f: Option<F>,
    interrupt: Option<Interrupt>,
    k: Option<K>,
}

impl<F, K> FinallyContinuation<F, K> {
    fn settle<In, C>(&mut self, outcome: Outcome<In>)
    where
        F: FnOnce(Outcome<In>) -> C,
        C: Composable<()>,
        K: Continuation<C::Value> + Send + 'static,
    {
        let f = self.f.take().expect("settled twice");
        let k = self.k.take().expect("already completed");
        let mut nested = f(outcome).fuse(Adaptor { k });
        if let Some(interrupt) = &self.interrupt {
            nested.register(interrupt);
        }
        nested.start(());
    }
}

impl<In, F, C, K> Continuation<In> for FinallyContinuation<F, K>
where
    F: FnOnce(Outcome<In>) -> C,
    C: Composable<()>,
    K: Continuation<C::Value>,
{
    fn start(&mut self, value: In) {
        self.settle(Outcome::Value(value));
    }

    fn fail(&mut self, fault: Fault) {
        self.settle(Outcome::Fault(fault));
    }

    fn stop(&mut self) {
        self.settle(Outcome::Stopped);
    }

    fn register(&mut self, interrupt: &Interrupt) {
        self.interrupt = Some(interrupt.clone());
        self.k
            .as_mut()
            .expect("already completed")
            .register(interrupt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::testing::{Event, Recorder};
    use crate::compose::ComposableExt;
    use crate::just::just;
    use crate::raise::raise;

    #[test]
    fn test_finally_sees_value() {
        let (recorder, events) = Recorder::new();
        let chain = just(42).pipe(finally(|outcome: Outcome<i32>| {
            just(outcome.value().unwrap_or(0))
        }));
        let mut k = Composable::<()>::fuse(chain, recorder);
        k.start(());
        assert_eq!(*events.lock().unwrap(), vec![Event::Started(42)]);
    }

    #[test]
    fn test_finally_sees_fault() {
        let (recorder, events) = Recorder::new();
        let chain = just(42)
            .pipe(raise("error"))
            .pipe(finally(|outcome: Outcome<i32>| {
                just(outcome.unwrap_fault().to_string())
            }));
        let mut k = Composable::<()>::fuse(chain, recorder);
        k.start(());
        assert_eq!(
            *events.lock().unwrap(),
            vec![Event::Started("error".to_string())]
        );
    }

    #[test]
    fn test_finally_sees_stop_as_outcome_not_fault() {
        let (recorder, events) = Recorder::new();
        let mut k =
            Composable::<i32>::fuse(finally(|outcome: Outcome<i32>| just(outcome.is_stopped())), recorder);
        k.stop();
        assert_eq!(*events.lock().unwrap(), vec![Event::Started(true)]);
    }

    #[test]
    fn test_finally_hook_can_reraise() {
        let (recorder, events) = Recorder::new();
        let chain = just(1).pipe(finally(|_: Outcome<i32>| just(()).pipe(raise("reraised"))));
        let mut k = Composable::<()>::fuse(chain, recorder);
        k.start(());
        assert_eq!(
            *events.lock().unwrap(),
            vec![Event::<()>::Failed("reraised".to_string())]
        );
    }
}
