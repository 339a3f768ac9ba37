//! The composition kernel: [`Composable`], [`Continuation`], and [`Pipe`].
//!
//! A composable is a value-typed *description* of a step. Fusing a
//! composable with its successor's continuation yields its own
//! continuation; a whole chain fuses right-to-left into one monomorphic
//! state machine that executes left-to-right.
//!
//! Continuations expose three upward channels. For every input event
//! exactly one of `start`/`fail`/`stop` fires on the successor, at most
//! once per continuation instance.

use either::Either;

use crate::fault::Fault;
use crate::interrupt::Interrupt;

/// The running form of a composable: one step of a fused chain, holding
/// its successor by value.
///
/// By convention the successor field `k` is declared last in every
/// implementing struct, so it is dropped last, after any member that may
/// reference into the chain.
pub trait Continuation<In> {
    /// The success channel: deliver the upstream value.
    fn start(&mut self, value: In);

    /// The failure channel: deliver an error.
    fn fail(&mut self, fault: Fault);

    /// The stop channel: cooperative cancellation, distinct from failure.
    fn stop(&mut self);

    /// Make the interrupt available to this step and every nested step.
    ///
    /// Implementations must forward to their successor; steps that can be
    /// cancelled additionally keep a clone for their own handlers.
    fn register(&mut self, interrupt: &Interrupt);
}

/// A value-typed description of one step of deferred work.
///
/// `Value` is the type this step hands to its successor given input `In`;
/// [`fuse`](Composable::fuse) consumes the description and the successor's
/// continuation to produce this step's continuation.
pub trait Composable<In>: Sized {
    /// The value this step produces for its successor.
    type Value;

    /// The continuation produced by fusing with a successor `K`.
    type Fused<K>: Continuation<In>
    where
        K: Continuation<Self::Value> + Send + 'static;

    /// Consume this description and the successor's continuation.
    fn fuse<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<Self::Value> + Send + 'static;
}

/// Two steps fused in sequence. Built with [`ComposableExt::pipe`].
///
/// Construction associates right-to-left (the successor's continuation is
/// built first so it can be embedded by value) while execution flows
/// left-to-right.
pub struct Pipe<A, B> {
    pub(crate) first: A,
    pub(crate) second: B,
}

impl<In, A, B> Composable<In> for Pipe<A, B>
where
    A: Composable<In>,
    B: Composable<A::Value>,
{
    type Value = B::Value;

    type Fused<K>
        = A::Fused<B::Fused<K>>
    where
        K: Continuation<B::Value> + Send + 'static;

    fn fuse<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<Self::Value> + Send + 'static,
    {
        self.first.fuse(self.second.fuse(k))
    }
}

/// Marker implemented by every value-step description.
///
/// Composition operates on descriptions before any input type is known,
/// so `pipe` dispatches on this input-independent marker; the
/// [`Composable`] obligations are checked when the finished chain is
/// fused or run.
pub trait Stage {}

impl<A, B> Stage for Pipe<A, B> {}

/// Method-chaining surface for composables.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// let chain = just(20).pipe(then(|i: i32| i + 1)).pipe(then(|j| j * 2));
/// assert_eq!(run(chain).unwrap(), 42);
/// ```
pub trait ComposableExt: Stage + Sized {
    /// Compose this step with a successor step.
    fn pipe<Next>(self, next: Next) -> Pipe<Self, Next>
    where
        Next: Stage,
    {
        Pipe {
            first: self,
            second: next,
        }
    }
}

impl<C> ComposableExt for C where C: Stage {}

impl<In, L, R> Continuation<In> for Either<L, R>
where
    L: Continuation<In>,
    R: Continuation<In>,
{
    fn start(&mut self, value: In) {
        match self {
            Either::Left(l) => l.start(value),
            Either::Right(r) => r.start(value),
        }
    }

    fn fail(&mut self, fault: Fault) {
        match self {
            Either::Left(l) => l.fail(fault),
            Either::Right(r) => r.fail(fault),
        }
    }

    fn stop(&mut self) {
        match self {
            Either::Left(l) => l.stop(),
            Either::Right(r) => r.stop(),
        }
    }

    fn register(&mut self, interrupt: &Interrupt) {
        match self {
            Either::Left(l) => l.register(interrupt),
            Either::Right(r) => r.register(interrupt),
        }
    }
}

impl<In> Continuation<In> for Box<dyn Continuation<In> + Send> {
    fn start(&mut self, value: In) {
        (**self).start(value)
    }

    fn fail(&mut self, fault: Fault) {
        (**self).fail(fault)
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn register(&mut self, interrupt: &Interrupt) {
        (**self).register(interrupt)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// What a [`Recorder`] observed.
    #[derive(Debug, PartialEq)]
    pub enum Event<T> {
        Started(T),
        Failed(String),
        FailedAnonymously,
        Stopped,
    }

    /// A terminal continuation that records every upward callback, for
    /// asserting the single-outcome property in tests.
    pub struct Recorder<T> {
        pub events: Arc<Mutex<Vec<Event<T>>>>,
    }

    impl<T> Recorder<T> {
        pub fn new() -> (Self, Arc<Mutex<Vec<Event<T>>>>) {
            let events = Arc::new(Mutex::new(Vec::new()));
            (
                Recorder {
                    events: Arc::clone(&events),
                },
                events,
            )
        }
    }

    impl<T> Continuation<T> for Recorder<T> {
        fn start(&mut self, value: T) {
            self.events.lock().unwrap().push(Event::Started(value));
        }

        fn fail(&mut self, fault: Fault) {
            let event = if fault.is_anonymous() {
                Event::FailedAnonymously
            } else {
                Event::Failed(fault.to_string())
            };
            self.events.lock().unwrap().push(event);
        }

        fn stop(&mut self) {
            self.events.lock().unwrap().push(Event::Stopped);
        }

        fn register(&mut self, _interrupt: &Interrupt) {}
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Event, Recorder};
    use super::*;
    use crate::just::just;
    use crate::then::then;

    #[test]
    fn test_pipe_fuses_right_to_left_and_runs_left_to_right() {
        let chain = just(1).pipe(then(|v: i32| v + 1)).pipe(then(|v| v * 10));
        let (recorder, events) = Recorder::new();
        let mut k = Composable::<()>::fuse(chain, recorder);
        k.start(());
        assert_eq!(*events.lock().unwrap(), vec![Event::Started(20)]);
    }

    #[test]
    fn test_exactly_one_outcome_per_input() {
        let chain = just(5).pipe(then(|v: i32| v));
        let (recorder, events) = Recorder::new();
        let mut k = Composable::<()>::fuse(chain, recorder);
        k.start(());
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_either_continuation_dispatches_to_active_branch() {
        let (recorder, events) = Recorder::new();
        let mut k: Either<Recorder<i32>, Recorder<i32>> = Either::Left(recorder);
        k.start(7);
        assert_eq!(*events.lock().unwrap(), vec![Event::Started(7)]);
    }

    #[test]
    fn test_boxed_continuation_delegates() {
        let (recorder, events) = Recorder::new();
        let mut k: Box<dyn Continuation<i32> + Send> = Box::new(recorder);
        k.stop();
        assert_eq!(*events.lock().unwrap(), vec![Event::Stopped]);
    }
}
