//! Value-transforming primitives.
//!
//! [`then`] maps the success value through a plain function. [`and_then`]
//! maps it through a function that *returns another composable*, which is
//! fused into the enclosing chain and driven to completion in place.

use crate::compose::{Composable, Continuation, Stage};
use crate::fault::Fault;
use crate::interrupt::Interrupt;

/// A step that maps the success value. Created by [`then`].
pub struct Then<F> {
    f: F,
}

/// Map the success value through `f`. Failures and stops pass through.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// let chain = just(20).pipe(then(|i: i32| i + 1)).pipe(then(|j| j * 2));
/// assert_eq!(run(chain).unwrap(), 42);
/// ```
pub fn then<F>(f: F) -> Then<F> {
    Then { f }
}

impl<F> Stage for Then<F> {}

impl<In, F, Out> Composable<In> for Then<F>
where
    F: FnOnce(In) -> Out,
{
    type Value = Out;

    type Fused<K>
        = ThenContinuation<F, K>
    where
        K: Continuation<Out>;

    fn fuse<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<Out>,
    {
        ThenContinuation {
            f: Some(self.f),
            k,
        }
    }
}

pub struct ThenContinuation<F, K> {
    f: Option<F>,
    k: K,
}

impl<In, F, Out, K> Continuation<In> for ThenContinuation<F, K>
where
    F: FnOnce(In) -> Out,
    K: Continuation<Out>,
{
    fn start(&mut self, value: In) {
        let f = self.f.take().expect("started twice");
        self.k.start(f(value));
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

/// A step that maps the success value through a composable-returning
/// function. Created by [`and_then`].
pub struct AndThen<F> {
    f: F,
}

/// Map the success value through `f`, then run the composable `f` returns
/// before continuing. The nested chain terminates into the enclosing one
/// through a thin adaptor, and is registered with the chain's interrupt
/// exactly once.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// let chain = just(1).pipe(and_then(|i: i32| {
///     when(i == 1).yes(just("yes")).no(just("no"))
/// }));
/// assert_eq!(run(chain).unwrap(), "yes");
/// ```
pub fn and_then<F>(f: F) -> AndThen<F> {
    AndThen { f }
}

impl<F> Stage for AndThen<F> {}

impl<In, F, C> Composable<In> for AndThen<F>
where
    F: FnOnce(In) -> C,
    C: Composable<()>,
{
    type Value = C::Value;

    type Fused<K>
        = AndThenContinuation<F, K>
    where
        K: Continuation<C::Value>;

    fn fuse<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<C::Value>,
    {
        AndThenContinuation {
            f: Some(self.f),
            interrupt: None,
            k: Some(k),
        }
    }
}

pub struct AndThenContinuation<F, K> {
    f: Option<F>,
    interrupt: Option<Interrupt>,
    k: Option<K>,
}

impl<In, F, C, K> Continuation<In> for AndThenContinuation<F, K>
where
    F: FnOnce(In) -> C,
    C: Composable<()>,
    K: Continuation<C::Value>,
{
    fn start(&mut self, value: In) {
        let f = self.f.take().expect("started twice");
        let k = self.k.take().expect("already completed");
        let mut nested = f(value).fuse(Adaptor { k });
        if let Some(interrupt) = &self.interrupt {
            nested.register(interrupt);
        }
        nested.start(());
    }

    fn fail(&mut self, fault: Fault) {
        self.k.take().expect("already completed").fail(fault);
    }

    fn stop(&mut self) {
        self.k.take().expect("already completed").stop();
    }

    fn register(&mut self, interrupt: &Interrupt) {
        self.interrupt = Some(interrupt.clone());
        self.k
            .as_mut()
            .expect("already completed")
            .register(interrupt);
    }
}

/// Terminates a nested chain into the enclosing one.
///
/// Forwards the three channels to the enclosing successor but swallows
/// `register`: the enclosing step registered the successor already, and a
/// second registration would duplicate installed handlers.
pub(crate) struct Adaptor<K> {
    pub(crate) k: K,
}

impl<In, K> Continuation<In> for Adaptor<K>
where
    K: Continuation<In>,
{
    fn start(&mut self, value: In) {
        self.k.start(value);
    }

    fn fail(&mut self, fault: Fault) {
        self.k.fail(fault);
    }

    fn stop(&mut self) {
        self.k.stop();
    }

    fn register(&mut self, _interrupt: &Interrupt) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::testing::{Event, Recorder};
    use crate::compose::ComposableExt;
    use crate::just::just;
    use crate::raise::raise;

    #[test]
    fn test_then_maps_value() {
        let (recorder, events) = Recorder::new();
        let mut k = Composable::<()>::fuse(just(20).pipe(then(|i: i32| i + 1)), recorder);
        k.start(());
        assert_eq!(*events.lock().unwrap(), vec![Event::Started(21)]);
    }

    #[test]
    fn test_then_is_skipped_on_failure() {
        let (recorder, events) = Recorder::new();
        let mut k = Composable::<i32>::fuse(raise("error").pipe(then(|i: i32| i + 1)), recorder);
        k.start(42);
        assert_eq!(
            *events.lock().unwrap(),
            vec![Event::Failed("error".to_string())]
        );
    }

    #[test]
    fn test_and_then_runs_nested_chain() {
        let (recorder, events) = Recorder::new();
        let chain = just(3).pipe(and_then(|i: i32| just(i * 10)));
        let mut k = Composable::<()>::fuse(chain, recorder);
        k.start(());
        assert_eq!(*events.lock().unwrap(), vec![Event::Started(30)]);
    }

    #[test]
    fn test_and_then_nested_failure_reaches_successor() {
        let (recorder, events) = Recorder::new();
        let chain = just(3).pipe(and_then(|_: i32| just(0).pipe(raise("nested"))));
        let mut k = Composable::<()>::fuse(chain, recorder);
        k.start(());
        assert_eq!(
            *events.lock().unwrap(),
            vec![Event::Failed("nested".to_string())]
        );
    }

    #[test]
    fn test_and_then_passes_stop_through() {
        let (recorder, events) = Recorder::new();
        let mut k = Composable::<i32>::fuse(and_then(|_: i32| just(1)), recorder);
        k.stop();
        assert_eq!(*events.lock().unwrap(), vec![Event::Stopped]);
    }
}
