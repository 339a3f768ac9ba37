//! Failure handling.
//!
//! [`catch`] builds a list of typed handlers tried in declaration order
//! when a failure arrives. The first handler whose error type matches
//! consumes the fault; its returned composable is fused into the chain
//! and driven, so a handler can recover with a value (`just`), re-raise
//! (`raise`), or continue with any eventual work. An optional [`all`]
//! handler, installed last, receives whatever no typed handler consumed,
//! including the anonymous fault. Unmatched faults pass through
//! unchanged, and stops are never intercepted.
//!
//! [`all`]: CatchBuilder::all

use std::error::Error as StdError;
use std::marker::PhantomData;

use crate::compose::{Composable, Continuation, Stage};
use crate::fault::Fault;
use crate::interrupt::Interrupt;
use crate::then::Adaptor;

/// Begin a failure-handler list.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
/// use later::fault::Message;
///
/// let chain = just(1)
///     .pipe(raise("message"))
///     .pipe(
///         catch()
///             .raised::<Message, _, _>(|_| just(100))
///     )
///     .pipe(then(|v: i32| v));
/// assert_eq!(run(chain).unwrap(), 100);
/// ```
pub fn catch() -> CatchBuilder<NoHandlers> {
    CatchBuilder {
        handlers: NoHandlers,
    }
}

/// A failure-handler list under construction. Created by [`catch`].
pub struct CatchBuilder<H> {
    handlers: H,
}

impl<H> CatchBuilder<H> {
    /// Append a handler for failures of type `E`.
    ///
    /// Handlers are tried in the order they were declared; the first
    /// match consumes the fault. Not available after [`all`]
    /// (`CatchBuilder::all`), which must be installed last.
    pub fn raised<E, F, C>(self, handler: F) -> CatchBuilder<Raised<E, F, H>>
    where
        E: StdError + Send + Sync + 'static,
        F: FnOnce(E) -> C,
        C: Composable<()>,
        H: Open,
    {
        CatchBuilder {
            handlers: Raised {
                handler: Some(handler),
                rest: self.handlers,
                _error: PhantomData,
            },
        }
    }

    /// Close the list with a handler for everything the typed handlers
    /// did not consume. The handler receives the [`Fault`] itself, which
    /// may be anonymous.
    pub fn all<F, C>(self, handler: F) -> CatchBuilder<WithAll<F, H>>
    where
        F: FnOnce(Fault) -> C,
        C: Composable<()>,
        H: Open,
    {
        CatchBuilder {
            handlers: WithAll {
                handler: Some(handler),
                rest: self.handlers,
            },
        }
    }
}

/// Marker for handler lists that can still be extended. Implemented for
/// everything except [`WithAll`], which keeps `raised`-after-`all` from
/// compiling.
pub trait Open {}

/// The empty handler list.
pub struct NoHandlers;

impl Open for NoHandlers {}

/// A typed handler and the handlers declared before it.
pub struct Raised<E, F, Rest> {
    handler: Option<F>,
    rest: Rest,
    _error: PhantomData<fn() -> E>,
}

impl<E, F, Rest> Open for Raised<E, F, Rest> {}

/// A closing catch-all handler and the typed handlers before it.
pub struct WithAll<F, Rest> {
    handler: Option<F>,
    rest: Rest,
}

/// Dispatch through a handler list in declaration order.
///
/// Returns the fault back if nothing consumed it.
pub trait HandlerList<V> {
    fn try_handle<K>(
        &mut self,
        fault: Fault,
        interrupt: Option<&Interrupt>,
        k: &mut Option<K>,
    ) -> Option<Fault>
    where
        K: Continuation<V>;
}

impl<V> HandlerList<V> for NoHandlers {
    fn try_handle<K>(
        &mut self,
        fault: Fault,
        _interrupt: Option<&Interrupt>,
        _k: &mut Option<K>,
    ) -> Option<Fault>
    where
        K: Continuation<V>,
    {
        Some(fault)
    }
}

fn drive<V, C, K>(composable: C, interrupt: Option<&Interrupt>, k: &mut Option<K>)
where
    C: Composable<(), Value = V>,
    K: Continuation<V>,
{
    let k = k.take().expect("already completed");
    let mut nested = composable.fuse(Adaptor { k });
    if let Some(interrupt) = interrupt {
        nested.register(interrupt);
    }
    nested.start(());
}

impl<V, E, F, C, Rest> HandlerList<V> for Raised<E, F, Rest>
where
    E: StdError + Send + Sync + 'static,
    F: FnOnce(E) -> C,
    C: Composable<(), Value = V>,
    Rest: HandlerList<V>,
{
    fn try_handle<K>(
        &mut self,
        fault: Fault,
        interrupt: Option<&Interrupt>,
        k: &mut Option<K>,
    ) -> Option<Fault>
    where
        K: Continuation<V>,
    {
        // Earlier-declared handlers sit deeper in the list and get first
        // refusal.
        let fault = self.rest.try_handle(fault, interrupt, k)?;
        match fault.downcast::<E>() {
            Ok(error) => {
                let handler = self.handler.take().expect("catch handler reused");
                drive(handler(error), interrupt, k);
                None
            }
            Err(fault) => Some(fault),
        }
    }
}

impl<V, F, C, Rest> HandlerList<V> for WithAll<F, Rest>
where
    F: FnOnce(Fault) -> C,
    C: Composable<(), Value = V>,
    Rest: HandlerList<V>,
{
    fn try_handle<K>(
        &mut self,
        fault: Fault,
        interrupt: Option<&Interrupt>,
        k: &mut Option<K>,
    ) -> Option<Fault>
    where
        K: Continuation<V>,
    {
        let fault = self.rest.try_handle(fault, interrupt, k)?;
        let handler = self.handler.take().expect("catch handler reused");
        drive(handler(fault), interrupt, k);
        None
    }
}

impl<H> Stage for CatchBuilder<H> {}

impl<In, E, F, Rest> Composable<In> for CatchBuilder<Raised<E, F, Rest>>
where
    Raised<E, F, Rest>: HandlerList<In>,
{
    type Value = In;

    type Fused<K>
        = CatchContinuation<Raised<E, F, Rest>, K>
    where
        K: Continuation<In> + Send + 'static;

    fn fuse<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<In> + Send + 'static,
    {
        CatchContinuation {
            handlers: self.handlers,
            interrupt: None,
            k: Some(k),
        }
    }
}

impl<In, F, Rest> Composable<In> for CatchBuilder<WithAll<F, Rest>>
where
    WithAll<F, Rest>: HandlerList<In>,
{
    type Value = In;

    type Fused<K>
        = CatchContinuation<WithAll<F, Rest>, K>
    where
        K: Continuation<In> + Send + 'static;

    fn fuse<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<In> + Send + 'static,
    {
        CatchContinuation {
            handlers: self.handlers,
            interrupt: None,
            k: Some(k),
        }
    }
}

pub struct CatchContinuation<H, K> {
    handlers: H,
    interrupt: Option<Interrupt>,
    k: Option<K>,
}

impl<In, H, K> Continuation<In> for CatchContinuation<H, K>
where
    H: HandlerList<In>,
    K: Continuation<In>,
{
    fn start(&mut self, value: In) {
        self.k.as_mut().expect("already completed").start(value);
    }

    fn fail(&mut self, fault: Fault) {
        let unhandled = self
            .handlers
            .try_handle(fault, self.interrupt.as_ref(), &mut self.k);
        if let Some(fault) = unhandled {
            self.k.take().expect("already completed").fail(fault);
        }
    }

    fn stop(&mut self) {
        self.k.as_mut().expect("already completed").stop();
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
    use crate::fault::{EmptyStream, Message};
    use crate::just::just;
    use crate::raise::raise;
    use crate::then::then;

    #[test]
    fn test_first_matching_handler_consumes() {
        let (recorder, events) = Recorder::new();
        let chain = just(1)
            .pipe(raise("message"))
            .pipe(
                catch()
                    .raised::<EmptyStream, _, _>(|_| just(1))
                    .raised::<Message, _, _>(|_| just(100)),
            )
            .pipe(then(|v: i32| v));
        let mut k = Composable::<()>::fuse(chain, recorder);
        k.start(());
        assert_eq!(*events.lock().unwrap(), vec![Event::Started(100)]);
    }

    #[test]
    fn test_handlers_try_in_declaration_order() {
        let (recorder, events) = Recorder::new();
        // Both handlers match Message; the first declared wins.
        let chain = raise("m").pipe(
            catch()
                .raised::<Message, _, _>(|_| just("first"))
                .raised::<Message, _, _>(|_| just("second")),
        );
        let mut k = Composable::<&str>::fuse(chain, recorder);
        k.start("seed");
        assert_eq!(*events.lock().unwrap(), vec![Event::Started("first")]);
    }

    #[test]
    fn test_unmatched_fault_passes_through() {
        let (recorder, events) = Recorder::new();
        let chain = raise(Fault::new(EmptyStream))
            .pipe(catch().raised::<Message, _, _>(|_| just(())));
        let mut k = Composable::<()>::fuse(chain, recorder);
        k.start(());
        assert_eq!(
            *events.lock().unwrap(),
            vec![Event::Failed(EmptyStream.to_string())]
        );
    }

    #[test]
    fn test_all_receives_what_typed_handlers_skip() {
        let (recorder, events) = Recorder::new();
        let chain = raise(Fault::new(EmptyStream)).pipe(
            catch()
                .raised::<Message, _, _>(|_| just(0))
                .all(|fault| just(if fault.is::<EmptyStream>() { 100 } else { 0 })),
        );
        let mut k = Composable::<i32>::fuse(chain, recorder);
        k.start(0);
        assert_eq!(*events.lock().unwrap(), vec![Event::Started(100)]);
    }

    #[test]
    fn test_all_receives_anonymous_fault() {
        let (recorder, events) = Recorder::new();
        let mut k = Composable::<bool>::fuse(
            catch().all(|fault: Fault| just(fault.is_anonymous())),
            recorder,
        );
        k.fail(Fault::anonymous());
        assert_eq!(*events.lock().unwrap(), vec![Event::Started(true)]);
    }

    #[test]
    fn test_handler_can_reraise() {
        let (recorder, events) = Recorder::new();
        let chain = just(5)
            .pipe(raise("10"))
            .pipe(catch().raised::<Message, _, _>(|_| just(0).pipe(raise("1"))))
            .pipe(then(|v: i32| v + 200))
            .pipe(catch().raised::<Message, _, _>(|error: Message| {
                just(if error.0 == "1" { 10 } else { 0 })
            }));
        let mut k = Composable::<()>::fuse(chain, recorder);
        k.start(());
        assert_eq!(*events.lock().unwrap(), vec![Event::Started(10)]);
    }

    #[test]
    fn test_catch_does_not_intercept_stop() {
        let (recorder, events) = Recorder::new();
        let mut k = Composable::<i32>::fuse(catch().all(|_: Fault| just(0)), recorder);
        k.stop();
        assert_eq!(*events.lock().unwrap(), vec![Event::<i32>::Stopped]);
    }

    #[test]
    fn test_start_passes_through_untouched() {
        let (recorder, events) = Recorder::new();
        let mut k =
            Composable::<i32>::fuse(catch().raised::<Message, _, _>(|_| just(0)), recorder);
        k.start(5);
        assert_eq!(*events.lock().unwrap(), vec![Event::Started(5)]);
    }
}
