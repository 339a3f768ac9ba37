//! The user-defined primitive and its resume handle.
//!
//! An [`Eventual`] is the only way to introduce genuine asynchrony into a
//! chain: its hooks receive an owned [`Resume`] handle and may return
//! without firing it, suspending the chain until some other party
//! (another thread, a timer, an interrupt handler) fires it later.
//!
//! The interruptible variant additionally hands the start hook an
//! interrupt [`Handler`](crate::interrupt::Handler) so a cancellation
//! callback can be installed at the suspension point.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use crate::compose::{Composable, Continuation, Stage};
use crate::fault::Fault;
use crate::interrupt::{Handler, Interrupt};

/// An owned, cloneable handle to the rest of a suspended chain.
///
/// Exactly one of [`start`](Resume::start) / [`fail`](Resume::fail) /
/// [`stop`](Resume::stop) resumes the chain; whichever fires first wins
/// and every later fire, from any clone, is a no-op. This is what makes
/// an interrupt handler racing a worker-thread completion safe.
pub struct Resume<T: 'static> {
    slot: Arc<Mutex<Option<Box<dyn Continuation<T> + Send>>>>,
}

impl<T> Clone for Resume<T> {
    fn clone(&self) -> Self {
        Resume {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T> Resume<T> {
    pub(crate) fn new<K>(k: K) -> Self
    where
        K: Continuation<T> + Send + 'static,
    {
        Resume {
            slot: Arc::new(Mutex::new(Some(Box::new(k)))),
        }
    }

    fn take(&self) -> Option<Box<dyn Continuation<T> + Send>> {
        self.slot.lock().expect("resume slot poisoned").take()
    }

    /// Resume the chain on the success channel.
    pub fn start(&self, value: T) {
        if let Some(mut k) = self.take() {
            k.start(value);
        }
    }

    /// Resume the chain on the failure channel.
    pub fn fail(&self, fault: Fault) {
        if let Some(mut k) = self.take() {
            k.fail(fault);
        }
    }

    /// Resume the chain on the stop channel.
    pub fn stop(&self) {
        if let Some(mut k) = self.take() {
            k.stop();
        }
    }

    /// Whether the chain has already been resumed.
    pub fn settled(&self) -> bool {
        self.slot.lock().expect("resume slot poisoned").is_none()
    }
}

type BoxedFailHook<Ctx, T> = Box<dyn FnOnce(&mut Ctx, Resume<T>, Fault) + Send>;
type BoxedStopHook<Ctx, T> = Box<dyn FnOnce(&mut Ctx, Resume<T>) + Send>;

/// Marker for a builder hook that has not been supplied.
pub struct Unset;

/// Builder for a user-defined primitive. Created by [`Eventual::new`].
///
/// The start hook runs when the chain reaches this step; fail and stop
/// hooks intercept the other channels and default to pass-through when
/// absent. All hooks receive the context (if any) and a [`Resume`].
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// let chain = Eventual::<i32>::new()
///     .context(5)
///     .start(|context, resume, _: ()| {
///         let seed = *context;
///         std::thread::spawn(move || resume.start(seed));
///     })
///     .pipe(then(|i| i + 2));
/// assert_eq!(run(chain).unwrap(), 7);
/// ```
pub struct Eventual<T: 'static, Ctx: 'static = (), S = Unset> {
    ctx: Ctx,
    start: S,
    fail: Option<BoxedFailHook<Ctx, T>>,
    stop: Option<BoxedStopHook<Ctx, T>>,
    _value: PhantomData<fn() -> T>,
}

impl<T> Eventual<T> {
    /// Begin building an eventual producing `T`.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Eventual<T> {
        Eventual {
            ctx: (),
            start: Unset,
            fail: None,
            stop: None,
            _value: PhantomData,
        }
    }
}

impl<T, S> Eventual<T, (), S> {
    /// Attach a context value handed by `&mut` to every hook.
    ///
    /// Boxed hooks installed before the context are kept; they never saw
    /// a context and continue not to. A `start` hook installed earlier
    /// keeps its contextless signature, which will not fuse; set the
    /// context first.
    pub fn context<Ctx>(self, ctx: Ctx) -> Eventual<T, Ctx, S>
    where
        T: 'static,
    {
        Eventual {
            ctx,
            start: self.start,
            fail: self.fail.map(|hook| -> BoxedFailHook<Ctx, T> {
                Box::new(move |_, resume, fault| hook(&mut (), resume, fault))
            }),
            stop: self.stop.map(|hook| -> BoxedStopHook<Ctx, T> {
                Box::new(move |_, resume| hook(&mut (), resume))
            }),
            _value: PhantomData,
        }
    }
}

impl<T, Ctx> Eventual<T, Ctx, Unset> {
    /// Supply the start hook.
    pub fn start<S>(self, start: S) -> Eventual<T, Ctx, S> {
        Eventual {
            ctx: self.ctx,
            start,
            fail: self.fail,
            stop: self.stop,
            _value: PhantomData,
        }
    }

    /// Switch to the interruptible variant: the start hook additionally
    /// receives an interrupt [`Handler`].
    pub fn interruptible(self) -> InterruptibleEventual<T, Ctx, Unset> {
        InterruptibleEventual {
            ctx: self.ctx,
            start: Unset,
            fail: self.fail,
            stop: self.stop,
            _value: PhantomData,
        }
    }
}

impl<T, Ctx, S> Eventual<T, Ctx, S> {
    /// Supply the fail hook; absent, failures pass through.
    pub fn fail<F>(mut self, fail: F) -> Self
    where
        F: FnOnce(&mut Ctx, Resume<T>, Fault) + Send + 'static,
        Ctx: 'static,
        T: 'static,
    {
        debug_assert!(self.fail.is_none(), "duplicate fail hook");
        self.fail = Some(Box::new(fail));
        self
    }

    /// Supply the stop hook; absent, stops pass through.
    pub fn stop<F>(mut self, stop: F) -> Self
    where
        F: FnOnce(&mut Ctx, Resume<T>) + Send + 'static,
        Ctx: 'static,
        T: 'static,
    {
        debug_assert!(self.stop.is_none(), "duplicate stop hook");
        self.stop = Some(Box::new(stop));
        self
    }
}

impl<T, Ctx, S> Stage for Eventual<T, Ctx, S> {}

impl<In, T, Ctx, S> Composable<In> for Eventual<T, Ctx, S>
where
    S: FnOnce(&mut Ctx, Resume<T>, In) + Send + 'static,
    Ctx: Send + 'static,
    T: Send + 'static,
{
    type Value = T;

    type Fused<K>
        = EventualContinuation<T, Ctx, S, K>
    where
        K: Continuation<T> + Send + 'static;

    fn fuse<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<T> + Send + 'static,
    {
        EventualContinuation {
            ctx: self.ctx,
            start: Some(self.start),
            fail: self.fail,
            stop: self.stop,
            k: Some(k),
        }
    }
}

pub struct EventualContinuation<T: 'static, Ctx: 'static, S, K> {
    ctx: Ctx,
    start: Option<S>,
    fail: Option<BoxedFailHook<Ctx, T>>,
    stop: Option<BoxedStopHook<Ctx, T>>,
    k: Option<K>,
}

impl<T, Ctx, S, K> EventualContinuation<T, Ctx, S, K>
where
    K: Continuation<T> + Send + 'static,
    T: Send + 'static,
{
    fn resume(&mut self) -> Resume<T> {
        Resume::new(self.k.take().expect("already completed"))
    }
}

impl<In, T, Ctx, S, K> Continuation<In> for EventualContinuation<T, Ctx, S, K>
where
    S: FnOnce(&mut Ctx, Resume<T>, In) + Send + 'static,
    Ctx: Send + 'static,
    T: Send + 'static,
    K: Continuation<T> + Send + 'static,
{
    fn start(&mut self, value: In) {
        let hook = self.start.take().expect("started twice");
        let resume = self.resume();
        hook(&mut self.ctx, resume, value);
    }

    fn fail(&mut self, fault: Fault) {
        match self.fail.take() {
            Some(hook) => {
                let resume = self.resume();
                hook(&mut self.ctx, resume, fault);
            }
            None => self.k.take().expect("already completed").fail(fault),
        }
    }

    fn stop(&mut self) {
        match self.stop.take() {
            Some(hook) => {
                let resume = self.resume();
                hook(&mut self.ctx, resume);
            }
            None => self.k.take().expect("already completed").stop(),
        }
    }

    fn register(&mut self, interrupt: &Interrupt) {
        self.k
            .as_mut()
            .expect("already completed")
            .register(interrupt);
    }
}

/// Builder for an interruptible eventual; see
/// [`Eventual::interruptible`].
pub struct InterruptibleEventual<T: 'static, Ctx: 'static = (), S = Unset> {
    ctx: Ctx,
    start: S,
    fail: Option<BoxedFailHook<Ctx, T>>,
    stop: Option<BoxedStopHook<Ctx, T>>,
    _value: PhantomData<fn() -> T>,
}

impl<T, S> InterruptibleEventual<T, (), S> {
    /// Attach a context value handed by `&mut` to every hook.
    pub fn context<Ctx>(self, ctx: Ctx) -> InterruptibleEventual<T, Ctx, S>
    where
        T: 'static,
    {
        InterruptibleEventual {
            ctx,
            start: self.start,
            fail: self.fail.map(|hook| -> BoxedFailHook<Ctx, T> {
                Box::new(move |_, resume, fault| hook(&mut (), resume, fault))
            }),
            stop: self.stop.map(|hook| -> BoxedStopHook<Ctx, T> {
                Box::new(move |_, resume| hook(&mut (), resume))
            }),
            _value: PhantomData,
        }
    }
}

impl<T, Ctx> InterruptibleEventual<T, Ctx, Unset> {
    /// Supply the start hook. Install a cancellation callback through the
    /// handler; the conventional callback resumes on the stop channel.
    pub fn start<S>(self, start: S) -> InterruptibleEventual<T, Ctx, S> {
        InterruptibleEventual {
            ctx: self.ctx,
            start,
            fail: self.fail,
            stop: self.stop,
            _value: PhantomData,
        }
    }
}

impl<T, Ctx, S> InterruptibleEventual<T, Ctx, S> {
    /// Supply the fail hook; absent, failures pass through.
    pub fn fail<F>(mut self, fail: F) -> Self
    where
        F: FnOnce(&mut Ctx, Resume<T>, Fault) + Send + 'static,
        Ctx: 'static,
        T: 'static,
    {
        self.fail = Some(Box::new(fail));
        self
    }

    /// Supply the stop hook; absent, stops pass through.
    pub fn stop<F>(mut self, stop: F) -> Self
    where
        F: FnOnce(&mut Ctx, Resume<T>) + Send + 'static,
        Ctx: 'static,
        T: 'static,
    {
        self.stop = Some(Box::new(stop));
        self
    }
}

impl<T, Ctx, S> Stage for InterruptibleEventual<T, Ctx, S> {}

impl<In, T, Ctx, S> Composable<In> for InterruptibleEventual<T, Ctx, S>
where
    S: FnOnce(&mut Ctx, Resume<T>, In, &Handler) + Send + 'static,
    Ctx: Send + 'static,
    T: Send + 'static,
{
    type Value = T;

    type Fused<K>
        = InterruptibleContinuation<T, Ctx, S, K>
    where
        K: Continuation<T> + Send + 'static;

    fn fuse<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<T> + Send + 'static,
    {
        InterruptibleContinuation {
            ctx: self.ctx,
            start: Some(self.start),
            fail: self.fail,
            stop: self.stop,
            interrupt: None,
            k: Some(k),
        }
    }
}

pub struct InterruptibleContinuation<T: 'static, Ctx: 'static, S, K> {
    ctx: Ctx,
    start: Option<S>,
    fail: Option<BoxedFailHook<Ctx, T>>,
    stop: Option<BoxedStopHook<Ctx, T>>,
    interrupt: Option<Interrupt>,
    k: Option<K>,
}

impl<In, T, Ctx, S, K> Continuation<In> for InterruptibleContinuation<T, Ctx, S, K>
where
    S: FnOnce(&mut Ctx, Resume<T>, In, &Handler) + Send + 'static,
    Ctx: Send + 'static,
    T: Send + 'static,
    K: Continuation<T> + Send + 'static,
{
    fn start(&mut self, value: In) {
        let hook = self.start.take().expect("started twice");
        let resume = Resume::new(self.k.take().expect("already completed"));
        // An unregistered chain still gets a handler; it just belongs to
        // an interrupt nobody can trigger.
        let interrupt = self.interrupt.clone().unwrap_or_default();
        let handler = interrupt.handler();
        hook(&mut self.ctx, resume, value, &handler);
    }

    fn fail(&mut self, fault: Fault) {
        match self.fail.take() {
            Some(hook) => {
                let resume = Resume::new(self.k.take().expect("already completed"));
                hook(&mut self.ctx, resume, fault);
            }
            None => self.k.take().expect("already completed").fail(fault),
        }
    }

    fn stop(&mut self) {
        match self.stop.take() {
            Some(hook) => {
                let resume = Resume::new(self.k.take().expect("already completed"));
                hook(&mut self.ctx, resume);
            }
            None => self.k.take().expect("already completed").stop(),
        }
    }

    fn register(&mut self, interrupt: &Interrupt) {
        self.interrupt = Some(interrupt.clone());
        self.k
            .as_mut()
            .expect("already completed")
            .register(interrupt);
    }
}
