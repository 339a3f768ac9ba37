//! The user-hook stream source.
//!
//! A [`Stream`] builder carries hooks that produce elements on demand.
//! Once started, the hooks, context, and consumer move into a shared core
//! with a request queue: `next`/`done` calls enqueue, and whichever
//! caller finds the core idle drains the queue, dispatching each hook in
//! the scheduling context captured when the stream began. Re-entrant
//! requests from inside a hook only enqueue, so arbitrarily long streams
//! run in constant stack.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use crate::callback::OnceCallback;
use crate::compose::Continuation;
use crate::fault::Fault;
use crate::interrupt::{Handler, Interrupt};
use crate::scheduler::Context;
use crate::stream::{StreamComposable, StreamConsumer, StreamDriver, StreamHandle};

/// The emission surface handed to stream hooks.
///
/// A `next` hook answers with exactly one of [`emit`](Emitter::emit),
/// [`ended`](Emitter::ended), [`fail`](Emitter::fail), or
/// [`stop`](Emitter::stop); a `begin` hook signals readiness with
/// [`begin`](Emitter::begin).
pub struct Emitter<'a, Item> {
    consumer: &'a mut dyn StreamConsumer<Item>,
    handle: Option<&'a StreamHandle>,
}

impl<'a, Item> Emitter<'a, Item> {
    /// Hand one element downstream.
    pub fn emit(&mut self, item: Item) {
        self.consumer.body(item);
    }

    /// Signal normal termination.
    pub fn ended(&mut self) {
        self.consumer.ended();
    }

    /// Fail the stream.
    pub fn fail(&mut self, fault: Fault) {
        self.consumer.fail(fault);
    }

    /// Stop the stream cooperatively.
    pub fn stop(&mut self) {
        self.consumer.stop();
    }

    /// Signal readiness downstream; only meaningful from a `begin` hook.
    pub fn begin(&mut self) {
        let handle = self
            .handle
            .expect("begin is only available once the stream has started")
            .clone();
        self.consumer.begin(handle);
    }
}

type BeginHook<T, Ctx> =
    Box<dyn for<'a> FnOnce(&mut Ctx, &mut Emitter<'a, T>, &Handler) + Send>;
type NextHook<T, Ctx> = Box<dyn for<'a> FnMut(&mut Ctx, &mut Emitter<'a, T>) + Send>;
type DoneHook<T, Ctx> = Box<dyn for<'a> FnOnce(&mut Ctx, &mut Emitter<'a, T>) + Send>;
type FailHook<T, Ctx> =
    Box<dyn for<'a> FnOnce(&mut Ctx, &mut Emitter<'a, T>, Fault) + Send>;
type StopHook<T, Ctx> = Box<dyn for<'a> FnOnce(&mut Ctx, &mut Emitter<'a, T>) + Send>;

/// Builder for a user-hook stream source producing `T`.
///
/// The `next` hook is required; `done` defaults to signalling `ended`,
/// `begin` defaults to signalling readiness, and `fail`/`stop` default to
/// pass-through.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// let chain = Stream::<i32>::new()
///     .context(5)
///     .next(|count: &mut i32, k: &mut Emitter<i32>| {
///         if *count > 0 {
///             let value = *count;
///             *count -= 1;
///             k.emit(value);
///         } else {
///             k.ended();
///         }
///     })
///     .drain(
///         Loop::<i32, i32>::of()
///             .context(0)
///             .body(|sum: &mut i32, stream, value: i32| {
///                 *sum += value;
///                 stream.next();
///             })
///             .ended(|sum, k| k.start(*sum)),
///     );
/// assert_eq!(run(chain).unwrap(), 15);
/// ```
pub struct Stream<T: 'static, Ctx: 'static = ()> {
    ctx: Ctx,
    begin: Option<BeginHook<T, Ctx>>,
    next: Option<NextHook<T, Ctx>>,
    done: Option<DoneHook<T, Ctx>>,
    fail: Option<FailHook<T, Ctx>>,
    stop: Option<StopHook<T, Ctx>>,
    _item: PhantomData<fn() -> T>,
}

impl<T> Stream<T> {
    /// Begin building a stream of `T`.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Stream<T> {
        Stream {
            ctx: (),
            begin: None,
            next: None,
            done: None,
            fail: None,
            stop: None,
            _item: PhantomData,
        }
    }

    /// Attach a context value handed by `&mut` to every hook.
    ///
    /// Hooks installed before the context are kept; they never saw a
    /// context and continue not to.
    pub fn context<Ctx>(self, ctx: Ctx) -> Stream<T, Ctx>
    where
        T: 'static,
    {
        Stream {
            ctx,
            begin: self.begin.map(|hook| -> BeginHook<T, Ctx> {
                Box::new(move |_, emitter, handler| hook(&mut (), emitter, handler))
            }),
            next: self.next.map(|mut hook| -> NextHook<T, Ctx> {
                Box::new(move |_, emitter| hook(&mut (), emitter))
            }),
            done: self.done.map(|hook| -> DoneHook<T, Ctx> {
                Box::new(move |_, emitter| hook(&mut (), emitter))
            }),
            fail: self.fail.map(|hook| -> FailHook<T, Ctx> {
                Box::new(move |_, emitter, fault| hook(&mut (), emitter, fault))
            }),
            stop: self.stop.map(|hook| -> StopHook<T, Ctx> {
                Box::new(move |_, emitter| hook(&mut (), emitter))
            }),
            _item: PhantomData,
        }
    }
}

impl<T, Ctx> Stream<T, Ctx> {
    /// Hook run once when the stream begins; defaults to signalling
    /// readiness downstream.
    pub fn begin<F>(mut self, f: F) -> Self
    where
        F: for<'a> FnOnce(&mut Ctx, &mut Emitter<'a, T>) + Send + 'static,
    {
        debug_assert!(self.begin.is_none(), "duplicate begin hook");
        self.begin = Some(Box::new(move |ctx, emitter, _handler| f(ctx, emitter)));
        self
    }

    /// Hook run for each requested element. Required.
    pub fn next<F>(mut self, f: F) -> Self
    where
        F: for<'a> FnMut(&mut Ctx, &mut Emitter<'a, T>) + Send + 'static,
    {
        debug_assert!(self.next.is_none(), "duplicate next hook");
        self.next = Some(Box::new(f));
        self
    }

    /// Hook run when the consumer requests early termination; defaults
    /// to signalling `ended`.
    pub fn done<F>(mut self, f: F) -> Self
    where
        F: for<'a> FnOnce(&mut Ctx, &mut Emitter<'a, T>) + Send + 'static,
    {
        debug_assert!(self.done.is_none(), "duplicate done hook");
        self.done = Some(Box::new(f));
        self
    }

    /// Hook intercepting an upstream failure; defaults to pass-through.
    pub fn fail<F>(mut self, f: F) -> Self
    where
        F: for<'a> FnOnce(&mut Ctx, &mut Emitter<'a, T>, Fault) + Send + 'static,
    {
        debug_assert!(self.fail.is_none(), "duplicate fail hook");
        self.fail = Some(Box::new(f));
        self
    }

    /// Hook intercepting an upstream stop; defaults to pass-through.
    pub fn stop<F>(mut self, f: F) -> Self
    where
        F: for<'a> FnOnce(&mut Ctx, &mut Emitter<'a, T>) + Send + 'static,
    {
        debug_assert!(self.stop.is_none(), "duplicate stop hook");
        self.stop = Some(Box::new(f));
        self
    }

    /// Switch to the interruptible variant: the begin hook additionally
    /// receives an interrupt [`Handler`].
    pub fn interruptible(self) -> InterruptibleStream<T, Ctx> {
        debug_assert!(self.begin.is_none(), "set interruptible before begin");
        InterruptibleStream { inner: self }
    }
}

/// Interruptible variant of [`Stream`]; see [`Stream::interruptible`].
pub struct InterruptibleStream<T: 'static, Ctx: 'static = ()> {
    inner: Stream<T, Ctx>,
}

impl<T, Ctx> InterruptibleStream<T, Ctx> {
    /// Hook run once when the stream begins, with an interrupt
    /// [`Handler`] for installing a cancellation callback.
    pub fn begin<F>(mut self, f: F) -> Self
    where
        F: for<'a> FnOnce(&mut Ctx, &mut Emitter<'a, T>, &Handler) + Send + 'static,
    {
        debug_assert!(self.inner.begin.is_none(), "duplicate begin hook");
        self.inner.begin = Some(Box::new(f));
        self
    }

    /// See [`Stream::next`].
    pub fn next<F>(mut self, f: F) -> Self
    where
        F: for<'a> FnMut(&mut Ctx, &mut Emitter<'a, T>) + Send + 'static,
    {
        self.inner = self.inner.next(f);
        self
    }

    /// See [`Stream::done`].
    pub fn done<F>(mut self, f: F) -> Self
    where
        F: for<'a> FnOnce(&mut Ctx, &mut Emitter<'a, T>) + Send + 'static,
    {
        self.inner = self.inner.done(f);
        self
    }

    /// See [`Stream::fail`].
    pub fn fail<F>(mut self, f: F) -> Self
    where
        F: for<'a> FnOnce(&mut Ctx, &mut Emitter<'a, T>, Fault) + Send + 'static,
    {
        self.inner = self.inner.fail(f);
        self
    }

    /// See [`Stream::stop`].
    pub fn stop<F>(mut self, f: F) -> Self
    where
        F: for<'a> FnOnce(&mut Ctx, &mut Emitter<'a, T>) + Send + 'static,
    {
        self.inner = self.inner.stop(f);
        self
    }
}

enum Request {
    Next,
    Done,
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<Request>,
    driving: bool,
}

struct Core<T: 'static, Ctx: 'static, K> {
    ctx: Ctx,
    next: NextHook<T, Ctx>,
    done: Option<DoneHook<T, Ctx>>,
    handle: StreamHandle,
    previous: Context,
    k: K,
}

struct Shared<T, Ctx, K> {
    state: Mutex<QueueState>,
    core: Mutex<Option<Core<T, Ctx, K>>>,
}

impl<T, Ctx, K> Shared<T, Ctx, K>
where
    T: Send + 'static,
    Ctx: Send + 'static,
    K: StreamConsumer<T> + Send + 'static,
{
    fn enqueue(self: &Arc<Self>, request: Request) {
        {
            let mut state = self.state.lock().expect("stream queue poisoned");
            state.queue.push_back(request);
            if state.driving {
                return;
            }
            state.driving = true;
        }
        self.drain();
    }

    fn drain(self: &Arc<Self>) {
        loop {
            let request = {
                let mut state = self.state.lock().expect("stream queue poisoned");
                match state.queue.pop_front() {
                    Some(request) => request,
                    None => {
                        state.driving = false;
                        return;
                    }
                }
            };
            self.process(request);
        }
    }

    fn process(self: &Arc<Self>, request: Request) {
        let previous = {
            let core = self.core.lock().expect("stream core poisoned");
            core.as_ref().map(|core| core.previous.clone())
        };
        let Some(previous) = previous else { return };

        if previous.continuable() {
            let restore = Context::switch(previous);
            self.dispatch(request);
            Context::switch(restore);
        } else {
            let shared = Arc::clone(self);
            previous.scheduler().submit(
                OnceCallback::new(move |()| shared.dispatch(request)),
                &previous,
            );
        }
    }

    fn dispatch(&self, request: Request) {
        let mut guard = self.core.lock().expect("stream core poisoned");
        let Some(core) = guard.as_mut() else { return };
        let Core {
            ctx,
            next,
            done,
            handle,
            k,
            ..
        } = core;
        let mut emitter = Emitter {
            consumer: &mut *k,
            handle: Some(&*handle),
        };
        match request {
            Request::Next => (next)(ctx, &mut emitter),
            Request::Done => match done.take() {
                Some(hook) => hook(ctx, &mut emitter),
                None => emitter.ended(),
            },
        }
    }
}

struct SourceDriver<T, Ctx, K> {
    shared: Arc<Shared<T, Ctx, K>>,
}

impl<T, Ctx, K> StreamDriver for SourceDriver<T, Ctx, K>
where
    T: Send + 'static,
    Ctx: Send + 'static,
    K: StreamConsumer<T> + Send + 'static,
{
    fn next(&self) {
        self.shared.enqueue(Request::Next);
    }

    fn done(&self) {
        self.shared.enqueue(Request::Done);
    }
}

impl<T, Ctx> crate::stream::SourceStage for Stream<T, Ctx> {}

impl<In, T, Ctx> StreamComposable<In> for Stream<T, Ctx>
where
    T: Send + 'static,
    Ctx: Send + 'static,
{
    type Item = T;

    type Fused<K>
        = StreamContinuation<T, Ctx, K>
    where
        K: StreamConsumer<T>;

    fn fuse_stream<K>(self, k: K) -> Self::Fused<K>
    where
        K: StreamConsumer<T>,
    {
        StreamContinuation {
            ctx: Some(self.ctx),
            begin: self.begin,
            next: self.next,
            done: self.done,
            fail: self.fail,
            stop: self.stop,
            interrupt: None,
            k: Some(k),
        }
    }
}

impl<T, Ctx> crate::stream::SourceStage for InterruptibleStream<T, Ctx> {}

impl<In, T, Ctx> StreamComposable<In> for InterruptibleStream<T, Ctx>
where
    T: Send + 'static,
    Ctx: Send + 'static,
{
    type Item = T;

    type Fused<K>
        = StreamContinuation<T, Ctx, K>
    where
        K: StreamConsumer<T>;

    fn fuse_stream<K>(self, k: K) -> Self::Fused<K>
    where
        K: StreamConsumer<T>,
    {
        self.inner.fuse_stream(k)
    }
}

pub struct StreamContinuation<T: 'static, Ctx: 'static, K> {
    ctx: Option<Ctx>,
    begin: Option<BeginHook<T, Ctx>>,
    next: Option<NextHook<T, Ctx>>,
    done: Option<DoneHook<T, Ctx>>,
    fail: Option<FailHook<T, Ctx>>,
    stop: Option<StopHook<T, Ctx>>,
    interrupt: Option<Interrupt>,
    k: Option<K>,
}

impl<In, T, Ctx, K> Continuation<In> for StreamContinuation<T, Ctx, K>
where
    T: Send + 'static,
    Ctx: Send + 'static,
    K: StreamConsumer<T> + Send + 'static,
{
    fn start(&mut self, _value: In) {
        let ctx = self.ctx.take().expect("started twice");
        let next = self.next.take().expect("stream has no next hook");
        let done = self.done.take();
        let begin = self.begin.take();
        let k = self.k.take().expect("already completed");

        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            core: Mutex::new(None),
        });
        let handle = StreamHandle::new(Arc::new(SourceDriver {
            shared: Arc::clone(&shared),
        }));
        *shared.core.lock().expect("stream core poisoned") = Some(Core {
            ctx,
            next,
            done,
            handle: handle.clone(),
            previous: Context::current(),
            k,
        });

        // Absorb requests made from inside the begin hook; drained below.
        shared
            .state
            .lock()
            .expect("stream queue poisoned")
            .driving = true;

        {
            let mut guard = shared.core.lock().expect("stream core poisoned");
            let core = guard.as_mut().expect("core just installed");
            let Core { ctx, handle, k, .. } = core;
            let mut emitter = Emitter {
                consumer: &mut *k,
                handle: Some(&*handle),
            };
            let interrupt = self.interrupt.clone().unwrap_or_default();
            let handler = interrupt.handler();
            match begin {
                Some(hook) => hook(ctx, &mut emitter, &handler),
                None => emitter.begin(),
            }
        }

        shared.drain();
    }

    fn fail(&mut self, fault: Fault) {
        let mut ctx = self.ctx.take().expect("already completed");
        let mut k = self.k.take().expect("already completed");
        match self.fail.take() {
            Some(hook) => {
                let mut emitter = Emitter {
                    consumer: &mut k,
                    handle: None,
                };
                hook(&mut ctx, &mut emitter, fault);
            }
            None => k.fail(fault),
        }
    }

    fn stop(&mut self) {
        let mut ctx = self.ctx.take().expect("already completed");
        let mut k = self.k.take().expect("already completed");
        match self.stop.take() {
            Some(hook) => {
                let mut emitter = Emitter {
                    consumer: &mut k,
                    handle: None,
                };
                hook(&mut ctx, &mut emitter);
            }
            None => k.stop(),
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
