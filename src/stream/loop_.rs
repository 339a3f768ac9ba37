//! The general stream terminal.
//!
//! A [`Loop`] receives every stream event and decides, per element,
//! whether to pull again or terminate early; on `ended` it settles the
//! enclosing value chain. The other terminals in this module are
//! special-cased loops.

use crate::compose::Continuation;
use crate::fault::Fault;
use crate::interrupt::{Handler, Interrupt};
use crate::stream::{StreamConsumer, StreamHandle, StreamTerminal};

type BeginHook<Ctx> = Box<dyn FnOnce(&mut Ctx, &StreamHandle, &Handler) + Send>;
type BodyHook<Ctx, Item> = Box<dyn FnMut(&mut Ctx, &StreamHandle, Item) + Send>;
type EndedHook<Ctx, V> = Box<dyn FnOnce(&mut Ctx, &mut dyn Continuation<V>) + Send>;
type FailHook<Ctx, V> = Box<dyn FnOnce(&mut Ctx, &mut dyn Continuation<V>, Fault) + Send>;
type StopHook<Ctx, V> = Box<dyn FnOnce(&mut Ctx, &mut dyn Continuation<V>) + Send>;

/// Builder for a stream terminal producing a `V` into the enclosing
/// chain from a stream of `Item`s.
///
/// Defaults: `begin` and `body` pull unconditionally; `fail` and `stop`
/// pass through. [`Loop::new`] builds a unit-valued loop whose default
/// `ended` starts the chain with `()`; a value-producing loop from
/// [`Loop::of`] must install `ended`.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// let chain = iterate(vec![5, 4, 3, 2, 1]).drain(
///     Loop::<i32, i32>::of()
///         .context(0)
///         .body(|sum: &mut i32, stream, value: i32| {
///             *sum += value;
///             stream.next();
///         })
///         .ended(|sum, k| k.start(*sum)),
/// );
/// assert_eq!(run(chain).unwrap(), 15);
/// ```
pub struct Loop<V: 'static, Item: 'static, Ctx: 'static = ()> {
    ctx: Ctx,
    begin: Option<BeginHook<Ctx>>,
    body: Option<BodyHook<Ctx, Item>>,
    ended: Option<EndedHook<Ctx, V>>,
    fail: Option<FailHook<Ctx, V>>,
    stop: Option<StopHook<Ctx, V>>,
}

impl<Item> Loop<(), Item, ()> {
    /// A unit-valued loop: consume the whole stream, then start the
    /// chain with `()`.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Loop {
            ctx: (),
            begin: None,
            body: None,
            ended: Some(Box::new(|_ctx, k| k.start(()))),
            fail: None,
            stop: None,
        }
    }
}

impl<V, Item> Loop<V, Item, ()> {
    /// A value-producing loop; install `ended` to settle the chain.
    pub fn of() -> Self {
        Loop {
            ctx: (),
            begin: None,
            body: None,
            ended: None,
            fail: None,
            stop: None,
        }
    }

    /// Attach a context value handed by `&mut` to every hook.
    ///
    /// Hooks installed before the context (including `Loop::new`'s
    /// default `ended`) are kept; they never saw a context and continue
    /// not to.
    pub fn context<Ctx>(self, ctx: Ctx) -> Loop<V, Item, Ctx>
    where
        V: 'static,
        Item: 'static,
    {
        Loop {
            ctx,
            begin: self.begin.map(|hook| -> BeginHook<Ctx> {
                Box::new(move |_, stream, handler| hook(&mut (), stream, handler))
            }),
            body: self.body.map(|mut hook| -> BodyHook<Ctx, Item> {
                Box::new(move |_, stream, item| hook(&mut (), stream, item))
            }),
            ended: self.ended.map(|hook| -> EndedHook<Ctx, V> {
                Box::new(move |_, k| hook(&mut (), k))
            }),
            fail: self.fail.map(|hook| -> FailHook<Ctx, V> {
                Box::new(move |_, k, fault| hook(&mut (), k, fault))
            }),
            stop: self.stop.map(|hook| -> StopHook<Ctx, V> {
                Box::new(move |_, k| hook(&mut (), k))
            }),
        }
    }
}

impl<V, Item, Ctx> Loop<V, Item, Ctx> {
    /// Hook run when the stream begins; defaults to pulling the first
    /// element.
    pub fn begin<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Ctx, &StreamHandle) + Send + 'static,
    {
        debug_assert!(self.begin.is_none(), "duplicate begin hook");
        self.begin = Some(Box::new(move |ctx, stream, _handler| f(ctx, stream)));
        self
    }

    /// Hook run per element; defaults to pulling the next one.
    pub fn body<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut Ctx, &StreamHandle, Item) + Send + 'static,
    {
        debug_assert!(self.body.is_none(), "duplicate body hook");
        self.body = Some(Box::new(f));
        self
    }

    /// Hook run on normal termination; settles the enclosing chain.
    pub fn ended<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Ctx, &mut dyn Continuation<V>) + Send + 'static,
    {
        debug_assert!(self.ended.is_none(), "duplicate ended hook");
        self.ended = Some(Box::new(f));
        self
    }

    /// Hook intercepting a stream failure; defaults to pass-through.
    pub fn fail<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Ctx, &mut dyn Continuation<V>, Fault) + Send + 'static,
    {
        debug_assert!(self.fail.is_none(), "duplicate fail hook");
        self.fail = Some(Box::new(f));
        self
    }

    /// Hook intercepting a stream stop; defaults to pass-through.
    pub fn stop<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Ctx, &mut dyn Continuation<V>) + Send + 'static,
    {
        debug_assert!(self.stop.is_none(), "duplicate stop hook");
        self.stop = Some(Box::new(f));
        self
    }

    /// Switch to the interruptible variant: the begin hook additionally
    /// receives an interrupt [`Handler`].
    pub fn interruptible(self) -> InterruptibleLoop<V, Item, Ctx> {
        debug_assert!(self.begin.is_none(), "set interruptible before begin");
        InterruptibleLoop { inner: self }
    }
}

/// Interruptible variant of [`Loop`]; see [`Loop::interruptible`].
pub struct InterruptibleLoop<V: 'static, Item: 'static, Ctx: 'static = ()> {
    inner: Loop<V, Item, Ctx>,
}

impl<V, Item, Ctx> InterruptibleLoop<V, Item, Ctx> {
    /// Hook run when the stream begins, with an interrupt [`Handler`]
    /// for installing a cancellation callback.
    pub fn begin<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Ctx, &StreamHandle, &Handler) + Send + 'static,
    {
        debug_assert!(self.inner.begin.is_none(), "duplicate begin hook");
        self.inner.begin = Some(Box::new(f));
        self
    }

    /// See [`Loop::body`].
    pub fn body<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut Ctx, &StreamHandle, Item) + Send + 'static,
    {
        self.inner = self.inner.body(f);
        self
    }

    /// See [`Loop::ended`].
    pub fn ended<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Ctx, &mut dyn Continuation<V>) + Send + 'static,
    {
        self.inner = self.inner.ended(f);
        self
    }

    /// See [`Loop::fail`].
    pub fn fail<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Ctx, &mut dyn Continuation<V>, Fault) + Send + 'static,
    {
        self.inner = self.inner.fail(f);
        self
    }

    /// See [`Loop::stop`].
    pub fn stop<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Ctx, &mut dyn Continuation<V>) + Send + 'static,
    {
        self.inner = self.inner.stop(f);
        self
    }
}

impl<V, Item, Ctx> crate::stream::TerminalStage for Loop<V, Item, Ctx> {}

impl<V, Item, Ctx> crate::stream::TerminalStage for InterruptibleLoop<V, Item, Ctx> {}

impl<V, Item, Ctx> StreamTerminal<Item> for Loop<V, Item, Ctx>
where
    V: 'static,
    Ctx: Send + 'static,
{
    type Value = V;

    type Fused<K>
        = LoopConsumer<V, Item, Ctx, K>
    where
        K: Continuation<V> + Send + 'static;

    fn fuse_terminal<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<V> + Send + 'static,
    {
        LoopConsumer {
            ctx: self.ctx,
            begin: self.begin,
            body: self.body,
            ended: self.ended,
            fail: self.fail,
            stop: self.stop,
            handle: None,
            interrupt: None,
            k,
        }
    }
}

impl<V, Item, Ctx> StreamTerminal<Item> for InterruptibleLoop<V, Item, Ctx>
where
    V: 'static,
    Ctx: Send + 'static,
{
    type Value = V;

    type Fused<K>
        = LoopConsumer<V, Item, Ctx, K>
    where
        K: Continuation<V> + Send + 'static;

    fn fuse_terminal<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<V> + Send + 'static,
    {
        self.inner.fuse_terminal(k)
    }
}

pub struct LoopConsumer<V: 'static, Item: 'static, Ctx: 'static, K> {
    ctx: Ctx,
    begin: Option<BeginHook<Ctx>>,
    body: Option<BodyHook<Ctx, Item>>,
    ended: Option<EndedHook<Ctx, V>>,
    fail: Option<FailHook<Ctx, V>>,
    stop: Option<StopHook<Ctx, V>>,
    handle: Option<StreamHandle>,
    interrupt: Option<Interrupt>,
    k: K,
}

impl<V, Item, Ctx, K> StreamConsumer<Item> for LoopConsumer<V, Item, Ctx, K>
where
    V: 'static,
    Ctx: Send + 'static,
    K: Continuation<V> + 'static,
{
    fn begin(&mut self, stream: StreamHandle) {
        self.handle = Some(stream.clone());
        match self.begin.take() {
            Some(hook) => {
                let interrupt = self.interrupt.clone().unwrap_or_default();
                let handler = interrupt.handler();
                hook(&mut self.ctx, &stream, &handler);
            }
            None => stream.next(),
        }
    }

    fn body(&mut self, item: Item) {
        let handle = self.handle.clone().expect("body before begin");
        match self.body.as_mut() {
            Some(hook) => hook(&mut self.ctx, &handle, item),
            None => handle.next(),
        }
    }

    fn ended(&mut self) {
        match self.ended.take() {
            Some(hook) => hook(&mut self.ctx, &mut self.k),
            None => panic!("value-producing loop finished without an ended hook"),
        }
    }

    fn fail(&mut self, fault: Fault) {
        match self.fail.take() {
            Some(hook) => hook(&mut self.ctx, &mut self.k, fault),
            None => self.k.fail(fault),
        }
    }

    fn stop(&mut self) {
        match self.stop.take() {
            Some(hook) => hook(&mut self.ctx, &mut self.k),
            None => self.k.stop(),
        }
    }

    fn register(&mut self, interrupt: &Interrupt) {
        self.interrupt = Some(interrupt.clone());
        self.k.register(interrupt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::ComposableExt;
    use crate::fault::Outcome;
    use crate::stream::{iterate, StreamComposableExt, Stream};
    use crate::terminal::run;

    #[test]
    fn test_loop_sums_stream() {
        let chain = iterate(vec![5, 4, 3, 2, 1]).drain(
            Loop::<i32, i32>::of()
                .context(0)
                .body(|sum: &mut i32, stream, value: i32| {
                    *sum += value;
                    stream.next();
                })
                .ended(|sum, k| k.start(*sum)),
        );
        assert_eq!(run(chain).unwrap(), 15);
    }

    #[test]
    fn test_loop_can_terminate_early() {
        let chain = Stream::<i32>::new()
            .context(0)
            .next(|value, k| {
                k.emit(*value);
            })
            .drain(
                Loop::<i32, i32>::of()
                    .context(0)
                    .body(|count: &mut i32, stream, _value: i32| {
                        *count += 1;
                        if *count == 2 {
                            stream.done();
                        } else {
                            stream.next();
                        }
                    })
                    .ended(|count, k| k.start(*count)),
            );
        assert_eq!(run(chain).unwrap(), 2);
    }

    #[test]
    fn test_unit_loop_consumes_whole_stream() {
        let chain = iterate(vec![1, 2, 3]).drain(Loop::new());
        assert!(matches!(run(chain), Outcome::Value(())));
    }

    #[test]
    fn test_stream_failure_reaches_loop_fail_hook() {
        let chain = Stream::<i32>::new()
            .context("error")
            .next(|message, k| k.fail(crate::fault::Fault::from(*message)))
            .drain(
                Loop::<i32, i32>::of()
                    .body(|_, stream, _: i32| stream.next())
                    .ended(|_, _| unreachable!("stream never ends"))
                    .fail(|_, k, fault| k.fail(fault)),
            );
        assert_eq!(run(chain).unwrap_fault().to_string(), "error");
    }

    #[test]
    fn test_loop_stop_hook_observes_stream_stop() {
        let chain = Stream::<i32>::new()
            .context(())
            .next(|_, k| k.stop())
            .drain(
                Loop::<i32, i32>::of()
                    .ended(|_, _| unreachable!("stream never ends"))
                    .stop(|_, k| k.stop()),
            );
        assert!(run(chain).is_stopped());
    }
}
