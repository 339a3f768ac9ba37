//! Pull-based, backpressured streams over the same three channels.
//!
//! A stream section splices into a value chain: its source receives the
//! chain's start/fail/stop like any step, and from then on data flows
//! through the stream protocol: the consumer receives `begin` with a
//! [`StreamHandle`], answers each `body` by calling
//! [`next`](StreamHandle::next) or [`done`](StreamHandle::done), and the
//! section settles back into the value chain at its terminal with exactly
//! one of `ended`-derived start, fail, or stop.
//!
//! Composition mirrors the value side: sources implement
//! [`StreamComposable`], per-item transforms implement [`StreamAdapter`]
//! and attach with [`pipe`](StreamComposableExt::pipe), and terminals
//! implement [`StreamTerminal`] and attach with
//! [`drain`](StreamComposableExt::drain), yielding an ordinary
//! [`Composable`].

mod collect;
mod flat_map;
mod generator;
mod head;
mod iterate;
mod loop_;
mod map;
mod reduce;
mod repeat;
mod source;
mod take;

pub use collect::{collect, Collect};
pub use flat_map::{flat_map, FlatMap};
pub use generator::Generator;
pub use head::{head, Head};
pub use iterate::{iterate, range};
pub use loop_::{InterruptibleLoop, Loop};
pub use map::{map, Map};
pub use reduce::{reduce, Reduce};
pub use repeat::repeat;
pub use source::{Emitter, InterruptibleStream, Stream};
pub use take::{take, Take};

use std::sync::Arc;

use crate::compose::{Composable, Continuation};
use crate::fault::Fault;
use crate::interrupt::Interrupt;

/// The upward interface of a stream consumer.
///
/// Per stream run the consumer sees one `begin`, any number of `body`
/// calls, each one answered through the handle, and exactly one of
/// `ended`, `fail`, or `stop`.
pub trait StreamConsumer<Item> {
    /// The stream is ready; drive it through `stream`.
    fn begin(&mut self, stream: StreamHandle);

    /// One element. Not a total output: call `next` or `done` on the
    /// handle to proceed.
    fn body(&mut self, item: Item);

    /// Normal termination: no more elements.
    fn ended(&mut self);

    /// The stream failed.
    fn fail(&mut self, fault: Fault);

    /// The stream was cooperatively stopped.
    fn stop(&mut self);

    /// See [`Continuation::register`].
    fn register(&mut self, interrupt: &Interrupt);
}

impl<Item> StreamConsumer<Item> for Box<dyn StreamConsumer<Item> + Send> {
    fn begin(&mut self, stream: StreamHandle) {
        (**self).begin(stream)
    }

    fn body(&mut self, item: Item) {
        (**self).body(item)
    }

    fn ended(&mut self) {
        (**self).ended()
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

/// The driving half of the protocol: ask for the next element or
/// terminate early.
pub trait StreamDriver: Send + Sync {
    fn next(&self);
    fn done(&self);
}

/// A type-erased, cheaply cloneable handle for driving a stream.
///
/// Calls are queued and processed by whichever caller finds the stream
/// idle, so a consumer may call `next` from inside its own `body` without
/// growing the stack.
#[derive(Clone)]
pub struct StreamHandle {
    driver: Arc<dyn StreamDriver>,
}

impl StreamHandle {
    pub(crate) fn new(driver: Arc<dyn StreamDriver>) -> Self {
        StreamHandle { driver }
    }

    /// Request the next element.
    pub fn next(&self) {
        self.driver.next();
    }

    /// Request termination; the stream answers with `ended`.
    pub fn done(&self) {
        self.driver.done();
    }
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StreamHandle")
    }
}

/// A value-typed description of a stream source.
pub trait StreamComposable<In>: Sized {
    /// The element type this stream produces.
    type Item;

    /// The continuation produced by fusing with a consumer `K`.
    type Fused<K>: Continuation<In>
    where
        K: StreamConsumer<Self::Item> + Send + 'static;

    /// Consume this description and the downstream consumer.
    fn fuse_stream<K>(self, k: K) -> Self::Fused<K>
    where
        K: StreamConsumer<Self::Item> + Send + 'static;
}

/// A per-element transform: consumes one element type, produces another.
pub trait StreamAdapter<Item>: Sized {
    /// The element type handed downstream.
    type Out;

    /// The consumer produced by fusing with the downstream consumer `K`.
    type Fused<K>: StreamConsumer<Item>
    where
        K: StreamConsumer<Self::Out> + Send + 'static;

    fn fuse_adapter<K>(self, k: K) -> Self::Fused<K>
    where
        K: StreamConsumer<Self::Out> + Send + 'static;
}

/// The bottom of a stream section: consumes elements, produces a single
/// value back into the enclosing chain.
pub trait StreamTerminal<Item>: Sized {
    /// The value the enclosing chain continues with.
    type Value;

    /// The consumer produced by fusing with the value continuation `K`.
    type Fused<K>: StreamConsumer<Item>
    where
        K: Continuation<Self::Value> + Send + 'static;

    fn fuse_terminal<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<Self::Value> + Send + 'static;
}

/// A source with an adapter attached; still a source.
pub struct StreamPipe<S, A> {
    source: S,
    adapter: A,
}

impl<In, S, A> StreamComposable<In> for StreamPipe<S, A>
where
    S: StreamComposable<In>,
    A: StreamAdapter<S::Item>,
{
    type Item = A::Out;

    type Fused<K>
        = S::Fused<A::Fused<K>>
    where
        K: StreamConsumer<A::Out> + Send + 'static;

    fn fuse_stream<K>(self, k: K) -> Self::Fused<K>
    where
        K: StreamConsumer<A::Out> + Send + 'static,
    {
        self.source.fuse_stream(self.adapter.fuse_adapter(k))
    }
}

/// A complete stream section: a source drained by a terminal, usable as
/// an ordinary step in a value chain.
pub struct Drain<S, T> {
    source: S,
    terminal: T,
}

impl<In, S, T> Composable<In> for Drain<S, T>
where
    S: StreamComposable<In>,
    T: StreamTerminal<S::Item>,
{
    type Value = T::Value;

    type Fused<K>
        = S::Fused<T::Fused<K>>
    where
        K: Continuation<T::Value> + Send + 'static;

    fn fuse<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<T::Value> + Send + 'static,
    {
        self.source.fuse_stream(self.terminal.fuse_terminal(k))
    }
}

/// Marker implemented by every stream-source description; the analog of
/// [`Stage`](crate::compose::Stage) for the stream side.
pub trait SourceStage {}

impl<S, A> SourceStage for StreamPipe<S, A> {}

/// Marker implemented by per-element adapters.
pub trait AdapterStage {}

/// Marker implemented by stream terminals.
pub trait TerminalStage {}

impl<S, T> crate::compose::Stage for Drain<S, T> {}

/// Method-chaining surface for stream sources.
///
/// Composition operates on descriptions before any input type is known,
/// so these methods dispatch on input-independent markers; the protocol
/// obligations are checked when the finished chain is fused or run.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// let chain = iterate(vec![1, 2, 3])
///     .pipe(map(|v: i32| v * 10))
///     .drain(collect());
/// assert_eq!(run(chain).unwrap(), vec![10, 20, 30]);
/// ```
pub trait StreamComposableExt: SourceStage + Sized {
    /// Attach a per-element adapter.
    fn pipe<A>(self, adapter: A) -> StreamPipe<Self, A>
    where
        A: AdapterStage,
    {
        StreamPipe {
            source: self,
            adapter,
        }
    }

    /// Attach a stream terminal, closing the section into a value step.
    fn drain<T>(self, terminal: T) -> Drain<Self, T>
    where
        T: TerminalStage,
    {
        Drain {
            source: self,
            terminal,
        }
    }
}

impl<S> StreamComposableExt for S where S: SourceStage {}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Records how a downstream driver was exercised.
    #[derive(Default)]
    pub struct DriverLog {
        pub nexts: Mutex<u32>,
        pub dones: Mutex<u32>,
    }

    pub struct CountingDriver {
        pub inner: StreamHandle,
        pub log: Arc<DriverLog>,
    }

    impl StreamDriver for CountingDriver {
        fn next(&self) {
            *self.log.nexts.lock().unwrap() += 1;
            self.inner.next();
        }

        fn done(&self) {
            *self.log.dones.lock().unwrap() += 1;
            self.inner.done();
        }
    }
}
