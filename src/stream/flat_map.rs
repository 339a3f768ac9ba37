//! Per-element inner streams.
//!
//! For every outer element, [`flat_map`] builds an inner stream and
//! drains it into the downstream consumer before pulling the next outer
//! element. The downstream terminal drives one handle throughout; this
//! adapter routes each `next`/`done` to whichever stream is live, and an
//! early `done` is latched so that when the current inner stream ends
//! the outer stream is terminated instead of pulled.
//!
//! All events funnel through one queue processed by a single logical
//! driver, in the scheduling context captured when the outer stream
//! began.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use crate::compose::Continuation;
use crate::fault::Fault;
use crate::interrupt::Interrupt;
use crate::scheduler::Context;
use crate::stream::{
    StreamAdapter, StreamComposable, StreamConsumer, StreamDriver, StreamHandle,
};

/// An adapter expanding each element into a stream. Created by
/// [`flat_map`].
pub struct FlatMap<F> {
    f: F,
}

/// Expand each outer element into the stream `f` returns and emit that
/// stream's elements downstream, in order, before pulling the next outer
/// element.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// let chain = iterate(vec![1, 2, 3])
///     .pipe(flat_map(|i: i32| range(0, i)))
///     .drain(collect());
/// assert_eq!(run(chain).unwrap(), vec![0, 0, 1, 0, 1, 2]);
/// ```
pub fn flat_map<F>(f: F) -> FlatMap<F> {
    FlatMap { f }
}

enum Msg<ItemIn, ItemOut> {
    OuterBegin(StreamHandle),
    OuterBody(ItemIn),
    OuterEnded,
    OuterFail(Fault),
    OuterStop,
    InnerBegin(StreamHandle),
    InnerBody(ItemOut),
    InnerEnded,
    InnerFail(Fault),
    InnerStop,
    Next,
    Done,
}

struct QueueState<ItemIn, ItemOut> {
    queue: VecDeque<Msg<ItemIn, ItemOut>>,
    driving: bool,
}

struct Core<ItemIn, F, K> {
    f: F,
    outer: Option<StreamHandle>,
    inner: Option<StreamHandle>,
    inner_active: bool,
    done: bool,
    previous: Option<Context>,
    interrupt: Option<Interrupt>,
    self_handle: Option<StreamHandle>,
    _item: PhantomData<fn(ItemIn)>,
    k: K,
}

struct Shared<ItemIn, ItemOut, F, K> {
    state: Mutex<QueueState<ItemIn, ItemOut>>,
    core: Mutex<Option<Core<ItemIn, F, K>>>,
}

type Action = Box<dyn FnOnce() + Send>;

impl<ItemIn, ItemOut, F, S, K> Shared<ItemIn, ItemOut, F, K>
where
    ItemIn: Send + 'static,
    ItemOut: Send + 'static,
    F: FnMut(ItemIn) -> S + Send + 'static,
    S: StreamComposable<(), Item = ItemOut> + Send + 'static,
    K: StreamConsumer<ItemOut> + Send + 'static,
{
    fn send(self: &Arc<Self>, msg: Msg<ItemIn, ItemOut>) {
        {
            let mut state = self.state.lock().expect("flat_map queue poisoned");
            state.queue.push_back(msg);
            if state.driving {
                return;
            }
            state.driving = true;
        }
        loop {
            let msg = {
                let mut state = self.state.lock().expect("flat_map queue poisoned");
                match state.queue.pop_front() {
                    Some(msg) => msg,
                    None => {
                        state.driving = false;
                        return;
                    }
                }
            };
            self.process(msg);
        }
    }

    fn process(self: &Arc<Self>, msg: Msg<ItemIn, ItemOut>) {
        // Driver handles must not be invoked while the core is locked;
        // anything that drives a stream is deferred until after release.
        let mut after: Vec<Action> = Vec::new();
        {
            let mut guard = self.core.lock().expect("flat_map core poisoned");
            let Some(core) = guard.as_mut() else { return };
            match msg {
                Msg::OuterBegin(handle) => {
                    core.outer = Some(handle);
                    core.previous = Some(Context::current());
                    let down = core
                        .self_handle
                        .clone()
                        .expect("driver installed at fuse");
                    core.k.begin(down);
                }
                Msg::OuterBody(item) => {
                    let composable = (core.f)(item);
                    core.inner_active = true;
                    let interrupt = core.interrupt.clone();
                    let adaptor: InnerAdaptor<ItemIn, ItemOut, F, S, K> = InnerAdaptor {
                        shared: Arc::clone(self),
                        _stream: PhantomData,
                    };
                    after.push(Box::new(move || {
                        let mut inner = composable.fuse_stream(adaptor);
                        if let Some(interrupt) = &interrupt {
                            inner.register(interrupt);
                        }
                        inner.start(());
                    }));
                }
                Msg::OuterEnded => core.k.ended(),
                Msg::OuterFail(fault) => core.k.fail(fault),
                Msg::OuterStop => {
                    core.done = true;
                    core.k.stop();
                }
                Msg::InnerBegin(handle) => {
                    core.inner = Some(handle.clone());
                    after.push(Box::new(move || handle.next()));
                }
                Msg::InnerBody(item) => core.k.body(item),
                Msg::InnerEnded => {
                    core.inner = None;
                    core.inner_active = false;
                    let outer = core.outer.clone().expect("outer begun");
                    if core.done {
                        after.push(Box::new(move || outer.done()));
                    } else {
                        after.push(Box::new(move || outer.next()));
                    }
                }
                Msg::InnerFail(fault) => core.k.fail(fault),
                Msg::InnerStop => {
                    core.done = true;
                    core.k.stop();
                }
                Msg::Next => {
                    let target = if core.inner_active {
                        core.inner.clone()
                    } else {
                        core.outer.clone()
                    };
                    if let Some(target) = target {
                        let previous = core.previous.clone();
                        after.push(Box::new(move || match previous {
                            Some(previous) => {
                                previous.continue_with(move || target.next())
                            }
                            None => target.next(),
                        }));
                    }
                }
                Msg::Done => {
                    core.done = true;
                    let target = if core.inner_active {
                        core.inner.clone()
                    } else {
                        core.outer.clone()
                    };
                    if let Some(target) = target {
                        let previous = core.previous.clone();
                        after.push(Box::new(move || match previous {
                            Some(previous) => {
                                previous.continue_with(move || target.done())
                            }
                            None => target.done(),
                        }));
                    }
                }
            }
        }
        for action in after {
            action();
        }
    }
}

/// The handle handed downstream: routes driving to the live stream.
struct FlatDriver<ItemIn, ItemOut, F, S, K> {
    shared: Arc<Shared<ItemIn, ItemOut, F, K>>,
    _stream: PhantomData<fn() -> S>,
}

impl<ItemIn, ItemOut, F, S, K> StreamDriver for FlatDriver<ItemIn, ItemOut, F, S, K>
where
    ItemIn: Send + 'static,
    ItemOut: Send + 'static,
    F: FnMut(ItemIn) -> S + Send + 'static,
    S: StreamComposable<(), Item = ItemOut> + Send + 'static,
    K: StreamConsumer<ItemOut> + Send + 'static,
{
    fn next(&self) {
        self.shared.send(Msg::Next);
    }

    fn done(&self) {
        self.shared.send(Msg::Done);
    }
}

/// Consumes an inner stream on behalf of the adapter.
struct InnerAdaptor<ItemIn, ItemOut, F, S, K> {
    shared: Arc<Shared<ItemIn, ItemOut, F, K>>,
    _stream: PhantomData<fn() -> S>,
}

impl<ItemIn, ItemOut, F, S, K> StreamConsumer<ItemOut>
    for InnerAdaptor<ItemIn, ItemOut, F, S, K>
where
    ItemIn: Send + 'static,
    ItemOut: Send + 'static,
    F: FnMut(ItemIn) -> S + Send + 'static,
    S: StreamComposable<(), Item = ItemOut> + Send + 'static,
    K: StreamConsumer<ItemOut> + Send + 'static,
{
    fn begin(&mut self, stream: StreamHandle) {
        self.shared.send(Msg::InnerBegin(stream));
    }

    fn body(&mut self, item: ItemOut) {
        self.shared.send(Msg::InnerBody(item));
    }

    fn ended(&mut self) {
        self.shared.send(Msg::InnerEnded);
    }

    fn fail(&mut self, fault: Fault) {
        self.shared.send(Msg::InnerFail(fault));
    }

    fn stop(&mut self) {
        self.shared.send(Msg::InnerStop);
    }

    fn register(&mut self, _interrupt: &Interrupt) {
        // The enclosing adapter registered the downstream consumer when
        // the chain was registered; inner chains are registered as they
        // are built.
    }
}

impl<F> crate::stream::AdapterStage for FlatMap<F> {}

impl<ItemIn, F, S> StreamAdapter<ItemIn> for FlatMap<F>
where
    ItemIn: Send + 'static,
    F: FnMut(ItemIn) -> S + Send + 'static,
    S: StreamComposable<()> + Send + 'static,
    S::Item: Send + 'static,
{
    type Out = S::Item;

    type Fused<K>
        = FlatMapConsumer<ItemIn, S::Item, F, S, K>
    where
        K: StreamConsumer<S::Item> + Send + 'static;

    fn fuse_adapter<K>(self, k: K) -> Self::Fused<K>
    where
        K: StreamConsumer<S::Item> + Send + 'static,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                queue: VecDeque::new(),
                driving: false,
            }),
            core: Mutex::new(None),
        });
        let core = Core {
            f: self.f,
            outer: None,
            inner: None,
            inner_active: false,
            done: false,
            previous: None,
            interrupt: None,
            self_handle: None,
            _item: PhantomData,
            k,
        };
        *shared.core.lock().expect("flat_map core poisoned") = Some(core);
        FlatMapConsumer {
            shared,
            _stream: PhantomData,
        }
    }
}

/// The outer-facing consumer produced by fusing a [`FlatMap`].
pub struct FlatMapConsumer<ItemIn, ItemOut, F, S, K> {
    shared: Arc<Shared<ItemIn, ItemOut, F, K>>,
    _stream: PhantomData<fn() -> S>,
}

impl<ItemIn, ItemOut, F, S, K> StreamConsumer<ItemIn>
    for FlatMapConsumer<ItemIn, ItemOut, F, S, K>
where
    ItemIn: Send + 'static,
    ItemOut: Send + 'static,
    F: FnMut(ItemIn) -> S + Send + 'static,
    S: StreamComposable<(), Item = ItemOut> + Send + 'static,
    K: StreamConsumer<ItemOut> + Send + 'static,
{
    fn begin(&mut self, stream: StreamHandle) {
        {
            let mut core = self.shared.core.lock().expect("flat_map core poisoned");
            if let Some(core) = core.as_mut() {
                if core.self_handle.is_none() {
                    let driver: FlatDriver<ItemIn, ItemOut, F, S, K> = FlatDriver {
                        shared: Arc::clone(&self.shared),
                        _stream: PhantomData,
                    };
                    core.self_handle = Some(StreamHandle::new(Arc::new(driver)));
                }
            }
        }
        self.shared.send(Msg::OuterBegin(stream));
    }

    fn body(&mut self, item: ItemIn) {
        self.shared.send(Msg::OuterBody(item));
    }

    fn ended(&mut self) {
        self.shared.send(Msg::OuterEnded);
    }

    fn fail(&mut self, fault: Fault) {
        self.shared.send(Msg::OuterFail(fault));
    }

    fn stop(&mut self) {
        self.shared.send(Msg::OuterStop);
    }

    fn register(&mut self, interrupt: &Interrupt) {
        let mut core = self.shared.core.lock().expect("flat_map core poisoned");
        if let Some(core) = core.as_mut() {
            core.interrupt = Some(interrupt.clone());
            core.k.register(interrupt);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{collect, head, iterate, range, StreamComposableExt};
    use crate::terminal::run;

    #[test]
    fn test_flat_map_expands_in_order() {
        let chain = iterate(vec![1, 2, 3])
            .pipe(flat_map(|i: i32| range(0, i)))
            .drain(collect());
        assert_eq!(run(chain).unwrap(), vec![0, 0, 1, 0, 1, 2]);
    }

    #[test]
    fn test_empty_inner_streams_are_skipped() {
        let chain = iterate(vec![0, 2, 0, 1])
            .pipe(flat_map(|i: i32| range(0, i)))
            .drain(collect());
        assert_eq!(run(chain).unwrap(), vec![0, 1, 0]);
    }

    #[test]
    fn test_outer_empty_yields_empty() {
        let chain = iterate(Vec::<i32>::new())
            .pipe(flat_map(|i: i32| range(0, i)))
            .drain(collect());
        assert_eq!(run(chain).unwrap(), Vec::<i32>::new());
    }

    #[test]
    fn test_early_done_latches_through_inner_stream() {
        // head() terminates after one element; the latched done must
        // wind down the inner stream and then the outer one.
        let chain = iterate(vec![5, 6, 7])
            .pipe(flat_map(|i: i32| iterate(vec![i * 10, i * 10 + 1])))
            .drain(head());
        assert_eq!(run(chain).unwrap(), 50);
    }

    #[test]
    fn test_inner_elements_change_type() {
        let chain = iterate(vec!["ab", "c"])
            .pipe(flat_map(|s: &'static str| {
                iterate(s.chars().collect::<Vec<char>>())
            }))
            .drain(collect());
        assert_eq!(run(chain).unwrap(), vec!['a', 'b', 'c']);
    }
}
