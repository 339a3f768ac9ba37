//! Per-element transformation.

use crate::fault::Fault;
use crate::interrupt::Interrupt;
use crate::stream::{StreamAdapter, StreamConsumer, StreamHandle};

/// An adapter mapping each element through a function. Created by
/// [`map`].
pub struct Map<F> {
    f: F,
}

/// Transform each element with `f`; every other event passes through.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// let chain = iterate(vec![1, 2, 3]).pipe(map(|v: i32| v + 1)).drain(collect());
/// assert_eq!(run(chain).unwrap(), vec![2, 3, 4]);
/// ```
pub fn map<F>(f: F) -> Map<F> {
    Map { f }
}

impl<F> crate::stream::AdapterStage for Map<F> {}

impl<Item, F, Out> StreamAdapter<Item> for Map<F>
where
    F: FnMut(Item) -> Out,
{
    type Out = Out;

    type Fused<K>
        = MapConsumer<F, K>
    where
        K: StreamConsumer<Out>;

    fn fuse_adapter<K>(self, k: K) -> Self::Fused<K>
    where
        K: StreamConsumer<Out>,
    {
        MapConsumer { f: self.f, k }
    }
}

pub struct MapConsumer<F, K> {
    f: F,
    k: K,
}

impl<Item, F, Out, K> StreamConsumer<Item> for MapConsumer<F, K>
where
    F: FnMut(Item) -> Out,
    K: StreamConsumer<Out>,
{
    fn begin(&mut self, stream: StreamHandle) {
        self.k.begin(stream);
    }

    fn body(&mut self, item: Item) {
        let out = (self.f)(item);
        self.k.body(out);
    }

    fn ended(&mut self) {
        self.k.ended();
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
