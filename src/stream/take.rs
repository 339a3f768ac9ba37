//! Bounding a stream to its first elements.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::fault::Fault;
use crate::interrupt::Interrupt;
use crate::stream::{StreamAdapter, StreamConsumer, StreamDriver, StreamHandle};

/// An adapter forwarding only the first `limit` elements. Created by
/// [`take`].
pub struct Take {
    limit: usize,
}

/// Forward the first `limit` elements, then convert the next request
/// into early termination of the source. Useful for bounding infinite
/// sources like [`repeat`](crate::stream::repeat).
pub fn take(limit: usize) -> Take {
    Take { limit }
}

impl crate::stream::AdapterStage for Take {}

impl<Item> StreamAdapter<Item> for Take {
    type Out = Item;

    type Fused<K>
        = TakeConsumer<K>
    where
        K: StreamConsumer<Item>;

    fn fuse_adapter<K>(self, k: K) -> Self::Fused<K>
    where
        K: StreamConsumer<Item>,
    {
        TakeConsumer {
            remaining: Arc::new(AtomicUsize::new(self.limit)),
            k,
        }
    }
}

pub struct TakeConsumer<K> {
    remaining: Arc<AtomicUsize>,
    k: K,
}

struct TakeDriver {
    remaining: Arc<AtomicUsize>,
    source: StreamHandle,
}

impl StreamDriver for TakeDriver {
    fn next(&self) {
        if self.remaining.load(Ordering::SeqCst) > 0 {
            self.source.next();
        } else {
            self.source.done();
        }
    }

    fn done(&self) {
        self.source.done();
    }
}

impl<Item, K> StreamConsumer<Item> for TakeConsumer<K>
where
    K: StreamConsumer<Item>,
{
    fn begin(&mut self, stream: StreamHandle) {
        let driver = TakeDriver {
            remaining: Arc::clone(&self.remaining),
            source: stream,
        };
        self.k.begin(StreamHandle::new(Arc::new(driver)));
    }

    fn body(&mut self, item: Item) {
        // Each body answers one request made while the budget was
        // positive, so this never underflows.
        self.remaining.fetch_sub(1, Ordering::SeqCst);
        self.k.body(item);
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
