//! First-element extraction.

use crate::compose::Continuation;
use crate::fault::{EmptyStream, Fault};
use crate::interrupt::Interrupt;
use crate::stream::{StreamConsumer, StreamHandle, StreamTerminal};

/// A terminal resolving to the stream's first element. Created by
/// [`head`].
pub struct Head;

/// Terminate the stream at its first element: one `next`, then `done`,
/// and the chain continues with that element. A stream that ends without
/// emitting fails with [`EmptyStream`].
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// assert_eq!(run(iterate(vec![42, 7]).drain(head())).unwrap(), 42);
/// ```
pub fn head() -> Head {
    Head
}

impl crate::stream::TerminalStage for Head {}

impl<Item> StreamTerminal<Item> for Head {
    type Value = Item;

    type Fused<K>
        = HeadConsumer<Item, K>
    where
        K: Continuation<Item> + Send + 'static;

    fn fuse_terminal<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<Item> + Send + 'static,
    {
        HeadConsumer {
            first: None,
            handle: None,
            k,
        }
    }
}

pub struct HeadConsumer<Item, K> {
    first: Option<Item>,
    handle: Option<StreamHandle>,
    k: K,
}

impl<Item, K> StreamConsumer<Item> for HeadConsumer<Item, K>
where
    K: Continuation<Item>,
{
    fn begin(&mut self, stream: StreamHandle) {
        self.handle = Some(stream.clone());
        stream.next();
    }

    fn body(&mut self, item: Item) {
        self.first = Some(item);
        self.handle.as_ref().expect("body before begin").done();
    }

    fn ended(&mut self) {
        match self.first.take() {
            Some(item) => self.k.start(item),
            None => self.k.fail(Fault::new(EmptyStream)),
        }
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
