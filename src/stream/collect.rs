//! Gathering a stream into a vector.

use crate::compose::Continuation;
use crate::fault::Fault;
use crate::interrupt::Interrupt;
use crate::stream::{StreamConsumer, StreamHandle, StreamTerminal};

/// A terminal gathering every element into a `Vec`. Created by
/// [`collect`].
pub struct Collect;

/// Pull the stream to completion, continuing the chain with all
/// elements in emission order.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// assert_eq!(run(iterate(vec![1, 2, 3]).drain(collect())).unwrap(), vec![1, 2, 3]);
/// ```
pub fn collect() -> Collect {
    Collect
}

impl crate::stream::TerminalStage for Collect {}

impl<Item> StreamTerminal<Item> for Collect {
    type Value = Vec<Item>;

    type Fused<K>
        = CollectConsumer<Item, K>
    where
        K: Continuation<Vec<Item>> + Send + 'static;

    fn fuse_terminal<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<Vec<Item>> + Send + 'static,
    {
        CollectConsumer {
            items: Vec::new(),
            handle: None,
            k,
        }
    }
}

pub struct CollectConsumer<Item, K> {
    items: Vec<Item>,
    handle: Option<StreamHandle>,
    k: K,
}

impl<Item, K> StreamConsumer<Item> for CollectConsumer<Item, K>
where
    K: Continuation<Vec<Item>>,
{
    fn begin(&mut self, stream: StreamHandle) {
        self.handle = Some(stream.clone());
        stream.next();
    }

    fn body(&mut self, item: Item) {
        self.items.push(item);
        self.handle.as_ref().expect("body before begin").next();
    }

    fn ended(&mut self) {
        self.k.start(std::mem::take(&mut self.items));
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{iterate, StreamComposableExt};
    use crate::terminal::run;

    #[test]
    fn test_collect_preserves_order() {
        let chain = iterate(vec![3, 1, 2]).drain(collect());
        assert_eq!(run(chain).unwrap(), vec![3, 1, 2]);
    }

    #[test]
    fn test_collect_empty() {
        let chain = iterate(Vec::<String>::new()).drain(collect());
        assert!(run(chain).unwrap().is_empty());
    }
}
