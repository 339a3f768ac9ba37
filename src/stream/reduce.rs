//! Left-fold termination.

use crate::compose::Continuation;
use crate::fault::Fault;
use crate::interrupt::Interrupt;
use crate::stream::{StreamConsumer, StreamHandle, StreamTerminal};

/// A terminal folding elements into an accumulator. Created by
/// [`reduce`].
pub struct Reduce<Acc, F> {
    init: Acc,
    step: F,
}

/// Fold the stream left-to-right: `step` sees the accumulator and each
/// element, returning `true` to keep pulling or `false` to terminate
/// early. The chain continues with the accumulator either way.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// let chain = iterate(vec![1, 2, 3, 4]).drain(reduce(0, |sum: &mut i32, v: i32| {
///     *sum += v;
///     true
/// }));
/// assert_eq!(run(chain).unwrap(), 10);
/// ```
pub fn reduce<Acc, F>(init: Acc, step: F) -> Reduce<Acc, F> {
    Reduce { init, step }
}

impl<Acc, F> crate::stream::TerminalStage for Reduce<Acc, F> {}

impl<Item, Acc, F> StreamTerminal<Item> for Reduce<Acc, F>
where
    F: FnMut(&mut Acc, Item) -> bool,
{
    type Value = Acc;

    type Fused<K>
        = ReduceConsumer<Acc, F, K>
    where
        K: Continuation<Acc>;

    fn fuse_terminal<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<Acc>,
    {
        ReduceConsumer {
            acc: Some(self.init),
            step: self.step,
            handle: None,
            k,
        }
    }
}

pub struct ReduceConsumer<Acc, F, K> {
    acc: Option<Acc>,
    step: F,
    handle: Option<StreamHandle>,
    k: K,
}

impl<Item, Acc, F, K> StreamConsumer<Item> for ReduceConsumer<Acc, F, K>
where
    F: FnMut(&mut Acc, Item) -> bool,
    K: Continuation<Acc>,
{
    fn begin(&mut self, stream: StreamHandle) {
        self.handle = Some(stream.clone());
        stream.next();
    }

    fn body(&mut self, item: Item) {
        let acc = self.acc.as_mut().expect("already settled");
        let keep_going = (self.step)(acc, item);
        let handle = self.handle.as_ref().expect("body before begin");
        if keep_going {
            handle.next();
        } else {
            handle.done();
        }
    }

    fn ended(&mut self) {
        let acc = self.acc.take().expect("already settled");
        self.k.start(acc);
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
    use crate::stream::{iterate, map, repeat, StreamComposableExt, Stream};
    use crate::terminal::run;

    #[test]
    fn test_reduce_is_a_left_fold() {
        let values = vec![1, 2, 3, 4, 5];
        let expected = values
            .iter()
            .fold(String::new(), |acc, v| format!("{acc}{v}"));
        let chain = iterate(values).drain(reduce(
            String::new(),
            |acc: &mut String, v: i32| {
                acc.push_str(&v.to_string());
                true
            },
        ));
        assert_eq!(run(chain).unwrap(), expected);
    }

    #[test]
    fn test_reduce_early_exit() {
        let chain = repeat(|| 1).drain(reduce(0, |sum: &mut i32, v: i32| {
            *sum += v;
            *sum < 5
        }));
        assert_eq!(run(chain).unwrap(), 5);
    }

    #[test]
    fn test_map_then_reduce() {
        let chain = Stream::<i32>::new()
            .context(5)
            .next(|count, k| {
                if *count > 0 {
                    let value = *count;
                    *count -= 1;
                    k.emit(value);
                } else {
                    k.ended();
                }
            })
            .pipe(map(|v: i32| v + 1))
            .drain(reduce(0, |sum: &mut i32, v: i32| {
                *sum += v;
                true
            }));
        assert_eq!(run(chain).unwrap(), 20);
    }
}
