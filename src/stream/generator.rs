//! The type-erased stream handle.
//!
//! [`Generator`] is to streams what [`Task`](crate::task::Task) is to
//! values: a move-only runtime handle hiding the concrete combinator
//! chain behind the element type, so a stream can be stored in a struct,
//! returned from a function, or sent across an API boundary.

use crate::compose::Continuation;
use crate::fault::Fault;
use crate::interrupt::Interrupt;
use crate::stream::{StreamComposable, StreamConsumer};

type Launch<T> =
    Box<dyn FnOnce(Option<Interrupt>, Box<dyn StreamConsumer<T> + Send>) + Send>;

/// A move-only, type-erased stream of `T`.
///
/// Built from a factory so the underlying combinator chain is only
/// constructed when the stream actually starts. Once fused and started
/// the generator is consumed; it cannot be restarted.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// fn numbers() -> Generator<i32> {
///     Generator::new(|| iterate(vec![1, 2, 3]))
/// }
///
/// assert_eq!(run(numbers().drain(collect())).unwrap(), vec![1, 2, 3]);
/// ```
pub struct Generator<T: 'static> {
    launch: Launch<T>,
}

impl<T> Generator<T>
where
    T: Send + 'static,
{
    /// Erase the stream the factory returns.
    pub fn new<S, F>(factory: F) -> Self
    where
        F: FnOnce() -> S + Send + 'static,
        S: StreamComposable<(), Item = T>,
        S::Fused<Box<dyn StreamConsumer<T> + Send>>: Continuation<()>,
    {
        Generator {
            launch: Box::new(move |interrupt, consumer| {
                let mut fused = factory().fuse_stream(consumer);
                if let Some(interrupt) = &interrupt {
                    fused.register(interrupt);
                }
                fused.start(());
            }),
        }
    }
}

impl<T> crate::stream::SourceStage for Generator<T> {}

impl<In, T> StreamComposable<In> for Generator<T>
where
    T: Send + 'static,
{
    type Item = T;

    type Fused<K>
        = GeneratorContinuation<T, K>
    where
        K: StreamConsumer<T> + Send + 'static;

    fn fuse_stream<K>(self, k: K) -> Self::Fused<K>
    where
        K: StreamConsumer<T> + Send + 'static,
    {
        GeneratorContinuation {
            launch: Some(self.launch),
            interrupt: None,
            k: Some(k),
        }
    }
}

pub struct GeneratorContinuation<T: 'static, K> {
    launch: Option<Launch<T>>,
    interrupt: Option<Interrupt>,
    k: Option<K>,
}

impl<In, T, K> Continuation<In> for GeneratorContinuation<T, K>
where
    T: Send + 'static,
    K: StreamConsumer<T> + Send + 'static,
{
    fn start(&mut self, _value: In) {
        let launch = self.launch.take().expect("started twice");
        let k = self.k.take().expect("already completed");
        launch(self.interrupt.clone(), Box::new(k));
    }

    fn fail(&mut self, fault: Fault) {
        self.k.take().expect("already completed").fail(fault);
    }

    fn stop(&mut self) {
        self.k.take().expect("already completed").stop();
    }

    fn register(&mut self, interrupt: &Interrupt) {
        self.interrupt = Some(interrupt.clone());
        self.k
            .as_mut()
            .expect("already completed")
            .register(interrupt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{collect, head, iterate, map, take, Loop, StreamComposableExt};
    use crate::terminal::run;

    fn numbers() -> Generator<i32> {
        Generator::new(|| iterate(vec![1, 2, 3]))
    }

    #[test]
    fn test_generator_collects_like_its_source() {
        assert_eq!(run(numbers().drain(collect())).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_generator_composes_with_adapters() {
        let chain = numbers().pipe(map(|v: i32| v + 1)).drain(collect());
        assert_eq!(run(chain).unwrap(), vec![2, 3, 4]);
    }

    #[test]
    fn test_generator_with_early_termination() {
        let chain = numbers().drain(
            Loop::<i32, i32>::of()
                .body(|_, stream, _: i32| stream.done())
                .ended(|_, k| k.start(0)),
        );
        assert_eq!(run(chain).unwrap(), 0);
    }

    #[test]
    fn test_generator_captures_arguments() {
        let seed = vec![9, 8, 7];
        let generator = Generator::new(move || iterate(seed));
        assert_eq!(run(generator.pipe(take(2)).drain(collect())).unwrap(), vec![9, 8]);
    }

    #[test]
    fn test_generator_head() {
        assert_eq!(run(numbers().drain(head())).unwrap(), 1);
    }
}
