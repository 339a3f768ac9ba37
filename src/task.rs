//! The type-erased task handle.
//!
//! A [`Task`] hides a whole combinator chain behind its input and output
//! types, so chains can be stored, returned from trait methods, and
//! passed across API boundaries. The underlying chain is built lazily on
//! the heap the first time the task is acted on; a task is freely
//! movable until then and consumed by whichever action fires.

use crate::compose::{Composable, Continuation, Stage};
use crate::fault::Fault;
use crate::interrupt::Interrupt;
use crate::terminal::terminal;

enum Action<From> {
    Start(From),
    Fail(Fault),
    Stop,
}

type Launch<From, To> =
    Box<dyn FnOnce(Action<From>, Option<Interrupt>, Box<dyn Continuation<To> + Send>) + Send>;

/// A move-only, type-erased chain from `From` to `To`.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// fn double() -> Task<i32, i32> {
///     Task::new(|| then(|v: i32| v * 2))
/// }
///
/// let chain = just(21).pipe(double());
/// assert_eq!(run(chain).unwrap(), 42);
/// ```
pub struct Task<From: 'static, To: 'static> {
    launch: Launch<From, To>,
}

/// A task taking no input, the common case for stored chains.
pub type TaskOf<T> = Task<(), T>;

impl<From, To> Task<From, To>
where
    From: Send + 'static,
    To: Send + 'static,
{
    /// Erase the chain the factory returns. The factory runs, and the
    /// chain is built on the heap, on first action.
    pub fn new<C, F>(factory: F) -> Self
    where
        F: FnOnce() -> C + Send + 'static,
        C: Composable<From, Value = To>,
        C::Fused<Box<dyn Continuation<To> + Send>>: Continuation<From>,
    {
        Task {
            launch: Box::new(move |action, interrupt, k| {
                let mut fused = factory().fuse(k);
                if let Some(interrupt) = &interrupt {
                    fused.register(interrupt);
                }
                match action {
                    Action::Start(value) => fused.start(value),
                    Action::Fail(fault) => fused.fail(fault),
                    Action::Stop => fused.stop(),
                }
            }),
        }
    }

    /// A task that immediately succeeds with `value`.
    pub fn success(value: To) -> Self {
        Task {
            launch: Box::new(move |action, _interrupt, mut k| match action {
                Action::Start(_) => k.start(value),
                Action::Fail(fault) => k.fail(fault),
                Action::Stop => k.stop(),
            }),
        }
    }

    /// A task that immediately fails with `error`.
    pub fn failure<E>(error: E) -> Self
    where
        E: Into<Fault>,
    {
        let fault = error.into();
        Task {
            launch: Box::new(move |action, _interrupt, mut k| match action {
                Action::Start(_) => k.fail(fault),
                Action::Fail(upstream) => k.fail(upstream),
                Action::Stop => k.stop(),
            }),
        }
    }

    /// Drive the task directly on its success channel, outside a larger
    /// chain: build the underlying chain, register `interrupt`, and
    /// start it with `input`. Exactly one of the callbacks fires.
    pub fn launch<S, FF, P>(
        self,
        input: From,
        interrupt: &Interrupt,
        on_start: S,
        on_fail: FF,
        on_stop: P,
    ) where
        S: FnOnce(To) + Send + 'static,
        FF: FnOnce(Fault) + Send + 'static,
        P: FnOnce() + Send + 'static,
    {
        let k = Self::callbacks(on_start, on_fail, on_stop);
        (self.launch)(Action::Start(input), Some(interrupt.clone()), k);
    }

    /// Drive the task on its failure channel.
    pub fn fail_into<S, FF, P>(
        self,
        fault: Fault,
        interrupt: &Interrupt,
        on_start: S,
        on_fail: FF,
        on_stop: P,
    ) where
        S: FnOnce(To) + Send + 'static,
        FF: FnOnce(Fault) + Send + 'static,
        P: FnOnce() + Send + 'static,
    {
        let k = Self::callbacks(on_start, on_fail, on_stop);
        (self.launch)(Action::Fail(fault), Some(interrupt.clone()), k);
    }

    /// Drive the task on its stop channel.
    pub fn stop_into<S, FF, P>(
        self,
        interrupt: &Interrupt,
        on_start: S,
        on_fail: FF,
        on_stop: P,
    ) where
        S: FnOnce(To) + Send + 'static,
        FF: FnOnce(Fault) + Send + 'static,
        P: FnOnce() + Send + 'static,
    {
        let k = Self::callbacks(on_start, on_fail, on_stop);
        (self.launch)(Action::Stop, Some(interrupt.clone()), k);
    }

    fn callbacks<S, FF, P>(
        on_start: S,
        on_fail: FF,
        on_stop: P,
    ) -> Box<dyn Continuation<To> + Send>
    where
        S: FnOnce(To) + Send + 'static,
        FF: FnOnce(Fault) + Send + 'static,
        P: FnOnce() + Send + 'static,
    {
        Box::new(
            terminal::<To>()
                .start(move |_, value| on_start(value))
                .fail(move |_, fault| on_fail(fault))
                .stop(move |_| on_stop()),
        )
    }
}

impl<From, To> Stage for Task<From, To> {}

impl<From, To> Composable<From> for Task<From, To>
where
    From: Send + 'static,
    To: Send + 'static,
{
    type Value = To;

    type Fused<K>
        = TaskContinuation<From, To, K>
    where
        K: Continuation<To>;

    fn fuse<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<To>,
    {
        TaskContinuation {
            launch: Some(self.launch),
            interrupt: None,
            k: Some(k),
        }
    }
}

pub struct TaskContinuation<From: 'static, To: 'static, K> {
    launch: Option<Launch<From, To>>,
    interrupt: Option<Interrupt>,
    k: Option<K>,
}

impl<From, To, K> Continuation<From> for TaskContinuation<From, To, K>
where
    From: Send + 'static,
    To: Send + 'static,
    K: Continuation<To> + Send + 'static,
{
    fn start(&mut self, value: From) {
        let launch = self.launch.take().expect("started twice");
        let k = self.k.take().expect("already completed");
        launch(Action::Start(value), self.interrupt.clone(), Box::new(k));
    }

    fn fail(&mut self, fault: Fault) {
        let launch = self.launch.take().expect("started twice");
        let k = self.k.take().expect("already completed");
        launch(Action::Fail(fault), self.interrupt.clone(), Box::new(k));
    }

    fn stop(&mut self) {
        let launch = self.launch.take().expect("started twice");
        let k = self.k.take().expect("already completed");
        launch(Action::Stop, self.interrupt.clone(), Box::new(k));
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
    use crate::catch::catch;
    use crate::compose::ComposableExt;
    use crate::fault::Message;
    use crate::just::just;
    use crate::terminal::run;
    use crate::then::then;
    use std::sync::mpsc;

    #[test]
    fn test_task_wraps_a_chain() {
        let task: TaskOf<i32> = Task::new(|| just(20).pipe(then(|v: i32| v + 22)));
        assert_eq!(run(task).unwrap(), 42);
    }

    #[test]
    fn test_task_success_is_immediate() {
        let task = TaskOf::success(7);
        assert_eq!(run(task).unwrap(), 7);
    }

    #[test]
    fn test_task_failure_raises() {
        let task: TaskOf<i32> = Task::failure("broken");
        assert_eq!(run(task).unwrap_fault().to_string(), "broken");
    }

    #[test]
    fn test_task_composes_into_chain() {
        fn offset(by: i32) -> Task<i32, i32> {
            Task::new(move || then(move |v: i32| v + by))
        }
        let chain = just(40).pipe(offset(2));
        assert_eq!(run(chain).unwrap(), 42);
    }

    #[test]
    fn test_task_failure_recoverable_downstream() {
        let task: TaskOf<i32> = Task::failure("broken");
        let chain = task.pipe(catch().raised::<Message, _, _>(|_| just(13)));
        assert_eq!(run(chain).unwrap(), 13);
    }

    #[test]
    fn test_launch_fires_start_callback() {
        let task: TaskOf<i32> = Task::new(|| just(3).pipe(then(|v: i32| v * 3)));
        let interrupt = Interrupt::new();
        let (tx, rx) = mpsc::channel();
        task.launch(
            (),
            &interrupt,
            move |value| tx.send(value).unwrap(),
            |_| panic!("fail callback"),
            || panic!("stop callback"),
        );
        assert_eq!(rx.recv().unwrap(), 9);
    }

    #[test]
    fn test_stop_into_fires_stop_callback() {
        let task: TaskOf<i32> = Task::new(|| just(0));
        let interrupt = Interrupt::new();
        let (tx, rx) = mpsc::channel();
        task.stop_into(
            &interrupt,
            |_| panic!("start callback"),
            |_| panic!("fail callback"),
            move || tx.send(()).unwrap(),
        );
        rx.recv().unwrap();
    }

    #[test]
    fn test_upstream_fault_dispatches_into_task() {
        let task: Task<i32, i32> = Task::new(|| {
            catch().raised::<Message, _, _>(|error: Message| just(error.0.len() as i32))
        });
        let chain = just(0)
            .pipe(crate::raise::raise("abcd"))
            .pipe(task);
        assert_eq!(run(chain).unwrap(), 4);
    }
}
