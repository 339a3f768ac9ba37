//! Moving a running chain between contexts.

use crate::compose::{Composable, Continuation, Stage};
use crate::fault::Fault;
use crate::interrupt::Interrupt;
use crate::scheduler::Context;

/// A step that forwards every channel into a target context. Created by
/// [`reschedule`].
pub struct Reschedule {
    target: Context,
}

/// Continue the chain inside `target`: each channel is forwarded through
/// the target's scheduler, running inline when the current thread may
/// continue there and submitting otherwise. This is the only primitive
/// that moves work between contexts.
pub fn reschedule(target: Context) -> Reschedule {
    target.cloned_for_resume();
    Reschedule { target }
}

impl Stage for Reschedule {}

impl<In> Composable<In> for Reschedule
where
    In: Send + 'static,
{
    type Value = In;

    type Fused<K>
        = RescheduleContinuation<K>
    where
        K: Continuation<In> + Send + 'static;

    fn fuse<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<In> + Send + 'static,
    {
        RescheduleContinuation {
            target: self.target,
            k: Some(k),
        }
    }
}

pub struct RescheduleContinuation<K> {
    target: Context,
    k: Option<K>,
}

impl<In, K> Continuation<In> for RescheduleContinuation<K>
where
    In: Send + 'static,
    K: Continuation<In> + Send + 'static,
{
    fn start(&mut self, value: In) {
        let k = self.k.take().expect("already completed");
        self.target.continue_with(move || {
            let mut k = k;
            k.start(value);
        });
    }

    fn fail(&mut self, fault: Fault) {
        let k = self.k.take().expect("already completed");
        self.target.continue_with(move || {
            let mut k = k;
            k.fail(fault);
        });
    }

    fn stop(&mut self) {
        let k = self.k.take().expect("already completed");
        self.target.continue_with(move || {
            let mut k = k;
            k.stop();
        });
    }

    fn register(&mut self, interrupt: &Interrupt) {
        self.k
            .as_mut()
            .expect("already completed")
            .register(interrupt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::testing::{Event, Recorder};
    use crate::compose::ComposableExt;
    use crate::just::just;
    use crate::scheduler::{default_scheduler, Scheduler};
    use crate::then::then;
    use crate::callback::OnceCallback;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct QueueScheduler {
        queue: Mutex<VecDeque<(OnceCallback, Context)>>,
    }

    impl QueueScheduler {
        fn drain(&self) {
            while let Some((work, context)) = self.queue.lock().unwrap().pop_front() {
                let previous = Context::switch(context);
                work.invoke_if_set(());
                Context::switch(previous);
            }
        }
    }

    impl Scheduler for QueueScheduler {
        fn submit(&self, work: OnceCallback, context: &Context) {
            self.queue
                .lock()
                .unwrap()
                .push_back((work, context.clone()));
        }

        fn continuable(&self, _context: &Context) -> bool {
            false
        }
    }

    #[test]
    fn test_reschedule_to_continuable_context_runs_inline() {
        let target = Context::new(default_scheduler().clone(), "inline-target");
        let (recorder, events) = Recorder::new();
        let chain = just(1)
            .pipe(reschedule(target))
            .pipe(then(|v: i32| (v, Context::current().name().to_string())));
        let mut k = Composable::<()>::fuse(chain, recorder);
        k.start(());
        assert_eq!(
            *events.lock().unwrap(),
            vec![Event::Started((1, "inline-target".to_string()))]
        );
    }

    #[test]
    fn test_reschedule_defers_when_not_continuable() {
        let scheduler = Arc::new(QueueScheduler::default());
        let target = Context::new(scheduler.clone() as Arc<dyn Scheduler>, "deferred");

        let (recorder, events) = Recorder::new();
        let chain = just(5).pipe(reschedule(target)).pipe(then(|v: i32| v * 2));
        let mut k = Composable::<()>::fuse(chain, recorder);
        k.start(());
        assert!(events.lock().unwrap().is_empty());

        scheduler.drain();
        assert_eq!(*events.lock().unwrap(), vec![Event::Started(10)]);
    }

    #[test]
    fn test_reschedule_forwards_failures() {
        let scheduler = Arc::new(QueueScheduler::default());
        let target = Context::new(scheduler.clone() as Arc<dyn Scheduler>, "deferred");

        let (recorder, events) = Recorder::new();
        let mut k: RescheduleContinuation<Recorder<i32>> =
            Composable::<i32>::fuse(reschedule(target), recorder);
        k.fail(Fault::from("moved"));
        scheduler.drain();
        assert_eq!(
            *events.lock().unwrap(),
            vec![Event::Failed("moved".to_string())]
        );
    }
}
