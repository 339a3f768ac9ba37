//! The bottom of a chain.
//!
//! A [`Terminal`] converts the three channels into user-visible effect:
//! its hooks observe exactly one of start/fail/stop per chain run. The
//! drivers here ([`terminate`], [`run`], [`run_interruptible`]) fuse a
//! chain onto a terminal that settles a single-shot [`Termination`],
//! which is where a stop finally becomes the [`Stopped`] sentinel and a
//! failure surfaces to the caller.
//!
//! [`Stopped`]: crate::fault::Stopped

use std::sync::mpsc;

use crate::compose::{Composable, Continuation};
use crate::fault::{Fault, Outcome};
use crate::interrupt::Interrupt;
use crate::scheduler::Context;

type BoxedStart<Ctx, T> = Box<dyn FnOnce(&mut Ctx, T) + Send>;
type BoxedFail<Ctx> = Box<dyn FnOnce(&mut Ctx, Fault) + Send>;
type BoxedStop<Ctx> = Box<dyn FnOnce(&mut Ctx) + Send>;

/// A chain terminal with up to three hooks. Created by [`terminal`].
///
/// A terminal is a continuation, not a composable: nothing can be fused
/// after it. A channel arriving with no hook installed is traced and
/// dropped.
pub struct Terminal<T: 'static, Ctx: 'static = ()> {
    ctx: Ctx,
    start: Option<BoxedStart<Ctx, T>>,
    fail: Option<BoxedFail<Ctx>>,
    stop: Option<BoxedStop<Ctx>>,
}

/// Build a terminal for chains producing `T`.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
/// use std::sync::mpsc;
///
/// let (tx, rx) = mpsc::channel();
/// let mut chain = build(
///     just(42),
///     terminal::<i32>().start(move |_, v| tx.send(v).unwrap()),
/// );
/// chain.start(());
/// assert_eq!(rx.recv().unwrap(), 42);
/// ```
pub fn terminal<T>() -> Terminal<T> {
    Terminal {
        ctx: (),
        start: None,
        fail: None,
        stop: None,
    }
}

impl<T> Terminal<T> {
    /// Attach a context value handed by `&mut` to every hook.
    ///
    /// Hooks installed before the context are kept; they never saw a
    /// context and continue not to.
    pub fn context<Ctx>(self, ctx: Ctx) -> Terminal<T, Ctx>
    where
        T: 'static,
    {
        Terminal {
            ctx,
            start: self.start.map(|hook| -> BoxedStart<Ctx, T> {
                Box::new(move |_, value| hook(&mut (), value))
            }),
            fail: self.fail.map(|hook| -> BoxedFail<Ctx> {
                Box::new(move |_, fault| hook(&mut (), fault))
            }),
            stop: self.stop.map(|hook| -> BoxedStop<Ctx> {
                Box::new(move |_| hook(&mut ()))
            }),
        }
    }
}

impl<T, Ctx> Terminal<T, Ctx> {
    /// Hook for the success channel.
    pub fn start<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Ctx, T) + Send + 'static,
    {
        debug_assert!(self.start.is_none(), "duplicate start hook");
        self.start = Some(Box::new(f));
        self
    }

    /// Hook for the failure channel.
    pub fn fail<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Ctx, Fault) + Send + 'static,
    {
        debug_assert!(self.fail.is_none(), "duplicate fail hook");
        self.fail = Some(Box::new(f));
        self
    }

    /// Hook for the stop channel.
    pub fn stop<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut Ctx) + Send + 'static,
    {
        debug_assert!(self.stop.is_none(), "duplicate stop hook");
        self.stop = Some(Box::new(f));
        self
    }
}

impl<T, Ctx> Continuation<T> for Terminal<T, Ctx> {
    fn start(&mut self, value: T) {
        match self.start.take() {
            Some(hook) => hook(&mut self.ctx, value),
            None => tracing::trace!(
                context = Context::current().name(),
                "terminal start reached but no hook installed"
            ),
        }
    }

    fn fail(&mut self, fault: Fault) {
        match self.fail.take() {
            Some(hook) => hook(&mut self.ctx, fault),
            None => tracing::trace!(
                context = Context::current().name(),
                %fault,
                "terminal fail reached but no hook installed"
            ),
        }
    }

    fn stop(&mut self) {
        match self.stop.take() {
            Some(hook) => hook(&mut self.ctx),
            None => tracing::trace!(
                context = Context::current().name(),
                "terminal stop reached but no hook installed"
            ),
        }
    }

    fn register(&mut self, _interrupt: &Interrupt) {}
}

/// Fuse a chain onto a terminal continuation, yielding the runnable form.
pub fn build<C, K>(chain: C, terminal: K) -> C::Fused<K>
where
    C: Composable<()>,
    K: Continuation<C::Value>,
{
    chain.fuse(terminal)
}

/// The receiving side of a terminated chain: becomes ready exactly once.
pub struct Termination<T> {
    rx: mpsc::Receiver<Outcome<T>>,
}

impl<T> Termination<T> {
    /// Block until the chain settles.
    ///
    /// # Panics
    ///
    /// Panics if the driver was dropped without the chain settling.
    pub fn wait(self) -> Outcome<T> {
        self.rx
            .recv()
            .expect("chain dropped without settling")
    }
}

/// Terminate a chain: fuse it onto a terminal that fulfills a single-shot
/// [`Termination`], returning the driver continuation and the
/// termination.
///
/// Success settles `Outcome::Value`, failure settles `Outcome::Fault`
/// preserving the raised error, and a stop settles `Outcome::Stopped`.
pub fn terminate<C, T>(chain: C) -> (C::Fused<Terminal<T, ()>>, Termination<T>)
where
    C: Composable<(), Value = T>,
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let fail_tx = tx.clone();
    let stop_tx = tx.clone();
    let terminal = terminal::<T>()
        .start(move |_, value| {
            let _ = tx.send(Outcome::Value(value));
        })
        .fail(move |_, fault| {
            let _ = fail_tx.send(Outcome::Fault(fault));
        })
        .stop(move |_| {
            let _ = stop_tx.send(Outcome::Stopped);
        });
    (chain.fuse(terminal), Termination { rx })
}

/// Terminate, start, and wait: the synchronous driver for a whole chain.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// assert_eq!(run(just(20).pipe(then(|i: i32| i + 1))).unwrap(), 21);
/// ```
pub fn run<C, T>(chain: C) -> Outcome<T>
where
    C: Composable<(), Value = T>,
    T: Send + 'static,
{
    let (mut driver, termination) = terminate(chain);
    driver.start(());
    termination.wait()
}

/// Like [`run`], but registers `interrupt` on the chain before starting.
pub fn run_interruptible<C, T>(chain: C, interrupt: &Interrupt) -> Outcome<T>
where
    C: Composable<(), Value = T>,
    T: Send + 'static,
{
    let (mut driver, termination) = terminate(chain);
    driver.register(interrupt);
    driver.start(());
    termination.wait()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catch::catch;
    use crate::compose::ComposableExt;
    use crate::eventual::{Eventual, Resume};
    use crate::fault::{Message, Stopped};
    use crate::finally::finally;
    use crate::interrupt::Handler;
    use crate::just::just;
    use crate::raise::raise;
    use crate::then::{and_then, then};
    use crate::branch::when;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_chained_thens_compute() {
        // Scenario: 20, add one, double.
        let chain = just(20).pipe(then(|i: i32| i + 1)).pipe(then(|j| j * 2));
        assert_eq!(run(chain).unwrap(), 42);
    }

    #[test]
    fn test_just_then_round_trip() {
        for v in [-3_i64, 0, 7, 1 << 40] {
            assert_eq!(run(just(v).pipe(then(|x: i64| x * 2))).unwrap(), v * 2);
        }
    }

    #[test]
    fn test_catch_recovers_matching_type() {
        // Scenario: a raise skipped past one non-matching handler.
        let chain = just(1)
            .pipe(raise("message"))
            .pipe(
                catch()
                    .raised::<Stopped, _, _>(|_| just(-1))
                    .raised::<Message, _, _>(|_| just(100)),
            )
            .pipe(then(|v: i32| v));
        assert_eq!(run(chain).unwrap(), 100);
    }

    #[test]
    fn test_error_identity_preserved_through_passthrough_chain() {
        let chain = just(0)
            .pipe(raise(Fault::new(Message("exact".into()))))
            .pipe(then(|v: i32| v))
            .pipe(and_then(|v: i32| just(v)));
        let fault = run(chain).unwrap_fault();
        assert_eq!(fault.downcast::<Message>().unwrap().0, "exact");
    }

    #[test]
    fn test_stop_reaches_terminal_as_stopped() {
        let chain = Eventual::<i32>::new()
            .start(|_, resume: Resume<i32>, _: ()| resume.stop())
            .pipe(then(|v| v + 1));
        assert!(run(chain).is_stopped());
    }

    #[test]
    fn test_terminal_sees_exactly_one_outcome() {
        let outcomes = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&outcomes);
        let (tx, rx) = std::sync::mpsc::channel();
        let mut chain = build(
            just(1).pipe(then(|v: i32| v)),
            terminal::<i32>()
                .start(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tx.send(()).unwrap();
                })
                .fail({
                    let counter = Arc::clone(&outcomes);
                    move |_, _| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                })
                .stop({
                    let counter = Arc::clone(&outcomes);
                    move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                }),
        );
        chain.start(());
        rx.recv().unwrap();
        assert_eq!(outcomes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_suspended_eventual_stopped_by_interrupt() {
        // A start hook that stashes its resume; the interrupt handler is
        // the only path to completion.
        let chain = Eventual::<i32>::new()
            .interruptible()
            .start(|_, resume: Resume<i32>, _: (), handler: &Handler| {
                let resume = resume.clone();
                handler.install(move || resume.stop());
            })
            .pipe(then(|v| v + 2));

        let interrupt = Interrupt::new();
        let (mut driver, termination) = terminate(chain);
        driver.register(&interrupt);
        driver.start(());

        interrupt.trigger();
        assert!(termination.wait().is_stopped());
    }

    #[test]
    fn test_trigger_before_start_stops_immediately() {
        let chain = Eventual::<i32>::new()
            .interruptible()
            .start(|_, resume: Resume<i32>, _: (), handler: &Handler| {
                // Interrupt already triggered: installation fires now.
                let resume = resume.clone();
                handler.install(move || resume.stop());
            });

        let interrupt = Interrupt::new();
        interrupt.trigger();
        assert!(run_interruptible(chain, &interrupt).is_stopped());
    }

    #[test]
    fn test_worker_thread_completion() {
        let chain = Eventual::<i32>::new()
            .context(5)
            .start(|context: &mut i32, resume, _: ()| {
                let seed = *context;
                std::thread::spawn(move || resume.start(seed));
            })
            .pipe(then(|i| i + 2))
            .pipe(Eventual::<i32>::new().context(9).start(
                |context: &mut i32, resume, value: i32| {
                    let remaining = *context - value;
                    std::thread::spawn(move || resume.start(remaining));
                },
            ));
        assert_eq!(run(chain).unwrap(), 2);
    }

    #[test]
    fn test_branch_inside_and_then() {
        for (input, expected) in [(1, "yes"), (0, "no")] {
            let chain = just(input).pipe(and_then(|i: i32| {
                when(i == 1).yes(just("yes")).no(just("no"))
            }));
            assert_eq!(run(chain).unwrap(), expected);
        }
    }

    #[test]
    fn test_finally_converts_stop_for_inspection() {
        let chain = Eventual::<String>::new()
            .start(|_, resume: Resume<String>, _: ()| resume.stop())
            .pipe(finally(|outcome: Outcome<String>| {
                just(outcome.is_stopped())
            }));
        assert!(run(chain).unwrap());
    }

    #[test]
    fn test_run_interruptible_without_trigger_completes() {
        let interrupt = Interrupt::new();
        let chain = just(11).pipe(then(|v: i32| v * 2));
        assert_eq!(run_interruptible(chain, &interrupt).unwrap(), 22);
    }
}
