//! Conditional branching.
//!
//! `when(condition).yes(a).no(b)` fuses exactly one of the two branch
//! composables into the chain; the other is discarded without ever being
//! built. Both branches must produce the same value type, and their error
//! surfaces union into the chain's.

use either::Either;

use crate::compose::{Composable, Continuation, Stage};
use crate::fault::Fault;
use crate::interrupt::Interrupt;
use crate::then::Adaptor;

/// Start of a conditional. Created by [`when`].
pub struct When {
    condition: bool,
}

/// Begin a two-way branch on `condition`.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// let chain = just(1).pipe(and_then(|i: i32| {
///     when(i == 1).yes(just("yes")).no(just("no"))
/// }));
/// assert_eq!(run(chain).unwrap(), "yes");
/// ```
pub fn when(condition: bool) -> When {
    When { condition }
}

impl When {
    /// Supply the branch taken when the condition holds.
    pub fn yes<A>(self, yes: A) -> WhenYes<A> {
        WhenYes {
            condition: self.condition,
            yes,
        }
    }
}

/// A conditional with its affirmative branch supplied.
pub struct WhenYes<A> {
    condition: bool,
    yes: A,
}

impl<A> WhenYes<A> {
    /// Supply the branch taken when the condition does not hold,
    /// completing the conditional.
    pub fn no<B>(self, no: B) -> Branch<A, B> {
        Branch {
            condition: self.condition,
            yes: self.yes,
            no,
        }
    }
}

/// A complete two-way conditional step.
pub struct Branch<A, B> {
    condition: bool,
    yes: A,
    no: B,
}

impl<A, B> Stage for Branch<A, B> {}

impl<In, A, B> Composable<In> for Branch<A, B>
where
    A: Composable<()>,
    B: Composable<(), Value = A::Value>,
{
    type Value = A::Value;

    type Fused<K>
        = BranchContinuation<A, B, K>
    where
        K: Continuation<A::Value> + Send + 'static;

    fn fuse<K>(self, k: K) -> Self::Fused<K>
    where
        K: Continuation<A::Value> + Send + 'static,
    {
        BranchContinuation {
            condition: self.condition,
            yes: Some(self.yes),
            no: Some(self.no),
            interrupt: None,
            k: Some(k),
        }
    }
}

pub struct BranchContinuation<A, B, K> {
    condition: bool,
    yes: Option<A>,
    no: Option<B>,
    interrupt: Option<Interrupt>,
    k: Option<K>,
}

impl<In, A, B, K> Continuation<In> for BranchContinuation<A, B, K>
where
    A: Composable<()>,
    B: Composable<(), Value = A::Value>,
    K: Continuation<A::Value>,
{
    fn start(&mut self, _value: In) {
        let k = self.k.take().expect("already completed");
        let mut taken = if self.condition {
            let yes = self.yes.take().expect("started twice");
            Either::Left(yes.fuse(Adaptor { k }))
        } else {
            let no = self.no.take().expect("started twice");
            Either::Right(no.fuse(Adaptor { k }))
        };
        if let Some(interrupt) = &self.interrupt {
            taken.register(interrupt);
        }
        taken.start(());
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
