//! Schedulers and execution contexts.
//!
//! A [`Context`] names a logical place of execution and carries a pointer
//! to its [`Scheduler`]. Every OS thread has a *current* context, tracked
//! thread-locally and never null: it is lazily initialized to the
//! process-wide default context, whose scheduler runs submitted work
//! synchronously.
//!
//! Work that suspends captures the current context and later resumes
//! through [`Context::continue_with`], which runs inline when the calling
//! thread may continue in that context and submits otherwise.

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::callback::OnceCallback;

/// Decides when and where submitted work runs.
///
/// Implementations may run work synchronously (the default scheduler) or
/// defer it (an event loop). Deferred submissions to a single scheduler
/// must preserve FIFO order.
pub trait Scheduler: Send + Sync {
    /// Arrange for `work` to execute with `context` set as current.
    fn submit(&self, work: OnceCallback, context: &Context);

    /// Whether the calling thread may resume inside `context` directly,
    /// without submitting.
    fn continuable(&self, context: &Context) -> bool;

    /// Hook invoked when a continuation captures "the previous context".
    /// Direct schedulers need no bookkeeping.
    fn clone_context(&self, context: &Context) {
        let _ = context;
    }
}

struct ContextInner {
    name: String,
    scheduler: Arc<dyn Scheduler>,
}

/// A named scheduling destination.
///
/// Cheap to clone; clones denote the same logical context. The name is
/// used only for diagnostics.
///
/// # Examples
///
/// ```rust
/// use later::scheduler::Context;
///
/// let current = Context::current();
/// assert!(current.continuable());
/// let name = current.name().to_string();
/// current.continue_with(move || {
///     assert_eq!(Context::current().name(), name);
/// });
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Create a named context on the given scheduler.
    pub fn new(scheduler: Arc<dyn Scheduler>, name: impl Into<String>) -> Self {
        Context {
            inner: Arc::new(ContextInner {
                name: name.into(),
                scheduler,
            }),
        }
    }

    /// The calling thread's current context.
    pub fn current() -> Context {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Swap the calling thread's current context, returning the previous.
    pub fn switch(context: Context) -> Context {
        CURRENT.with(|current| std::mem::replace(&mut *current.borrow_mut(), context))
    }

    /// This context's diagnostic name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// This context's scheduler.
    pub fn scheduler(&self) -> &Arc<dyn Scheduler> {
        &self.inner.scheduler
    }

    /// Whether the calling thread may continue in this context directly.
    pub fn continuable(&self) -> bool {
        self.inner.scheduler.continuable(self)
    }

    /// Run `f` in this context: inline (with the current context switched
    /// for the duration) when continuable, otherwise via `submit`.
    pub fn continue_with<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.continuable() {
            let previous = Context::switch(self.clone());
            f();
            Context::switch(previous);
        } else {
            self.inner
                .scheduler
                .submit(OnceCallback::new(move |()| f()), self);
        }
    }

    /// Notify the scheduler that this context has been captured for a
    /// later resume.
    pub fn cloned_for_resume(&self) {
        self.inner.scheduler.clone_context(self);
    }

    /// Whether two handles denote the same context.
    pub fn same(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("name", &self.inner.name)
            .finish()
    }
}

/// The process-wide default scheduler: submits synchronously, switching
/// the current context around the callback.
#[derive(Default)]
pub struct DefaultScheduler;

impl Scheduler for DefaultScheduler {
    fn submit(&self, work: OnceCallback, context: &Context) {
        let previous = Context::switch(context.clone());
        tracing::trace!(
            context = context.name(),
            preempted = previous.name(),
            "synchronous submit"
        );
        work.invoke_if_set(());
        Context::switch(previous);
    }

    fn continuable(&self, context: &Context) -> bool {
        Arc::ptr_eq(Context::current().scheduler(), context.scheduler())
    }
}

/// The process-wide default scheduler instance.
pub fn default_scheduler() -> &'static Arc<dyn Scheduler> {
    static DEFAULT: OnceLock<Arc<dyn Scheduler>> = OnceLock::new();
    DEFAULT.get_or_init(|| Arc::new(DefaultScheduler))
}

thread_local! {
    static CURRENT: RefCell<Context> = RefCell::new(Context::new(
        default_scheduler().clone(),
        format!("[thread {:?}]", std::thread::current().id()),
    ));
}
