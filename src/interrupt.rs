//! One-shot fan-out cancellation.
//!
//! An [`Interrupt`] is created by the driver of a chain and registered on
//! the chain before it starts. Primitives that can be cancelled install a
//! handler from inside their hooks; [`Interrupt::trigger`] runs every
//! installed handler once, in install order, and any handler installed
//! afterwards runs immediately on installation.
//!
//! Triggering is advisory: handlers typically resume the chain on its stop
//! channel, but nothing here forces that.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::callback::OnceCallback;

#[derive(Default)]
struct Inner {
    triggered: AtomicBool,
    handlers: Mutex<Vec<OnceCallback>>,
}

/// A one-shot cancellation signal with installable handlers.
///
/// Cheap to clone; all clones share the same trigger state. Outlives the
/// continuations it is registered on (the driver keeps it until the chain
/// settles).
///
/// # Examples
///
/// ```rust
/// use later::interrupt::Interrupt;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let interrupt = Interrupt::new();
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = Arc::clone(&fired);
/// interrupt.install(move || flag.store(true, Ordering::SeqCst));
///
/// interrupt.trigger();
/// assert!(fired.load(Ordering::SeqCst));
/// assert!(interrupt.triggered());
/// ```
#[derive(Clone, Default)]
pub struct Interrupt {
    inner: Arc<Inner>,
}

impl Interrupt {
    /// Create an untriggered interrupt with no handlers.
    pub fn new() -> Self {
        Interrupt::default()
    }

    /// Install a handler.
    ///
    /// If the interrupt has already been triggered the handler runs
    /// immediately on the calling thread and is not retained.
    pub fn install<F>(&self, handler: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // Hold the lock across the triggered check so a concurrent
        // trigger() either sees this handler in the list or we see the
        // flag and run it ourselves.
        let mut handlers = self
            .inner
            .handlers
            .lock()
            .expect("interrupt handler list poisoned");
        if self.inner.triggered.load(Ordering::SeqCst) {
            drop(handlers);
            handler();
        } else {
            handlers.push(OnceCallback::new(move |()| handler()));
        }
    }

    /// Trigger the interrupt, running every installed handler in install
    /// order. Idempotent: calls after the first return without effect.
    pub fn trigger(&self) {
        if self.inner.triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        let drained = {
            let mut handlers = self
                .inner
                .handlers
                .lock()
                .expect("interrupt handler list poisoned");
            std::mem::take(&mut *handlers)
        };
        for handler in drained {
            handler.invoke_if_set(());
        }
    }

    /// Whether the interrupt has been triggered.
    pub fn triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// A [`Handler`] for installing cancellation callbacks from inside a
    /// chain's hooks.
    pub fn handler(&self) -> Handler {
        Handler {
            interrupt: self.clone(),
        }
    }
}

impl std::fmt::Debug for Interrupt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interrupt")
            .field("triggered", &self.triggered())
            .finish()
    }
}

/// The installation surface handed to interruptible hooks.
///
/// A hook receives a `Handler` only while it runs; installing outside a
/// hook is a logic error the type system prevents by not handing the
/// handler out anywhere else.
pub struct Handler {
    interrupt: Interrupt,
}

impl Handler {
    /// Install a cancellation callback on the underlying interrupt.
    pub fn install<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.interrupt.install(f)
    }

    /// Whether the underlying interrupt has already been triggered.
    pub fn triggered(&self) -> bool {
        self.interrupt.triggered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_trigger_runs_handlers_in_install_order() {
        let interrupt = Interrupt::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            interrupt.install(move || order.lock().unwrap().push(i));
        }
        interrupt.trigger();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_trigger_is_idempotent() {
        let interrupt = Interrupt::new();
        let count = Arc::new(AtomicU32::new(0));
        {
            let count = Arc::clone(&count);
            interrupt.install(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        interrupt.trigger();
        interrupt.trigger();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_install_after_trigger_fires_immediately() {
        let interrupt = Interrupt::new();
        interrupt.trigger();

        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        interrupt.install(move || flag.store(true, Ordering::SeqCst));
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_clones_share_state() {
        let interrupt = Interrupt::new();
        let clone = interrupt.clone();
        clone.trigger();
        assert!(interrupt.triggered());
    }

    #[test]
    fn test_trigger_from_other_thread() {
        let interrupt = Interrupt::new();
        let fired = Arc::new(AtomicBool::new(false));
        {
            let flag = Arc::clone(&fired);
            interrupt.install(move || flag.store(true, Ordering::SeqCst));
        }
        let remote = interrupt.clone();
        std::thread::spawn(move || remote.trigger())
            .join()
            .unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn test_handler_installs_on_underlying_interrupt() {
        let interrupt = Interrupt::new();
        let handler = interrupt.handler();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        handler.install(move || flag.store(true, Ordering::SeqCst));
        interrupt.trigger();
        assert!(fired.load(Ordering::SeqCst));
    }
}
