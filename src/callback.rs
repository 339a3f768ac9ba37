//! One-shot callable containers.
//!
//! [`OnceCallback`] carries a move-only closure that will be invoked at most
//! once: interrupt handlers, scheduler submissions, and the erased dispatch
//! bodies inside [`Task`](crate::task::Task) all travel as `OnceCallback`s.

use std::fmt;

/// A move-only container for a single-shot closure.
///
/// Invoking consumes the stored closure; whether one is currently held can
/// be observed with [`is_set`](OnceCallback::is_set). Invoking an empty
/// callback is a programming error and panics.
///
/// # Examples
///
/// ```rust
/// use later::callback::OnceCallback;
///
/// let cb = OnceCallback::new(|name: &'static str| {
///     println!("hello, {name}");
/// });
/// assert!(cb.is_set());
/// cb.invoke("world");
/// ```
pub struct OnceCallback<A: 'static = ()> {
    f: Option<Box<dyn FnOnce(A) + Send>>,
}

impl<A: 'static> OnceCallback<A> {
    /// Wrap a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(A) + Send + 'static,
    {
        OnceCallback {
            f: Some(Box::new(f)),
        }
    }

    /// An empty callback, useful as a placeholder before assignment.
    pub fn empty() -> Self {
        OnceCallback { f: None }
    }

    /// Whether a closure is currently held.
    pub fn is_set(&self) -> bool {
        self.f.is_some()
    }

    /// Invoke the stored closure, consuming the callback.
    ///
    /// # Panics
    ///
    /// Panics if the callback is empty.
    pub fn invoke(mut self, arg: A) {
        let f = self
            .f
            .take()
            .expect("invoked an empty OnceCallback");
        f(arg)
    }

    /// Invoke the stored closure if one is held, consuming the callback
    /// either way.
    pub fn invoke_if_set(mut self, arg: A) {
        if let Some(f) = self.f.take() {
            f(arg)
        }
    }

    /// Remove and return the closure, leaving the callback empty.
    pub fn take(&mut self) -> Option<Box<dyn FnOnce(A) + Send>> {
        self.f.take()
    }
}

impl OnceCallback<()> {
    /// Invoke a nullary callback.
    ///
    /// # Panics
    ///
    /// Panics if the callback is empty.
    pub fn call(self) {
        self.invoke(())
    }
}

impl<A> Default for OnceCallback<A> {
    fn default() -> Self {
        OnceCallback::empty()
    }
}

impl<A> fmt::Debug for OnceCallback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnceCallback")
            .field("set", &self.is_set())
            .finish()
    }
}

impl<A, F> From<F> for OnceCallback<A>
where
    F: FnOnce(A) + Send + 'static,
{
    fn from(f: F) -> Self {
        OnceCallback::new(f)
    }
}
