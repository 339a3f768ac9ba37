//! The error model: [`Fault`], the concrete error types, and [`Outcome`].
//!
//! A chain carries three independent channels. The failure channel carries
//! exactly one [`Fault`]: a boxed error value that downstream handlers can
//! match by type, or the *anonymous* fault used when a failure is re-raised
//! without a value. Stops travel their own channel and are only ever folded
//! into a value at a terminal, where they become [`Outcome::Stopped`].

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// The canonical sentinel for a cooperatively stopped chain.
///
/// Distinct from every user error: a stop is not a failure and is never
/// observed by [`catch`](crate::catch::catch) handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("deferred computation stopped (cancelled)")]
pub struct Stopped;

/// Raised by [`head`](crate::stream::head) when the stream ends before
/// emitting anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("empty stream")]
pub struct EmptyStream;

/// A plain-text error, used when a bare string is raised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct Message(pub String);

/// The value carried on the failure channel.
///
/// Either a boxed error of some concrete type, recoverable by
/// [`downcast`](Fault::downcast), or the anonymous fault used for
/// re-raising without a value.
///
/// # Examples
///
/// ```rust
/// use later::fault::{Fault, Message};
///
/// let fault = Fault::from("boom");
/// assert_eq!(fault.to_string(), "boom");
/// assert!(fault.is::<Message>());
/// ```
pub struct Fault {
    inner: Option<Box<dyn StdError + Send + Sync>>,
}

impl Fault {
    /// Box an error value.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Fault {
            inner: Some(Box::new(error)),
        }
    }

    /// The anonymous fault: a failure with no error value.
    pub fn anonymous() -> Self {
        Fault { inner: None }
    }

    /// Whether this is the anonymous fault.
    pub fn is_anonymous(&self) -> bool {
        self.inner.is_none()
    }

    /// Whether the carried error is of type `E`.
    ///
    /// Always false for the anonymous fault.
    pub fn is<E>(&self) -> bool
    where
        E: StdError + 'static,
    {
        match &self.inner {
            Some(e) => e.is::<E>(),
            None => false,
        }
    }

    /// Recover the carried error if it is of type `E`, returning the fault
    /// unchanged otherwise.
    pub fn downcast<E>(self) -> Result<E, Fault>
    where
        E: StdError + 'static,
    {
        match self.inner {
            Some(e) => match e.downcast::<E>() {
                Ok(e) => Ok(*e),
                Err(e) => Err(Fault { inner: Some(e) }),
            },
            None => Err(self),
        }
    }

    /// Borrow the carried error if it is of type `E`.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.inner.as_ref().and_then(|e| e.downcast_ref::<E>())
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(e) => fmt::Display::fmt(e, f),
            None => write!(f, "anonymous fault"),
        }
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(e) => f.debug_tuple("Fault").field(e).finish(),
            None => f.write_str("Fault(anonymous)"),
        }
    }
}

impl From<String> for Fault {
    fn from(message: String) -> Self {
        Fault::new(Message(message))
    }
}

impl From<&str> for Fault {
    fn from(message: &str) -> Self {
        Fault::new(Message(message.to_string()))
    }
}

/// The settled result of a chain, one variant per channel.
///
/// `Outcome` is to a terminated chain what `Result` is to a fallible call:
/// exactly one variant is produced, and the stop channel stays distinct
/// from failure the whole way down.
///
/// # Examples
///
/// ```rust
/// use later::fault::Outcome;
///
/// let done: Outcome<i32> = Outcome::Value(42);
/// assert!(done.is_value());
/// assert_eq!(done.map(|v| v * 2).unwrap(), 84);
/// ```
#[derive(Debug)]
pub enum Outcome<T> {
    /// The chain completed with a value.
    Value(T),
    /// The chain failed.
    Fault(Fault),
    /// The chain was cooperatively stopped.
    Stopped,
}

impl<T> Outcome<T> {
    /// Returns `true` if the outcome is a `Value`.
    #[inline]
    pub const fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    /// Returns `true` if the outcome is a `Fault`.
    #[inline]
    pub const fn is_fault(&self) -> bool {
        matches!(self, Outcome::Fault(_))
    }

    /// Returns `true` if the outcome is `Stopped`.
    #[inline]
    pub const fn is_stopped(&self) -> bool {
        matches!(self, Outcome::Stopped)
    }

    /// Converts to `Option<T>`, discarding a fault or stop.
    #[inline]
    pub fn value(self) -> Option<T> {
        match self {
            Outcome::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Converts to `Option<Fault>`, discarding a value or stop.
    #[inline]
    pub fn fault(self) -> Option<Fault> {
        match self {
            Outcome::Fault(f) => Some(f),
            _ => None,
        }
    }

    /// Maps the value, leaving faults and stops untouched.
    #[inline]
    pub fn map<U, F>(self, f: F) -> Outcome<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Value(v) => Outcome::Value(f(v)),
            Outcome::Fault(fault) => Outcome::Fault(fault),
            Outcome::Stopped => Outcome::Stopped,
        }
    }

    /// Converts into a `Result`, folding a stop into a [`Stopped`] fault.
    ///
    /// Folding channels together is a terminal's prerogative;
    /// intermediate code should keep working with `Outcome`.
    #[inline]
    pub fn into_result(self) -> Result<T, Fault> {
        match self {
            Outcome::Value(v) => Ok(v),
            Outcome::Fault(f) => Err(f),
            Outcome::Stopped => Err(Fault::new(Stopped)),
        }
    }

    /// Returns the contained value.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is a fault or a stop.
    #[inline]
    pub fn unwrap(self) -> T {
        match self {
            Outcome::Value(v) => v,
            Outcome::Fault(f) => {
                panic!("called `Outcome::unwrap()` on a `Fault`: {f}")
            }
            Outcome::Stopped => {
                panic!("called `Outcome::unwrap()` on `Stopped`")
            }
        }
    }

    /// Returns the contained fault.
    ///
    /// # Panics
    ///
    /// Panics if the outcome is a value or a stop.
    #[inline]
    pub fn unwrap_fault(self) -> Fault {
        match self {
            Outcome::Fault(f) => f,
            Outcome::Value(_) => {
                panic!("called `Outcome::unwrap_fault()` on a `Value`")
            }
            Outcome::Stopped => {
                panic!("called `Outcome::unwrap_fault()` on `Stopped`")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_display_and_downcast() {
        let fault = Fault::new(Message("bad".to_string()));
        assert_eq!(fault.to_string(), "bad");
        assert!(fault.is::<Message>());
        assert!(!fault.is::<Stopped>());
        assert_eq!(fault.downcast::<Message>().unwrap(), Message("bad".into()));
    }

    #[test]
    fn test_fault_downcast_miss_returns_original() {
        let fault = Fault::new(EmptyStream);
        let fault = fault.downcast::<Message>().unwrap_err();
        assert!(fault.is::<EmptyStream>());
    }

    #[test]
    fn test_fault_from_str_wraps_message() {
        let fault = Fault::from("boom");
        assert_eq!(fault.downcast_ref::<Message>().unwrap().0, "boom");
    }

    #[test]
    fn test_anonymous_fault_matches_nothing() {
        let fault = Fault::anonymous();
        assert!(fault.is_anonymous());
        assert!(!fault.is::<Message>());
        assert!(fault.downcast::<Message>().is_err());
    }

    #[test]
    fn test_outcome_predicates() {
        assert!(Outcome::Value(1).is_value());
        assert!(Outcome::<i32>::Fault(Fault::anonymous()).is_fault());
        assert!(Outcome::<i32>::Stopped.is_stopped());
    }

    #[test]
    fn test_outcome_map_only_touches_value() {
        assert_eq!(Outcome::Value(2).map(|v| v + 1).unwrap(), 3);
        assert!(Outcome::<i32>::Stopped.map(|v| v + 1).is_stopped());
        assert!(Outcome::<i32>::Fault(Fault::anonymous())
            .map(|v| v + 1)
            .is_fault());
    }

    #[test]
    fn test_outcome_into_result_folds_stop() {
        let err = Outcome::<i32>::Stopped.into_result().unwrap_err();
        assert!(err.is::<Stopped>());
        assert_eq!(Outcome::Value(7).into_result().unwrap(), 7);
    }

    #[test]
    #[should_panic(expected = "called `Outcome::unwrap()` on `Stopped`")]
    fn test_outcome_unwrap_stopped_panics() {
        Outcome::<i32>::Stopped.unwrap();
    }
}
