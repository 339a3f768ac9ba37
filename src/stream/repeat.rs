//! The infinite source.

use crate::stream::source::Stream;

/// An endless stream producing one `f()` per requested element.
///
/// There is no `ended` path: only the consumer can terminate the stream,
/// by calling `done` on its handle.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// let chain = repeat(|| "x").pipe(take(3)).drain(collect());
/// assert_eq!(run(chain).unwrap(), vec!["x", "x", "x"]);
/// ```
pub fn repeat<T, F>(f: F) -> Stream<T, F>
where
    F: FnMut() -> T + Send + 'static,
    T: Send + 'static,
{
    Stream::<T>::new().context(f).next(|f, k| k.emit(f()))
}
