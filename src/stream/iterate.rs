//! Finite sources over owned collections.

use crate::stream::source::Stream;

/// A stream over the elements of `items`, then `ended`.
///
/// # Examples
///
/// ```rust
/// use later::prelude::*;
///
/// let chain = iterate(vec![1, 2, 3]).drain(collect());
/// assert_eq!(run(chain).unwrap(), vec![1, 2, 3]);
/// ```
pub fn iterate<T>(items: Vec<T>) -> Stream<T, std::vec::IntoIter<T>>
where
    T: Send + 'static,
{
    Stream::<T>::new()
        .context(items.into_iter())
        .next(|items, k| match items.next() {
            Some(item) => k.emit(item),
            None => k.ended(),
        })
}

/// A stream counting from `start` up to, but not including, `end`.
pub fn range(start: i32, end: i32) -> Stream<i32, std::ops::Range<i32>> {
    Stream::<i32>::new()
        .context(start..end)
        .next(|range, k| match range.next() {
            Some(value) => k.emit(value),
            None => k.ended(),
        })
}
