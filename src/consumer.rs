//! This module provides the [`Consumer`] trait.

/// The consuming side of a bounded queue.
pub trait Consumer<T> {
    /// Returns the number of values the queue can hold at once.
    fn capacity(&self) -> usize;

    /// Returns the number of values in the queue.
    ///
    /// Under concurrent use it is a snapshot that may be stale on return.
    fn len(&self) -> usize;

    /// Returns whether the queue is empty.
    ///
    /// Under concurrent use it is a snapshot that may be stale on return.
    #[inline]
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pops the oldest value from the queue, or returns `None` if it is empty.
    fn pop(&self) -> Option<T>;
}
