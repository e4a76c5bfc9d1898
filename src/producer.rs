//! This module provides the [`Producer`] trait.

/// The producing side of a bounded queue.
///
/// `push` never blocks: a full queue hands the value back, and the caller
/// chooses how to retry (see [`Backoff`](crate::Backoff)).
pub trait Producer<T> {
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

    /// Returns the number of free slots in the queue.
    #[inline]
    fn free_slots(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Pushes a value only if the queue is not full.
    /// It returns the value back in `Err` if the queue is full.
    fn push(&self, value: T) -> Result<(), T>;
}
