//! This module provides a [`Backoff`] for callers that retry full or empty queues.
//!
//! The queues never wait. A producer that gets `Err(value)` back from `push`,
//! or a consumer that gets `None` from `pop`, decides itself how to retry;
//! [`Backoff`] is the retry policy the harness and tests use.
//!
//! It has the same API as `crossbeam_utils::Backoff`.
use crate::hints::likely;
use crate::loom_bindings::{hint, thread};
use core::cell::Cell;
use core::fmt;

const SPIN_LIMIT: u32 = 6;

/// Performs exponential backoff in spin loops.
///
/// Each step spins roughly twice as long as the previous one. After
/// `SPIN_LIMIT` steps [`snooze`](Backoff::snooze) yields the thread to the OS
/// scheduler instead, and [`is_completed`](Backoff::is_completed) tells the
/// caller it may be time to block by other means.
///
/// # Examples
///
/// Pushing into a bounded queue until there is room:
///
/// ```
/// use hpc_ring::mpmc::MPMCQueue;
/// use hpc_ring::Backoff;
///
/// fn push_until_accepted(queue: &MPMCQueue<u32, 8>, mut value: u32) {
///     let backoff = Backoff::new();
///
///     while let Err(rejected) = queue.push(value) {
///         value = rejected;
///
///         backoff.snooze();
///     }
/// }
///
/// let queue = MPMCQueue::<u32, 8>::new();
///
/// push_until_accepted(&queue, 7);
///
/// assert_eq!(queue.pop(), Some(7));
/// ```
pub struct Backoff {
    step: Cell<u32>,
}

impl Backoff {
    /// Creates a new `Backoff` instance.
    #[inline]
    pub fn new() -> Self {
        Self { step: Cell::new(0) }
    }

    /// Resets the backoff state.
    ///
    /// Call it after the operation has made progress.
    #[inline]
    pub fn reset(&self) {
        self.step.set(0);
    }

    /// Backs off in a lock-free loop.
    ///
    /// Use it when the operation must be retried because another thread made
    /// progress, e.g. after a lost compare-and-swap.
    /// The processor may yield using the *YIELD* or *PAUSE* instruction.
    #[inline]
    pub fn spin(&self) {
        for _ in 0..1 << self.step.get().min(SPIN_LIMIT) {
            hint::spin_loop();
        }

        if self.step.get() < SPIN_LIMIT {
            self.step.set(self.step.get() + 1);
        }
    }

    /// Backs off in a waiting loop.
    ///
    /// Use it when the caller waits for another thread to make progress, e.g.
    /// a producer facing a full queue or a consumer facing an empty one.
    /// It spins first and then yields the current thread to the OS scheduler.
    #[inline]
    pub fn snooze(&self) {
        if likely(self.step.get() <= SPIN_LIMIT) {
            for _ in 0..1 << self.step.get() {
                hint::spin_loop();
            }
        } else {
            thread::yield_now();
        }

        self.step.set(self.step.get().saturating_add(1));
    }

    /// Returns `true` if exponential backoff has completed and blocking the thread is advised.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.step.get() > SPIN_LIMIT
    }
}

impl fmt::Debug for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backoff")
            .field("step", &self.step)
            .field("is_completed", &self.is_completed())
            .finish()
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}
