//! This module provides a single-producer, single-consumer queue.
//!
//! It is implemented as a const bounded ring buffer.
use crate::cache_padded::{AtomicCursor, CachePaddedAtomicUsize, NotCachePaddedAtomicUsize};
use crate::capacity::mask_for;
use crate::hints::{assert_hint, unlikely};
use crate::light_arc::LightArc;
use crate::{Consumer, Producer};
use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::mem::{needs_drop, MaybeUninit};
use std::ptr;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

// Reads from the head, writes to the tail.
//
// Both cursors are stored masked, in `0..CAPACITY`. The ring is empty when
// `head == tail` and full when `(tail + 1) & MASK == head`, so one slot always
// stays unused and no separate length counter is needed.
//
// `tail` has one writer (the producer) and `head` has one writer (the consumer).
// Each side reads its own cursor relaxed and the other side's cursor with
// `Acquire`, and publishes its own cursor with `Release`:
// - the producer's `Release` store of `tail` makes the written value visible
//   to the consumer's `Acquire` load of `tail`;
// - the consumer's `Release` store of `head` orders its read of the slot
//   before the producer's `Acquire` load of `head` lets the slot be reused.

/// The single-producer, single-consumer ring-based _const bounded_ queue.
///
/// It is safe to use when and only when only one thread is writing to the queue at the same time,
/// and only one thread is reading from the queue at the same time.
///
/// You can call `producer_` methods for the producer and `consumer_` methods for the consumer.
/// They are `unsafe`: the single-writer discipline is their contract, it is
/// not checked at runtime.
///
/// `CAPACITY` must be a power of two and at least 2; other values fail to
/// compile. One slot is sacrificed, so [`capacity`](Self::capacity) is `CAPACITY - 1`.
///
/// It accepts the cursor type as a generic parameter. The default,
/// [`CachePaddedAtomicUsize`], keeps `head` and `tail` on separate cache lines.
///
/// # Using directly the [`SPSCQueue`] vs. using [`new_bounded`].
///
/// [`new_bounded`] allocates the [`SPSCQueue`] in a [`LightArc`] and returns a
/// producer and a consumer handle. The handles can't be cloned or shared, so
/// the single-producer, single-consumer contract is checked by the compiler.
///
/// # Examples
///
/// ```
/// use hpc_ring::spsc::SPSCQueue;
///
/// let queue = SPSCQueue::<u32, 4>::new();
///
/// // Safety: this thread is the only producer and the only consumer.
/// unsafe {
///     assert!(queue.producer_push(1).is_ok());
///     assert!(queue.producer_push(2).is_ok());
///     assert!(queue.producer_push(3).is_ok());
///     assert_eq!(queue.producer_push(4), Err(4));
///
///     assert_eq!(queue.consumer_pop(), Some(1));
/// }
///
/// assert_eq!(queue.len(), 2);
/// assert_eq!(queue.capacity(), 3);
/// ```
pub struct SPSCQueue<T, const CAPACITY: usize, Cursor: AtomicCursor = CachePaddedAtomicUsize> {
    head: Cursor,
    tail: Cursor,
    buffer: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

impl<T, const CAPACITY: usize, Cursor: AtomicCursor> SPSCQueue<T, CAPACITY, Cursor> {
    const MASK: usize = mask_for(CAPACITY);

    /// Creates a new empty [`SPSCQueue`].
    pub fn new() -> Self {
        let buffer = (0..=Self::MASK)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();

        Self {
            head: Cursor::default(),
            tail: Cursor::default(),
            buffer,
        }
    }

    /// Returns the number of values the queue can hold at once (`CAPACITY - 1`).
    #[inline]
    pub fn capacity(&self) -> usize {
        Self::MASK
    }

    /// Returns the number of values in the queue.
    ///
    /// It reads both cursors relaxed and may be stale as soon as it returns
    /// if the producer or the consumer is running.
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.head.load(Relaxed);
        let tail = self.tail.load(Relaxed);

        tail.wrapping_sub(head) & Self::MASK
    }

    /// Returns whether the queue is empty.
    ///
    /// It reads both cursors relaxed: it is a hint, not a synchronization point.
    /// Without concurrent `push`/`pop` it returns the same answer every time.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.load(Relaxed) == self.tail.load(Relaxed)
    }

    /// Returns a pointer to the slot at the masked `index`.
    #[inline(always)]
    fn slot(&self, index: usize) -> *mut MaybeUninit<T> {
        assert_hint(index < self.buffer.len(), "ring index out of bounds");

        self.buffer[index].get()
    }
}

// Producer
impl<T, const CAPACITY: usize, Cursor: AtomicCursor> SPSCQueue<T, CAPACITY, Cursor> {
    /// Pushes a value to the queue or returns it back if the queue is full.
    ///
    /// A full queue is left unchanged.
    ///
    /// # Safety
    ///
    /// The caller should be the only producer.
    #[inline]
    pub unsafe fn producer_push(&self, value: T) -> Result<(), T> {
        let tail = self.tail.load(Relaxed); // only the producer changes the tail
        let next_tail = (tail + 1) & Self::MASK;

        if unlikely(next_tail == self.head.load(Acquire)) {
            return Err(value);
        }

        unsafe { self.slot(tail).write(MaybeUninit::new(value)) };

        self.tail.store(next_tail, Release);

        Ok(())
    }
}

// Consumer
impl<T, const CAPACITY: usize, Cursor: AtomicCursor> SPSCQueue<T, CAPACITY, Cursor> {
    /// Pops the oldest value from the queue, or returns `None` if it is empty.
    ///
    /// # Safety
    ///
    /// The caller should be the only consumer.
    #[inline]
    pub unsafe fn consumer_pop(&self) -> Option<T> {
        let head = self.head.load(Relaxed); // only the consumer changes the head

        if head == self.tail.load(Acquire) {
            return None;
        }

        let value = unsafe { self.slot(head).read().assume_init() };

        self.head.store((head + 1) & Self::MASK, Release);

        Some(value)
    }
}

impl<T, const CAPACITY: usize, Cursor: AtomicCursor> Default for SPSCQueue<T, CAPACITY, Cursor> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<T: Send, const CAPACITY: usize, Cursor: AtomicCursor + Sync> Sync
    for SPSCQueue<T, CAPACITY, Cursor>
{
}

impl<T, const CAPACITY: usize, Cursor: AtomicCursor> Drop for SPSCQueue<T, CAPACITY, Cursor> {
    fn drop(&mut self) {
        // While dropping there is no concurrency

        if needs_drop::<T>() {
            let mut head = unsafe { self.head.unsync_load() };
            let tail = unsafe { self.tail.unsync_load() };

            while head != tail {
                unsafe { ptr::drop_in_place(self.slot(head).cast::<T>()) };

                head = (head + 1) & Self::MASK;
            }
        }
    }
}

/// Generates SPSC producer and consumer.
macro_rules! generate_spsc_producer_and_consumer {
    ($producer_name:ident, $consumer_name:ident, $new_fn:ident, $cursor:ty) => {
        /// The producer of the [`SPSCQueue`].
        ///
        /// It is `Send` but neither `Sync` nor `Clone`: there is exactly one.
        pub struct $producer_name<T, const CAPACITY: usize> {
            inner: LightArc<SPSCQueue<T, CAPACITY, $cursor>>,
            _non_sync: PhantomData<*const ()>,
        }

        impl<T, const CAPACITY: usize> $producer_name<T, CAPACITY> {
            /// Returns a reference to the inner [`SPSCQueue`].
            pub fn queue(&self) -> &SPSCQueue<T, CAPACITY, $cursor> {
                &self.inner
            }
        }

        impl<T: Send, const CAPACITY: usize> Producer<T> for $producer_name<T, CAPACITY> {
            #[inline]
            fn capacity(&self) -> usize {
                self.inner.capacity()
            }

            #[inline]
            fn len(&self) -> usize {
                self.inner.len()
            }

            #[inline]
            fn is_empty(&self) -> bool {
                self.inner.is_empty()
            }

            #[inline]
            fn push(&self, value: T) -> Result<(), T> {
                // The handle is unique and not `Sync`.
                unsafe { self.inner.producer_push(value) }
            }
        }

        #[allow(clippy::non_send_fields_in_send_ty, reason = "We guarantee it is safe")]
        unsafe impl<T: Send, const CAPACITY: usize> Send for $producer_name<T, CAPACITY> {}

        /// The consumer of the [`SPSCQueue`].
        ///
        /// It is `Send` but neither `Sync` nor `Clone`: there is exactly one.
        pub struct $consumer_name<T, const CAPACITY: usize> {
            inner: LightArc<SPSCQueue<T, CAPACITY, $cursor>>,
            _non_sync: PhantomData<*const ()>,
        }

        impl<T, const CAPACITY: usize> $consumer_name<T, CAPACITY> {
            /// Returns a reference to the inner [`SPSCQueue`].
            pub fn queue(&self) -> &SPSCQueue<T, CAPACITY, $cursor> {
                &self.inner
            }
        }

        impl<T: Send, const CAPACITY: usize> Consumer<T> for $consumer_name<T, CAPACITY> {
            #[inline]
            fn capacity(&self) -> usize {
                self.inner.capacity()
            }

            #[inline]
            fn len(&self) -> usize {
                self.inner.len()
            }

            #[inline]
            fn is_empty(&self) -> bool {
                self.inner.is_empty()
            }

            #[inline]
            fn pop(&self) -> Option<T> {
                // The handle is unique and not `Sync`.
                unsafe { self.inner.consumer_pop() }
            }
        }

        #[allow(clippy::non_send_fields_in_send_ty, reason = "We guarantee it is safe")]
        unsafe impl<T: Send, const CAPACITY: usize> Send for $consumer_name<T, CAPACITY> {}

        /// Creates a new single-producer, single-consumer queue.
        /// Returns its only producer and its only consumer.
        ///
        /// It accepts the capacity as a const generic parameter. It must be a
        /// power of two and at least 2; the queue holds `CAPACITY - 1` values.
        pub fn $new_fn<T, const CAPACITY: usize>(
        ) -> ($producer_name<T, CAPACITY>, $consumer_name<T, CAPACITY>) {
            let queue = LightArc::new(SPSCQueue::new());

            (
                $producer_name {
                    inner: queue.clone(),
                    _non_sync: PhantomData,
                },
                $consumer_name {
                    inner: queue,
                    _non_sync: PhantomData,
                },
            )
        }
    };
}

generate_spsc_producer_and_consumer!(
    SPSCProducer,
    SPSCConsumer,
    new_bounded,
    CachePaddedAtomicUsize
);

generate_spsc_producer_and_consumer!(
    UnpaddedSPSCProducer,
    UnpaddedSPSCConsumer,
    new_unpadded_bounded,
    NotCachePaddedAtomicUsize
);

#[cfg(all(test, not(hpc_ring_loom)))]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const CAPACITY: usize = 64;

    struct CountDrops<'a>(&'a AtomicUsize);

    impl Drop for CountDrops<'_> {
        fn drop(&mut self) {
            self.0.fetch_add(1, Relaxed);
        }
    }

    #[test]
    fn test_spsc_bounded_size() {
        let queue = SPSCQueue::<(), CAPACITY>::new();
        let padded_cursor = size_of::<CachePaddedAtomicUsize>();

        assert!(size_of_val(&queue) >= padded_cursor * 2);

        let unpadded_queue = SPSCQueue::<(), CAPACITY, NotCachePaddedAtomicUsize>::new();

        assert!(size_of_val(&unpadded_queue) < padded_cursor);
    }

    #[test]
    fn test_spsc_bounded_capacity_sacrifices_one_slot() {
        let (producer, consumer) = new_bounded::<_, CAPACITY>();

        assert_eq!(producer.capacity(), CAPACITY - 1);

        for i in 0..CAPACITY - 1 {
            producer.push(i).unwrap();
        }

        assert_eq!(producer.push(999), Err(999));
        assert_eq!(producer.len(), CAPACITY - 1);
        assert_eq!(producer.free_slots(), 0);

        assert_eq!(consumer.pop(), Some(0));
        assert!(producer.push(999).is_ok());
        assert_eq!(producer.push(1000), Err(1000));
    }

    #[test]
    fn test_spsc_bounded_empty_pop() {
        let (producer, consumer) = new_bounded::<u32, CAPACITY>();

        assert_eq!(consumer.pop(), None);

        producer.push(42).unwrap();

        assert_eq!(consumer.pop(), Some(42));
        assert_eq!(consumer.pop(), None);
    }

    #[test]
    fn test_spsc_bounded_is_empty_is_stable() {
        let (producer, consumer) = new_bounded::<u32, CAPACITY>();

        for _ in 0..10 {
            assert!(consumer.is_empty());
        }

        producer.push(1).unwrap();

        for _ in 0..10 {
            assert!(!consumer.is_empty());
            assert!(!producer.is_empty());
        }
    }

    #[test]
    fn test_spsc_bounded_seq_insertions() {
        let (producer, consumer) = new_bounded::<_, CAPACITY>();

        for i in 0..CAPACITY * 100 {
            producer.push(i).unwrap();

            assert_eq!(consumer.pop(), Some(i));
        }

        for i in 0..CAPACITY - 1 {
            producer.push(i).unwrap();
        }

        assert_eq!(consumer.len(), CAPACITY - 1);

        for i in 0..CAPACITY - 1 {
            assert_eq!(consumer.pop(), Some(i));
        }

        assert!(consumer.is_empty());
    }

    #[test]
    fn test_spsc_bounded_len_across_wraparound() {
        let queue = SPSCQueue::<usize, 8>::new();

        unsafe {
            for lap in 0..5 {
                for i in 0..5 {
                    queue.producer_push(lap * 10 + i).unwrap();
                }

                assert_eq!(queue.len(), 5);

                for i in 0..5 {
                    assert_eq!(queue.consumer_pop(), Some(lap * 10 + i));
                }

                assert_eq!(queue.len(), 0);
            }
        }
    }

    #[test]
    fn test_spsc_bounded_drops_remaining_values() {
        let drops = AtomicUsize::new(0);

        {
            let queue = SPSCQueue::<CountDrops<'_>, 8>::new();

            unsafe {
                for _ in 0..6 {
                    assert!(queue.producer_push(CountDrops(&drops)).is_ok());
                }

                drop(queue.consumer_pop());
                drop(queue.consumer_pop());
            }

            assert_eq!(drops.load(Relaxed), 2);
        }

        assert_eq!(drops.load(Relaxed), 6);
    }

    #[test]
    fn test_spsc_unpadded_behaves_like_padded() {
        let (producer, consumer) = new_unpadded_bounded::<_, 4>();

        assert_eq!(producer.push(1), Ok(()));
        assert_eq!(producer.push(2), Ok(()));
        assert_eq!(producer.push(3), Ok(()));
        assert_eq!(producer.push(4), Err(4));

        assert_eq!(consumer.pop(), Some(1));
        assert_eq!(consumer.pop(), Some(2));
        assert_eq!(consumer.pop(), Some(3));
        assert_eq!(consumer.pop(), None);
    }
}
