//! This module provides a multi-producer, multi-consumer bounded queue. Read more in
//! [`MPMCQueue`].
use crate::cache_padded::{AtomicCursor, CachePaddedAtomicUsize, NotCachePaddedAtomicUsize};
use crate::capacity::mask_for;
use crate::hints::{assert_hint, unlikely};
use crate::light_arc::LightArc;
use crate::loom_bindings::sync::atomic::AtomicUsize;
use crate::multi_consumer::{MultiConsumer, MultiConsumerSpawner};
use crate::multi_producer::{MultiProducer, MultiProducerSpawner};
use crate::{Consumer, Producer};
use std::cell::UnsafeCell;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::mem::{needs_drop, MaybeUninit};
use std::ptr;
use std::sync::atomic;
use std::sync::atomic::Ordering::{Acquire, Relaxed, Release};

// Implementation notes.
//
// Several producers can't share one `tail` the way the SPSC ring does: the
// tail can't be advanced before the write (a consumer could read an unwritten
// slot) nor after it (two producers could write the same slot). Instead every
// slot carries a sequence number that says which lap of which side may touch it.
//
// `enqueue_pos` and `dequeue_pos` are unmasked, ever-increasing (wrapping)
// positions. For the slot at `pos & MASK`:
//   - `sequence == pos`                  -> free for the producer at `pos`
//   - `sequence == pos + 1`              -> written, ready for the consumer at `pos`
//   - `sequence == pos + CAPACITY`       -> consumed, free for the producer one lap later
//
// A side first claims its position with a CAS on its cursor and only then
// touches the slot, so each slot is written once and read once per lap. The
// `Release` store of the sequence publishes the slot to the other side, whose
// `Acquire` load of the sequence pairs with it. The cursors themselves carry no
// data and are accessed `Relaxed`.
//
// Comparing `sequence` with the expected value as a signed wrapping distance
// keeps the protocol correct when the positions wrap around `usize::MAX`.

/// The per-slot sequence number. Read more in the implementation notes.
struct Sequence(AtomicUsize);

impl Sequence {
    #[inline(always)]
    fn new(position: usize) -> Self {
        Self(AtomicUsize::new(position))
    }

    #[inline(always)]
    fn load(&self, ordering: atomic::Ordering) -> usize {
        self.0.load(ordering)
    }

    #[inline(always)]
    fn mark_as_occupied(&self, enqueue_pos: usize, ordering: atomic::Ordering) {
        self.0.store(enqueue_pos.wrapping_add(1), ordering);
    }

    #[inline(always)]
    fn mark_as_free(&self, dequeue_pos: usize, capacity: usize, ordering: atomic::Ordering) {
        self.0.store(dequeue_pos.wrapping_add(capacity), ordering);
    }

    /// Compares the loaded `sequence` with the `expected` one across wraparound.
    #[inline(always)]
    #[allow(
        clippy::cast_possible_wrap,
        reason = "The wrapping distance is meant to be read as signed"
    )]
    fn compare(sequence: usize, expected: usize) -> Ordering {
        (sequence.wrapping_sub(expected) as isize).cmp(&0)
    }
}

struct Slot<T> {
    sequence: Sequence,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
    fn new_without_value(position: usize) -> Self {
        Self {
            sequence: Sequence::new(position),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    unsafe fn read_value(&self) -> T {
        unsafe { self.value.get().cast::<T>().read() }
    }

    unsafe fn write_value(&self, value: T) {
        unsafe { self.value.get().cast::<T>().write(value) }
    }
}

/// A multi-producer, multi-consumer bounded queue.
///
/// Any number of threads may push and pop concurrently through a shared
/// reference. `push` and `pop` are lock-free but not wait-free: a thread that
/// keeps losing the race for a position retries without bound while others
/// make progress.
///
/// `CAPACITY` must be a power of two and at least 2; other values fail to
/// compile. All `CAPACITY` slots are usable.
///
/// It accepts the cursor type as a generic parameter. The default,
/// [`CachePaddedAtomicUsize`], keeps `enqueue_pos` and `dequeue_pos` on
/// separate cache lines.
///
/// # Using directly the [`MPMCQueue`] vs. using [`new_bounded`].
///
/// The queue is `Sync`, so it can be shared with `Arc` or scoped threads.
/// [`new_bounded`] allocates it in a [`LightArc`] and returns cloneable
/// producer and consumer handles, which is handy when producer and consumer
/// logic live apart.
///
/// # Examples
///
/// ```
/// use hpc_ring::mpmc::MPMCQueue;
/// use std::thread;
///
/// let queue = MPMCQueue::<usize, 64>::new();
///
/// thread::scope(|s| {
///     for p in 0..4 {
///         let queue = &queue;
///
///         s.spawn(move || {
///             for i in 0..10 {
///                 while queue.push(p * 10 + i).is_err() {
///                     thread::yield_now();
///                 }
///             }
///         });
///     }
/// });
///
/// let mut values: Vec<_> = std::iter::from_fn(|| queue.pop()).collect();
/// values.sort_unstable();
///
/// assert_eq!(values, (0..40).collect::<Vec<_>>());
/// ```
pub struct MPMCQueue<T, const CAPACITY: usize, Cursor: AtomicCursor = CachePaddedAtomicUsize> {
    slots: Box<[Slot<T>]>,
    enqueue_pos: Cursor,
    dequeue_pos: Cursor,
}

impl<T, const CAPACITY: usize, Cursor: AtomicCursor> MPMCQueue<T, CAPACITY, Cursor> {
    const MASK: usize = mask_for(CAPACITY);

    /// Creates a new empty [`MPMCQueue`].
    pub fn new() -> Self {
        Self {
            slots: (0..=Self::MASK).map(Slot::new_without_value).collect(),
            enqueue_pos: Cursor::default(),
            dequeue_pos: Cursor::default(),
        }
    }

    /// Returns the number of values the queue can hold at once (`CAPACITY`).
    #[inline]
    pub fn capacity(&self) -> usize {
        CAPACITY
    }

    /// Returns the number of values in the queue.
    ///
    /// It is a relaxed snapshot and may be stale as soon as it returns.
    pub fn len(&self) -> usize {
        let mut dequeue_pos = self.dequeue_pos.load(Relaxed);
        let mut enqueue_pos = self.enqueue_pos.load(Relaxed);

        loop {
            let len = enqueue_pos.wrapping_sub(dequeue_pos);

            if unlikely(len > CAPACITY) {
                // Inconsistent snapshot (this thread has been preempted
                // between the two loads), try again

                dequeue_pos = self.dequeue_pos.load(Relaxed);
                enqueue_pos = self.enqueue_pos.load(Relaxed);

                continue;
            }

            return len;
        }
    }

    /// Returns whether the queue is empty.
    ///
    /// It is a relaxed snapshot: stable without concurrent operations,
    /// a hint otherwise.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dequeue_pos.load(Relaxed) == self.enqueue_pos.load(Relaxed)
    }

    #[inline(always)]
    fn slot(&self, position: usize) -> &Slot<T> {
        let index = position & Self::MASK;

        assert_hint(index < self.slots.len(), "ring index out of bounds");

        &self.slots[index]
    }

    /// Pushes a value to the queue or returns it back if the queue is full.
    ///
    /// A full queue is left unchanged.
    pub fn push(&self, value: T) -> Result<(), T> {
        let mut pos = self.enqueue_pos.load(Relaxed);

        loop {
            let slot = self.slot(pos);
            let sequence = slot.sequence.load(Acquire);

            match Sequence::compare(sequence, pos) {
                Ordering::Equal => {
                    let cas_result = self.enqueue_pos.compare_exchange_weak(
                        pos,
                        pos.wrapping_add(1),
                        Relaxed,
                        Relaxed,
                    );

                    match cas_result {
                        Ok(_) => {
                            unsafe { slot.write_value(value) };

                            slot.sequence.mark_as_occupied(pos, Release);

                            return Ok(());
                        }
                        Err(current_pos) => {
                            // Another producer has claimed `pos`.
                            pos = current_pos;
                        }
                    }
                }
                Ordering::Less => {
                    // The slot still holds the value written one lap ago.
                    return Err(value);
                }
                Ordering::Greater => {
                    // We lose the race. Try to push again.
                    pos = self.enqueue_pos.load(Relaxed);
                }
            }
        }
    }

    /// Pops the oldest value from the queue, or returns `None` if it is empty.
    ///
    /// A slot whose producer has claimed it but not finished writing yet is
    /// reported as empty.
    pub fn pop(&self) -> Option<T> {
        let mut pos = self.dequeue_pos.load(Relaxed);

        loop {
            let slot = self.slot(pos);
            let sequence = slot.sequence.load(Acquire);

            match Sequence::compare(sequence, pos.wrapping_add(1)) {
                Ordering::Equal => {
                    let cas_result = self.dequeue_pos.compare_exchange_weak(
                        pos,
                        pos.wrapping_add(1),
                        Relaxed,
                        Relaxed,
                    );

                    match cas_result {
                        Ok(_) => {
                            let value = unsafe { slot.read_value() };

                            slot.sequence.mark_as_free(pos, CAPACITY, Release);

                            return Some(value);
                        }
                        Err(current_pos) => {
                            // Another consumer has claimed `pos`.
                            pos = current_pos;
                        }
                    }
                }
                Ordering::Less => return None,
                Ordering::Greater => {
                    // We lose the race. Try to pop again.
                    pos = self.dequeue_pos.load(Relaxed);
                }
            }
        }
    }
}

#[cfg(all(test, not(hpc_ring_loom)))]
impl<T, const CAPACITY: usize, Cursor: AtomicCursor> MPMCQueue<T, CAPACITY, Cursor> {
    /// Creates an empty queue whose positions start at `position`.
    fn starting_at(position: usize) -> Self {
        let queue = Self {
            slots: (0..=Self::MASK)
                .map(|index| {
                    Slot::new_without_value(position.wrapping_add(index.wrapping_sub(position) & Self::MASK))
                })
                .collect(),
            enqueue_pos: Cursor::default(),
            dequeue_pos: Cursor::default(),
        };

        queue.enqueue_pos.store(position, Relaxed);
        queue.dequeue_pos.store(position, Relaxed);

        queue
    }
}

impl<T, const CAPACITY: usize, Cursor: AtomicCursor> Default for MPMCQueue<T, CAPACITY, Cursor> {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl<T: Send, const CAPACITY: usize, Cursor: AtomicCursor + Sync> Sync
    for MPMCQueue<T, CAPACITY, Cursor>
{
}

impl<T, const CAPACITY: usize, Cursor: AtomicCursor> Producer<T>
    for MPMCQueue<T, CAPACITY, Cursor>
{
    #[inline]
    fn capacity(&self) -> usize {
        CAPACITY
    }

    #[inline]
    fn len(&self) -> usize {
        Self::len(self)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        Self::is_empty(self)
    }

    #[inline]
    fn push(&self, value: T) -> Result<(), T> {
        Self::push(self, value)
    }
}

impl<T, const CAPACITY: usize, Cursor: AtomicCursor> Consumer<T>
    for MPMCQueue<T, CAPACITY, Cursor>
{
    #[inline]
    fn capacity(&self) -> usize {
        CAPACITY
    }

    #[inline]
    fn len(&self) -> usize {
        Self::len(self)
    }

    #[inline]
    fn is_empty(&self) -> bool {
        Self::is_empty(self)
    }

    #[inline]
    fn pop(&self) -> Option<T> {
        Self::pop(self)
    }
}

impl<T, const CAPACITY: usize, Cursor: AtomicCursor> Drop for MPMCQueue<T, CAPACITY, Cursor> {
    fn drop(&mut self) {
        // While dropping there is no concurrency, and every claimed position
        // has been written.

        if needs_drop::<T>() {
            let mut pos = unsafe { self.dequeue_pos.unsync_load() };
            let end = unsafe { self.enqueue_pos.unsync_load() };

            while pos != end {
                unsafe { ptr::drop_in_place(self.slot(pos).value.get().cast::<T>()) };

                pos = pos.wrapping_add(1);
            }
        }
    }
}

/// Generates MPMC producer and consumer.
macro_rules! generate_mpmc_producer_and_consumer {
    ($producer_name:ident, $consumer_name:ident, $new_fn:ident, $cursor:ty) => {
        /// The producer of the [`MPMCQueue`].
        ///
        /// Clone it to get more producers of the same queue.
        pub struct $producer_name<T: Send, const CAPACITY: usize> {
            inner: LightArc<MPMCQueue<T, CAPACITY, $cursor>>,
            _non_sync: PhantomData<*const ()>,
        }

        impl<T: Send, const CAPACITY: usize> $producer_name<T, CAPACITY> {
            /// Returns a reference to the inner [`MPMCQueue`].
            pub fn queue(&self) -> &MPMCQueue<T, CAPACITY, $cursor> {
                &self.inner
            }
        }

        impl<T: Send, const CAPACITY: usize> Producer<T> for $producer_name<T, CAPACITY> {
            #[inline]
            fn capacity(&self) -> usize {
                CAPACITY
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
                self.inner.push(value)
            }
        }

        impl<T: Send, const CAPACITY: usize> MultiProducer<T> for $producer_name<T, CAPACITY> {}

        impl<T: Send, const CAPACITY: usize> MultiConsumerSpawner<T>
            for $producer_name<T, CAPACITY>
        {
            type SpawnedConsumer = $consumer_name<T, CAPACITY>;

            fn spawn_multi_consumer(&self) -> Self::SpawnedConsumer {
                $consumer_name {
                    inner: self.inner.clone(),
                    _non_sync: PhantomData,
                }
            }
        }

        impl<T: Send, const CAPACITY: usize> Clone for $producer_name<T, CAPACITY> {
            fn clone(&self) -> Self {
                Self {
                    inner: self.inner.clone(),
                    _non_sync: PhantomData,
                }
            }
        }

        #[allow(clippy::non_send_fields_in_send_ty, reason = "We guarantee it is safe")]
        unsafe impl<T: Send, const CAPACITY: usize> Send for $producer_name<T, CAPACITY> {}

        /// The consumer of the [`MPMCQueue`].
        ///
        /// Clone it to get more consumers of the same queue.
        pub struct $consumer_name<T: Send, const CAPACITY: usize> {
            inner: LightArc<MPMCQueue<T, CAPACITY, $cursor>>,
            _non_sync: PhantomData<*const ()>,
        }

        impl<T: Send, const CAPACITY: usize> $consumer_name<T, CAPACITY> {
            /// Returns a reference to the inner [`MPMCQueue`].
            pub fn queue(&self) -> &MPMCQueue<T, CAPACITY, $cursor> {
                &self.inner
            }
        }

        impl<T: Send, const CAPACITY: usize> Consumer<T> for $consumer_name<T, CAPACITY> {
            #[inline]
            fn capacity(&self) -> usize {
                CAPACITY
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
                self.inner.pop()
            }
        }

        impl<T: Send, const CAPACITY: usize> MultiConsumer<T> for $consumer_name<T, CAPACITY> {}

        impl<T: Send, const CAPACITY: usize> MultiProducerSpawner<T>
            for $consumer_name<T, CAPACITY>
        {
            type SpawnedProducer = $producer_name<T, CAPACITY>;

            fn spawn_multi_producer(&self) -> Self::SpawnedProducer {
                $producer_name {
                    inner: self.inner.clone(),
                    _non_sync: PhantomData,
                }
            }
        }

        impl<T: Send, const CAPACITY: usize> Clone for $consumer_name<T, CAPACITY> {
            fn clone(&self) -> Self {
                Self {
                    inner: self.inner.clone(),
                    _non_sync: PhantomData,
                }
            }
        }

        #[allow(clippy::non_send_fields_in_send_ty, reason = "We guarantee it is safe")]
        unsafe impl<T: Send, const CAPACITY: usize> Send for $consumer_name<T, CAPACITY> {}

        /// Creates a new multi-producer, multi-consumer queue.
        /// Returns a producer and a consumer; clone either to add more.
        ///
        /// It accepts the capacity as a const generic parameter. It must be a
        /// power of two and at least 2.
        pub fn $new_fn<T: Send, const CAPACITY: usize>(
        ) -> ($producer_name<T, CAPACITY>, $consumer_name<T, CAPACITY>) {
            let queue = LightArc::new(MPMCQueue::new());

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

generate_mpmc_producer_and_consumer!(
    MPMCProducer,
    MPMCConsumer,
    new_bounded,
    CachePaddedAtomicUsize
);

generate_mpmc_producer_and_consumer!(
    UnpaddedMPMCProducer,
    UnpaddedMPMCConsumer,
    new_unpadded_bounded,
    NotCachePaddedAtomicUsize
);

#[cfg(all(test, not(hpc_ring_loom)))]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    const CAPACITY: usize = 16;

    struct CountDrops<'a>(&'a StdAtomicUsize);

    impl Drop for CountDrops<'_> {
        fn drop(&mut self) {
            self.0.fetch_add(1, Relaxed);
        }
    }

    #[test]
    fn test_mpmc_bounded_seq_insertions() {
        let (producer, consumer) = new_bounded::<_, CAPACITY>();

        for i in 0..CAPACITY {
            producer.push(i).unwrap();
        }

        assert_eq!(producer.push(0), Err(0));
        assert_eq!(producer.len(), CAPACITY);
        assert_eq!(consumer.len(), CAPACITY);

        for i in 0..CAPACITY {
            assert_eq!(consumer.pop(), Some(i));
        }

        assert_eq!(consumer.pop(), None);
    }

    #[test]
    fn test_mpmc_bounded_push_after_pop_on_full_queue() {
        let queue = MPMCQueue::<u32, 4>::new();

        for i in 0..4 {
            assert!(queue.push(i).is_ok());
        }

        assert_eq!(queue.push(4), Err(4));
        assert_eq!(queue.pop(), Some(0));
        assert_eq!(queue.push(4), Ok(()));
        assert_eq!(queue.push(5), Err(5));
    }

    #[test]
    fn test_mpmc_bounded_empty_pop() {
        let queue = MPMCQueue::<u32, CAPACITY>::new();

        assert_eq!(queue.pop(), None);

        queue.push(42).unwrap();

        assert_eq!(queue.pop(), Some(42));
        assert_eq!(queue.pop(), None);

        for _ in 0..10 {
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn test_mpmc_bounded_many_laps() {
        let queue = MPMCQueue::<usize, 8>::new();

        for lap in 0..100 {
            for i in 0..5 {
                queue.push(lap * 10 + i).unwrap();
            }

            assert_eq!(queue.len(), 5);

            for i in 0..5 {
                assert_eq!(queue.pop(), Some(lap * 10 + i));
            }
        }

        assert!(queue.is_empty());
    }

    #[test]
    fn test_mpmc_bounded_positions_wrap_around() {
        let queue = MPMCQueue::<usize, 8>::starting_at(usize::MAX - 11);

        for round in 0..10 {
            for i in 0..8 {
                queue.push(round * 8 + i).unwrap();
            }

            assert_eq!(queue.push(usize::MAX), Err(usize::MAX));
            assert_eq!(queue.len(), 8);

            for i in 0..8 {
                assert_eq!(queue.pop(), Some(round * 8 + i));
            }

            assert_eq!(queue.pop(), None);
        }
    }

    #[test]
    fn test_mpmc_bounded_drops_remaining_values() {
        let drops = StdAtomicUsize::new(0);

        {
            let queue = MPMCQueue::<CountDrops<'_>, 8>::new();

            for _ in 0..8 {
                assert!(queue.push(CountDrops(&drops)).is_ok());
            }

            drop(queue.pop());
            drop(queue.pop());
            drop(queue.pop());

            assert_eq!(drops.load(Relaxed), 3);
        }

        assert_eq!(drops.load(Relaxed), 8);
    }

    #[test]
    fn test_mpmc_handles_share_one_queue() {
        let (producer, consumer) = new_unpadded_bounded::<u32, CAPACITY>();
        let spawned_producer = consumer.spawn_multi_producer();
        let spawned_consumer = producer.spawn_multi_consumer();

        producer.push(1).unwrap();
        spawned_producer.push(2).unwrap();
        producer.clone().push(3).unwrap();

        assert!(LightArc::ptr_eq(&producer.inner, &spawned_consumer.inner));
        assert_eq!(spawned_consumer.pop(), Some(1));
        assert_eq!(consumer.clone().pop(), Some(2));
        assert_eq!(consumer.pop(), Some(3));
        assert!(consumer.is_empty());
    }
}
