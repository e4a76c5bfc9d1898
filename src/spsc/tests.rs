use crate::backoff::Backoff;
use crate::spsc::{new_bounded, new_unpadded_bounded};
use crate::test_lock::TEST_LOCK;
use crate::{Consumer as ConsumerExt, Producer as ProducerExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::spawn;

const N: usize = if cfg!(miri) { 500 } else { 100_000 };

/// Pushes `0..N` from one thread and drains from another until the producer
/// is done and the queue is empty. Returns what the consumer received.
fn run_producer_consumer<Producer, Consumer>(creator: fn() -> (Producer, Consumer)) -> Vec<usize>
where
    Producer: ProducerExt<usize> + Send + 'static,
    Consumer: ConsumerExt<usize> + Send + 'static,
{
    let (producer, consumer) = creator();
    let producer_done = Arc::new(AtomicBool::new(false));
    let producer_done_clone = producer_done.clone();

    let t0 = spawn(move || {
        for i in 0..N {
            let backoff = Backoff::new();
            let mut value = i;

            while let Err(rejected) = producer.push(value) {
                value = rejected;

                backoff.snooze();
            }
        }

        producer_done_clone.store(true, Ordering::Release);
    });

    let t1 = spawn(move || {
        let mut received = Vec::with_capacity(N);
        let backoff = Backoff::new();

        while !producer_done.load(Ordering::Acquire) || !consumer.is_empty() {
            if let Some(value) = consumer.pop() {
                received.push(value);

                backoff.reset();
            } else {
                backoff.snooze();
            }
        }

        while let Some(value) = consumer.pop() {
            received.push(value);
        }

        received
    });

    t0.join().unwrap();

    t1.join().unwrap()
}

fn test_spsc_fifo<Producer, Consumer>(creator: fn() -> (Producer, Consumer))
where
    Producer: ProducerExt<usize> + Send + 'static,
    Consumer: ConsumerExt<usize> + Send + 'static,
{
    let received = run_producer_consumer(creator);

    assert_eq!(received.len(), N);

    for (i, value) in received.iter().enumerate() {
        assert_eq!(*value, i, "received[{i}] = {value}");
    }
}

fn test_spsc_no_loss_no_duplicates<Producer, Consumer>(creator: fn() -> (Producer, Consumer))
where
    Producer: ProducerExt<usize> + Send + 'static,
    Consumer: ConsumerExt<usize> + Send + 'static,
{
    let mut received = run_producer_consumer(creator);

    received.sort_unstable();

    assert_eq!(received.len(), N);
    assert!(received.windows(2).all(|pair| pair[0] != pair[1]));
    assert!(received.iter().copied().eq(0..N));
}

#[test]
fn test_bounded_spsc_multi_threaded_fifo() {
    let test_guard = TEST_LOCK.lock();

    test_spsc_fifo(new_bounded::<usize, 1024>);

    println!("Cache padded done, start unpadded");

    test_spsc_fifo(new_unpadded_bounded::<usize, 1024>);

    drop(test_guard);
}

#[test]
fn test_bounded_spsc_multi_threaded_no_duplicates() {
    let test_guard = TEST_LOCK.lock();

    test_spsc_no_loss_no_duplicates(new_bounded::<usize, 512>);

    println!("Cache padded done, start unpadded");

    test_spsc_no_loss_no_duplicates(new_unpadded_bounded::<usize, 512>);

    drop(test_guard);
}

#[test]
fn test_bounded_spsc_tiny_ring_under_contention() {
    let test_guard = TEST_LOCK.lock();

    // A two-slot ring holds one value: every push waits for the matching pop.
    test_spsc_fifo(new_bounded::<usize, 2>);

    drop(test_guard);
}
