use crate::loom_bindings::sync::atomic::{AtomicBool, AtomicUsize};
use crate::loom_bindings::sync::Arc;
use crate::loom_bindings::thread;
use crate::mpmc::{self, MPMCQueue};
use crate::{spsc, Consumer, MultiConsumer, MultiProducer, Producer};
use std::sync::atomic::Ordering;

fn loom_spsc_handoff<P, C>(creator: fn() -> (P, C))
where
    P: Producer<usize> + Send + 'static,
    C: Consumer<usize> + Send + 'static,
{
    const ITEMS: usize = 2;

    loom::model(move || {
        let (producer, consumer) = creator();

        let th = thread::spawn(move || {
            for i in 0..ITEMS {
                let mut value = i;

                while let Err(rejected) = producer.push(value) {
                    value = rejected;

                    thread::yield_now();
                }
            }
        });

        let mut expected = 0;

        while expected < ITEMS {
            match consumer.pop() {
                Some(value) => {
                    assert_eq!(value, expected);

                    expected += 1;
                }
                None => thread::yield_now(),
            }
        }

        th.join().unwrap();

        assert!(consumer.is_empty());
    });
}

#[test]
fn loom_spsc_bounded_handoff() {
    loom_spsc_handoff(spsc::new_bounded::<usize, 2>);
}

#[test]
fn loom_spsc_unpadded_bounded_handoff() {
    loom_spsc_handoff(spsc::new_unpadded_bounded::<usize, 4>);
}

#[test]
fn loom_spsc_publishes_non_atomic_payload() {
    // A value popped by the consumer must be fully visible, including data
    // written by the producer before the push.
    loom::model(|| {
        let (producer, consumer) = spsc::new_bounded::<Arc<AtomicUsize>, 2>();
        let payload = Arc::new(AtomicUsize::new(0));
        let payload_clone = payload.clone();

        let th = thread::spawn(move || {
            payload_clone.store(42, Ordering::Relaxed);

            assert!(producer.push(payload_clone).is_ok());
        });

        loop {
            if let Some(received) = consumer.pop() {
                assert_eq!(received.load(Ordering::Relaxed), 42);

                break;
            }

            thread::yield_now();
        }

        th.join().unwrap();
        drop(payload);
    });
}

fn loom_mpmc_two_producers<P, C>(creator: fn() -> (P, C))
where
    P: MultiProducer<usize> + Send + 'static,
    C: MultiConsumer<usize> + Send + 'static,
{
    loom::model(move || {
        let (producer, consumer) = creator();
        let other_producer = producer.clone();

        let th0 = thread::spawn(move || producer.push(1).is_ok());
        let th1 = thread::spawn(move || other_producer.push(2).is_ok());

        assert!(th0.join().unwrap());
        assert!(th1.join().unwrap());

        let mut sum = 0;

        while let Some(value) = consumer.pop() {
            sum += value;
        }

        assert_eq!(sum, 3);
    });
}

#[test]
fn loom_mpmc_bounded_two_producers() {
    loom_mpmc_two_producers(mpmc::new_bounded::<usize, 2>);
}

#[test]
fn loom_mpmc_unpadded_bounded_two_producers() {
    loom_mpmc_two_producers(mpmc::new_unpadded_bounded::<usize, 2>);
}

#[test]
fn loom_mpmc_concurrent_push_and_pop() {
    loom::model(|| {
        let queue = Arc::new(MPMCQueue::<usize, 2>::new());
        let popped_twice = Arc::new(AtomicBool::new(false));

        assert!(queue.push(10).is_ok());

        let producer_queue = queue.clone();
        let producer = thread::spawn(move || producer_queue.push(20).is_ok());

        let consumer_queue = queue.clone();
        let consumer_flag = popped_twice.clone();
        let consumer = thread::spawn(move || {
            let first = consumer_queue.pop();
            let second = consumer_queue.pop();

            consumer_flag.store(second.is_some(), Ordering::Relaxed);

            first.unwrap_or(0) + second.unwrap_or(0)
        });

        assert!(producer.join().unwrap());

        let mut sum = consumer.join().unwrap();

        while let Some(value) = queue.pop() {
            sum += value;
        }

        // 10 is pushed before the threads start, so the first pop always gets it.
        assert_eq!(sum, 30);

        if popped_twice.load(Ordering::Relaxed) {
            assert!(queue.is_empty());
        }
    });
}
