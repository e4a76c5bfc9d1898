//! This module runs the queues under real threads and checks what comes out.
//!
//! [`run_spsc_demo`] streams `0..spsc_items` through an SPSC queue and checks
//! the FIFO order. [`run_mpmc_demo`] lets several producers and consumers share
//! an MPMC queue and checks that every value is popped exactly once.
//!
//! Both return a report; call `verify` on it to turn a broken guarantee into a
//! [`DemoError`].
use crate::backoff::Backoff;
use crate::error::DemoError;
use crate::mpmc::MPMCQueue;
use crate::{spsc, Consumer, Producer};
use std::env;
use std::mem::size_of;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// The capacity of both demo queues.
pub const DEMO_CAPACITY: usize = 1024;

/// The largest `spsc_items` whose received values fit in one allocation.
pub const MAX_SPSC_ITEMS: usize = isize::MAX as usize / size_of::<usize>();

/// The largest `producers * items_per_producer` whose seen-table fits in one allocation.
pub const MAX_MPMC_ITEMS: usize = isize::MAX as usize / size_of::<AtomicU32>();

const SPSC_ITEMS_VAR: &str = "HPC_RING_SPSC_ITEMS";
const PRODUCERS_VAR: &str = "HPC_RING_PRODUCERS";
const CONSUMERS_VAR: &str = "HPC_RING_CONSUMERS";
const ITEMS_PER_PRODUCER_VAR: &str = "HPC_RING_ITEMS_PER_PRODUCER";

/// Parameters of the demos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DemoConfig {
    /// How many values the SPSC producer pushes.
    pub spsc_items: usize,
    /// How many MPMC producer threads to run.
    pub producers: usize,
    /// How many MPMC consumer threads to run.
    pub consumers: usize,
    /// How many values each MPMC producer pushes.
    pub items_per_producer: usize,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            spsc_items: 100_000,
            producers: 4,
            consumers: 4,
            items_per_producer: 10_000,
        }
    }
}

impl DemoConfig {
    /// Returns the default config with every field overridden by its
    /// environment variable when that variable is set:
    /// `HPC_RING_SPSC_ITEMS`, `HPC_RING_PRODUCERS`, `HPC_RING_CONSUMERS`
    /// and `HPC_RING_ITEMS_PER_PRODUCER`.
    ///
    /// The result is validated.
    pub fn from_env() -> Result<Self, DemoError> {
        let defaults = Self::default();
        let config = Self {
            spsc_items: read_var(SPSC_ITEMS_VAR, defaults.spsc_items)?,
            producers: read_var(PRODUCERS_VAR, defaults.producers)?,
            consumers: read_var(CONSUMERS_VAR, defaults.consumers)?,
            items_per_producer: read_var(ITEMS_PER_PRODUCER_VAR, defaults.items_per_producer)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Rejects configs the demos can't run: no producers, no consumers, or
    /// more values than their bookkeeping can address
    /// ([`MAX_SPSC_ITEMS`], [`MAX_MPMC_ITEMS`]).
    pub fn validate(&self) -> Result<(), DemoError> {
        if self.producers == 0 {
            return Err(DemoError::InvalidConfig {
                field: "producers",
                reason: "must be at least 1".to_owned(),
            });
        }

        if self.consumers == 0 {
            return Err(DemoError::InvalidConfig {
                field: "consumers",
                reason: "must be at least 1".to_owned(),
            });
        }

        if self.spsc_items > MAX_SPSC_ITEMS {
            return Err(DemoError::InvalidConfig {
                field: "spsc_items",
                reason: format!("must be at most {MAX_SPSC_ITEMS}"),
            });
        }

        match self.producers.checked_mul(self.items_per_producer) {
            Some(items) if items <= MAX_MPMC_ITEMS => Ok(()),
            _ => Err(DemoError::InvalidConfig {
                field: "items_per_producer",
                reason: format!(
                    "{} producers * {} items must be at most {MAX_MPMC_ITEMS}",
                    self.producers, self.items_per_producer
                ),
            }),
        }
    }

    fn mpmc_items(&self) -> usize {
        self.producers * self.items_per_producer
    }
}

fn read_var(name: &'static str, default: usize) -> Result<usize, DemoError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|err| DemoError::InvalidConfig {
            field: name,
            reason: format!("{raw:?} is not a count: {err}"),
        }),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(env::VarError::NotUnicode(raw)) => Err(DemoError::InvalidConfig {
            field: name,
            reason: format!("{raw:?} is not valid unicode"),
        }),
    }
}

/// Reserves room for `len` values up front, or reports that `field` asks for too much.
fn reserve_exact<T>(field: &'static str, len: usize) -> Result<Vec<T>, DemoError> {
    let mut values = Vec::new();

    values
        .try_reserve_exact(len)
        .map_err(|err| DemoError::InvalidConfig {
            field,
            reason: format!("{len} entries can't be allocated: {err}"),
        })?;

    Ok(values)
}

/// Raises the flag when dropped, also when the owning thread panics.
struct RaiseOnDrop<'a>(&'a AtomicBool);

impl Drop for RaiseOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Leaves the count of running threads when dropped, also when the owning thread panics.
struct LeaveOnDrop<'a>(&'a AtomicUsize);

impl Drop for LeaveOnDrop<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Release);
    }
}

/// The outcome of [`run_spsc_demo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpscReport {
    /// How many values have been pushed.
    pub sent: usize,
    /// How many values have been popped.
    pub received: usize,
    /// Whether the `i`-th popped value is `i` for every `i`.
    pub fifo_preserved: bool,
    /// The index, the expected and the actual value of the first out-of-order value.
    pub first_violation: Option<(usize, usize, usize)>,
    /// Wall time from spawning the threads to joining them.
    pub elapsed: Duration,
}

impl SpscReport {
    /// Returns an error if a value has been lost, added or reordered.
    pub fn verify(&self) -> Result<(), DemoError> {
        if let Some((index, expected, actual)) = self.first_violation {
            return Err(DemoError::FifoViolation {
                index,
                expected,
                actual,
            });
        }

        if self.sent != self.received {
            return Err(DemoError::CountMismatch {
                queue: "spsc",
                expected: self.sent,
                actual: self.received,
                missing: self.sent.saturating_sub(self.received),
            });
        }

        Ok(())
    }
}

/// The outcome of [`run_mpmc_demo`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MpmcReport {
    /// How many values the producers have pushed.
    pub produced: usize,
    /// How many values the consumers have popped.
    pub consumed: usize,
    /// `producers * items_per_producer`.
    pub expected: usize,
    /// How many distinct values have been popped more than once.
    pub duplicates: usize,
    /// How many pushed values have never been popped.
    pub missing: usize,
    /// Wall time from spawning the threads to joining them.
    pub elapsed: Duration,
}

impl MpmcReport {
    /// Returns an error unless every produced value has been popped exactly once.
    pub fn verify(&self) -> Result<(), DemoError> {
        if self.duplicates > 0 {
            return Err(DemoError::Duplicates {
                count: self.duplicates,
            });
        }

        if self.produced != self.expected || self.consumed != self.expected || self.missing > 0 {
            return Err(DemoError::CountMismatch {
                queue: "mpmc",
                expected: self.expected,
                actual: self.consumed,
                missing: self.missing,
            });
        }

        Ok(())
    }
}

/// Pushes `0..config.spsc_items` from a producer thread to a consumer thread
/// through an SPSC queue of [`DEMO_CAPACITY`] and records what arrives.
///
/// The producer retries a full queue with [`Backoff::snooze`] and raises a
/// done flag when it has pushed everything. The consumer pops until the flag
/// is raised and the queue is empty, then drains what is left.
pub fn run_spsc_demo(config: &DemoConfig) -> Result<SpscReport, DemoError> {
    config.validate()?;

    let items = config.spsc_items;
    let received = reserve_exact::<usize>("spsc_items", items)?;

    info!(items, capacity = DEMO_CAPACITY, "starting SPSC demo");

    let start = Instant::now();
    let received = transfer_through_spsc(items, received)?;
    let elapsed = start.elapsed();
    let first_violation = received
        .iter()
        .enumerate()
        .find(|(index, value)| *index != **value)
        .map(|(index, value)| (index, index, *value));
    let report = SpscReport {
        sent: items,
        received: received.len(),
        fifo_preserved: first_violation.is_none() && received.len() == items,
        first_violation,
        elapsed,
    };

    info!(
        sent = report.sent,
        received = report.received,
        fifo_preserved = report.fifo_preserved,
        elapsed_ms = report.elapsed.as_millis(),
        "SPSC demo finished"
    );

    Ok(report)
}

/// Moves `0..items` through an SPSC queue into `sink` and returns the sink.
///
/// If the consumer thread dies, the producer stops retrying and the
/// consumer's panic is reported as [`DemoError::ThreadPanicked`].
fn transfer_through_spsc<S>(items: usize, mut sink: S) -> Result<S, DemoError>
where
    S: Extend<usize> + Send,
{
    let (producer, consumer) = spsc::new_bounded::<usize, DEMO_CAPACITY>();
    let producer_done = AtomicBool::new(false);
    let consumer_running = AtomicUsize::new(1);

    thread::scope(|s| {
        let (producer_done, consumer_running) = (&producer_done, &consumer_running);

        let producer_handle = s.spawn(move || {
            let _done = RaiseOnDrop(producer_done);

            for i in 0..items {
                let backoff = Backoff::new();
                let mut value = i;

                while let Err(rejected) = producer.push(value) {
                    if consumer_running.load(Ordering::Acquire) == 0 {
                        warn!(pushed = i, "SPSC consumer is gone, producer stops");

                        return;
                    }

                    value = rejected;

                    backoff.snooze();
                }
            }

            debug!(items, "SPSC producer done");
        });

        let consumer_handle = s.spawn(move || {
            let _running = LeaveOnDrop(consumer_running);
            let backoff = Backoff::new();

            while !producer_done.load(Ordering::Acquire) || !consumer.is_empty() {
                if let Some(value) = consumer.pop() {
                    sink.extend(Some(value));

                    backoff.reset();
                } else {
                    backoff.snooze();
                }
            }

            while let Some(value) = consumer.pop() {
                sink.extend(Some(value));
            }

            debug!("SPSC consumer done");

            sink
        });

        let produced = producer_handle.join();
        let consumed = consumer_handle.join();

        produced.map_err(|_| DemoError::ThreadPanicked { role: "producer" })?;

        consumed.map_err(|_| DemoError::ThreadPanicked { role: "consumer" })
    })
}

/// Runs `config.producers` producers and `config.consumers` consumers over one
/// MPMC queue of [`DEMO_CAPACITY`].
///
/// Producer `p` pushes `p * items_per_producer + i` for every
/// `i < items_per_producer`, so every value is unique. Consumers pop until all
/// producers are joined and a done flag is raised, then drain. Every popped
/// value is counted in a seen-table to find duplicates and losses.
pub fn run_mpmc_demo(config: &DemoConfig) -> Result<MpmcReport, DemoError> {
    config.validate()?;

    let expected = config.mpmc_items();
    let items_per_producer = config.items_per_producer;
    let mut seen = reserve_exact::<AtomicU32>("items_per_producer", expected)?;

    seen.extend((0..expected).map(|_| AtomicU32::new(0)));

    let queue = MPMCQueue::<usize, DEMO_CAPACITY>::new();
    let produced = AtomicUsize::new(0);
    let consumed = AtomicUsize::new(0);
    let consumers_running = AtomicUsize::new(config.consumers);
    let done = AtomicBool::new(false);

    info!(
        producers = config.producers,
        consumers = config.consumers,
        items_per_producer,
        capacity = queue.capacity(),
        "starting MPMC demo"
    );

    let start = Instant::now();

    thread::scope(|s| {
        let producer_handles: Vec<_> = (0..config.producers)
            .map(|p| {
                let (queue, produced, consumers_running) = (&queue, &produced, &consumers_running);

                s.spawn(move || {
                    for i in 0..items_per_producer {
                        let backoff = Backoff::new();
                        let mut value = p * items_per_producer + i;

                        while let Err(rejected) = queue.push(value) {
                            if consumers_running.load(Ordering::Acquire) == 0 {
                                warn!(producer = p, pushed = i, "MPMC consumers are gone, producer stops");

                                return;
                            }

                            value = rejected;

                            backoff.snooze();
                        }

                        produced.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        let consumer_handles: Vec<_> = (0..config.consumers)
            .map(|_| {
                let (queue, consumed, consumers_running, done, seen) =
                    (&queue, &consumed, &consumers_running, &done, &seen);

                s.spawn(move || {
                    let _running = LeaveOnDrop(consumers_running);
                    let record = |value: usize| {
                        seen[value].fetch_add(1, Ordering::Relaxed);
                        consumed.fetch_add(1, Ordering::Relaxed);
                    };
                    let backoff = Backoff::new();

                    while !done.load(Ordering::Acquire) {
                        if let Some(value) = queue.pop() {
                            record(value);

                            backoff.reset();
                        } else {
                            backoff.snooze();
                        }
                    }

                    while let Some(value) = queue.pop() {
                        record(value);
                    }
                })
            })
            .collect();

        let mut result = Ok(());

        for handle in producer_handles {
            if handle.join().is_err() {
                result = Err(DemoError::ThreadPanicked { role: "producer" });
            }
        }

        debug!("MPMC producers joined");

        // Consumers exit on this flag, so it is raised even if a producer has panicked.
        done.store(true, Ordering::Release);

        for handle in consumer_handles {
            if handle.join().is_err() && result.is_ok() {
                result = Err(DemoError::ThreadPanicked { role: "consumer" });
            }
        }

        result
    })?;

    let elapsed = start.elapsed();
    let (duplicates, missing) = seen.iter().fold((0, 0), |(duplicates, missing), count| {
        match count.load(Ordering::Relaxed) {
            0 => (duplicates, missing + 1),
            1 => (duplicates, missing),
            _ => (duplicates + 1, missing),
        }
    });
    let report = MpmcReport {
        produced: produced.load(Ordering::Relaxed),
        consumed: consumed.load(Ordering::Relaxed),
        expected,
        duplicates,
        missing,
        elapsed,
    };

    info!(
        produced = report.produced,
        consumed = report.consumed,
        expected = report.expected,
        duplicates = report.duplicates,
        missing = report.missing,
        elapsed_ms = report.elapsed.as_millis(),
        "MPMC demo finished"
    );

    Ok(report)
}
