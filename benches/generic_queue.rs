use hpc_ring::{mpmc, spsc, Consumer, LightArc, Producer};

/// A bounded queue that can be benchmarked from one or two threads.
pub trait GenericQueue<T>: Send + 'static {
    type Producer: Send + 'static;
    type Consumer: Send + 'static;

    fn split() -> (Self::Producer, Self::Consumer);
    fn push(producer: &Self::Producer, item: T) -> Result<(), T>;
    fn pop(consumer: &Self::Consumer) -> Option<T>;
}

macro_rules! impl_generic_queue_for_handles {
    ($name:ident, $new_fn:path, $producer:ty, $consumer:ty) => {
        pub struct $name<T, const CAPACITY: usize>(std::marker::PhantomData<T>);

        impl<T: Send + 'static, const CAPACITY: usize> GenericQueue<T> for $name<T, CAPACITY> {
            type Producer = $producer;
            type Consumer = $consumer;

            fn split() -> (Self::Producer, Self::Consumer) {
                $new_fn()
            }

            fn push(producer: &Self::Producer, item: T) -> Result<(), T> {
                Producer::push(producer, item)
            }

            fn pop(consumer: &Self::Consumer) -> Option<T> {
                Consumer::pop(consumer)
            }
        }
    };
}

impl_generic_queue_for_handles!(
    PaddedSpsc,
    spsc::new_bounded,
    spsc::SPSCProducer<T, CAPACITY>,
    spsc::SPSCConsumer<T, CAPACITY>
);

impl_generic_queue_for_handles!(
    UnpaddedSpsc,
    spsc::new_unpadded_bounded,
    spsc::UnpaddedSPSCProducer<T, CAPACITY>,
    spsc::UnpaddedSPSCConsumer<T, CAPACITY>
);

impl_generic_queue_for_handles!(
    PaddedMpmc,
    mpmc::new_bounded,
    mpmc::MPMCProducer<T, CAPACITY>,
    mpmc::MPMCConsumer<T, CAPACITY>
);

impl_generic_queue_for_handles!(
    UnpaddedMpmc,
    mpmc::new_unpadded_bounded,
    mpmc::UnpaddedMPMCProducer<T, CAPACITY>,
    mpmc::UnpaddedMPMCConsumer<T, CAPACITY>
);

// region crossbeam

pub struct CrossbeamArrayQueue<T, const CAPACITY: usize>(std::marker::PhantomData<T>);

impl<T: Send + 'static, const CAPACITY: usize> GenericQueue<T>
    for CrossbeamArrayQueue<T, CAPACITY>
{
    type Producer = LightArc<crossbeam_queue::ArrayQueue<T>>;
    type Consumer = LightArc<crossbeam_queue::ArrayQueue<T>>;

    fn split() -> (Self::Producer, Self::Consumer) {
        let queue = LightArc::new(crossbeam_queue::ArrayQueue::new(CAPACITY));

        (queue.clone(), queue)
    }

    fn push(producer: &Self::Producer, item: T) -> Result<(), T> {
        crossbeam_queue::ArrayQueue::push(producer, item)
    }

    fn pop(consumer: &Self::Consumer) -> Option<T> {
        crossbeam_queue::ArrayQueue::pop(consumer)
    }
}

// endregion
