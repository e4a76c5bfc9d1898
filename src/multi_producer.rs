//! This module provides the [`MultiProducer`] and the [`MultiProducerSpawner`] traits.
use crate::Producer;

/// A producer of a multi-producer queue.
///
/// Cloning it gives one more producer of the same queue.
pub trait MultiProducer<T>: Producer<T> + Clone {}

/// Something that can create producers for the queue it is attached to.
pub trait MultiProducerSpawner<T> {
    /// An associated [`MultiProducer`] type.
    type SpawnedProducer: MultiProducer<T>;

    /// Spawns a [`MultiProducer`].
    fn spawn_multi_producer(&self) -> Self::SpawnedProducer;
}
