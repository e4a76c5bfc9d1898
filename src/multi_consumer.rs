//! This module provides the [`MultiConsumer`] and the [`MultiConsumerSpawner`] traits.
use crate::Consumer;

/// A consumer of a multi-consumer queue.
///
/// Cloning it gives one more consumer of the same queue.
pub trait MultiConsumer<T>: Consumer<T> + Clone {}

/// Something that can create consumers for the queue it is attached to.
pub trait MultiConsumerSpawner<T> {
    /// An associated [`MultiConsumer`] type.
    type SpawnedConsumer: MultiConsumer<T>;

    /// Spawns a [`MultiConsumer`].
    fn spawn_multi_consumer(&self) -> Self::SpawnedConsumer;
}
