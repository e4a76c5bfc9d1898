//! Bounded lock-free queues for passing values between threads.
//!
//! - [`spsc`]: one producer thread and one consumer thread; wait-free `push` and `pop`.
//! - [`mpmc`]: any number of producers and consumers; lock-free `push` and `pop`.
//!
//! Both queues have a capacity fixed at compile time (a power of two), never
//! allocate after construction and never block: `push` returns the value back
//! in `Err` when the queue is full and `pop` returns `None` when it is empty.
//! Callers that want to wait can retry with a [`Backoff`].
//!
//! The [`demo`] module runs both queues under real threads and checks that no
//! value is lost, duplicated or reordered.
#![deny(clippy::all)]
#![deny(clippy::assertions_on_result_states)]
#![deny(clippy::match_wild_err_arm)]
#![deny(clippy::allow_attributes_without_reason)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::cargo)]
#![allow(
    clippy::missing_const_for_fn,
    reason = "Since we cannot make a constant function non-constant after its release,
    we need to look for a reason to make it constant, and not vice versa."
)]
#![allow(clippy::inline_always, reason = "We write highly optimized code.")]
#![allow(
    clippy::must_use_candidate,
    reason = "It is better to developer think about it."
)]
#![allow(
    clippy::module_name_repetitions,
    reason = "This is acceptable most of the time."
)]
#![allow(
    clippy::missing_errors_doc,
    reason = "Unless the error is something special,
    the developer should document it."
)]
#![allow(clippy::redundant_pub_crate, reason = "It improves readability.")]
#![allow(clippy::struct_field_names, reason = "It improves readability.")]
#![allow(clippy::if_not_else, reason = "It improves readability.")]
#![allow(
    rustdoc::private_intra_doc_links,
    reason = "It allows to create more readable docs."
)]
pub mod backoff;
pub mod cache_padded;
pub mod capacity;
mod consumer;
pub mod demo;
pub mod error;
pub mod hints;
pub mod light_arc;
#[cfg(all(hpc_ring_loom, test))]
mod loom;
pub mod loom_bindings;
pub mod mpmc;
pub mod multi_consumer;
pub mod multi_producer;
mod producer;
pub mod spsc;
#[cfg(all(test, not(hpc_ring_loom)))]
mod test_lock;

pub use backoff::Backoff;
pub use consumer::Consumer;
pub use light_arc::LightArc;
pub use multi_consumer::{MultiConsumer, MultiConsumerSpawner};
pub use multi_producer::{MultiProducer, MultiProducerSpawner};
pub use producer::Producer;
