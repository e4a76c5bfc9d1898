//! This module provides the [`DemoError`] returned by the [`demo`](crate::demo) harness.
//!
//! The queues themselves have no error type: a full queue hands the value back
//! in `Err` and an empty queue returns `None`.
use thiserror::Error;

/// Errors that can occur when configuring or running a demo.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DemoError {
    /// A configuration field is missing a usable value.
    #[error("invalid demo config: {field} {reason}")]
    InvalidConfig {
        /// The name of the field (or of the environment variable).
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// The SPSC consumer has received a value out of order.
    #[error("FIFO order violated at index {index}: expected {expected}, got {actual}")]
    FifoViolation {
        /// The position in the received sequence.
        index: usize,
        /// The value that should have been at `index`.
        expected: usize,
        /// The value that has been received at `index`.
        actual: usize,
    },
    /// The number of popped values differs from the number of pushed values.
    #[error("{queue} count mismatch: expected {expected}, got {actual} ({missing} missing)")]
    CountMismatch {
        /// `"spsc"` or `"mpmc"`.
        queue: &'static str,
        /// How many values have been pushed.
        expected: usize,
        /// How many values have been popped.
        actual: usize,
        /// How many distinct pushed values have never been popped.
        missing: usize,
    },
    /// Some values have been popped more than once.
    #[error("{count} values have been popped more than once")]
    Duplicates {
        /// How many distinct values have been seen more than once.
        count: usize,
    },
    /// A producer or consumer thread has panicked.
    #[error("{role} thread panicked")]
    ThreadPanicked {
        /// `"producer"` or `"consumer"`.
        role: &'static str,
    },
}
