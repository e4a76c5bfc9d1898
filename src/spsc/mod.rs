//! This module provides the single-producer, single-consumer queue.
//!
//! [`const_bounded`]: a const bounded ring buffer with two atomic cursors.
//! Use [`new_bounded`] (or [`new_unpadded_bounded`]) for split handles, or
//! [`SPSCQueue`] directly.
//!
//! `push` and `pop` are wait-free: each finishes in a bounded number of steps
//! whatever the other thread does.
mod const_bounded;
#[cfg(all(test, not(hpc_ring_loom)))]
mod tests;

pub use const_bounded::*;
