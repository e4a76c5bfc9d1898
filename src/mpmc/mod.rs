//! This module provides the multi-producer, multi-consumer queue.
//!
//! [`const_bounded`]: a const bounded ring buffer with a sequence number per slot.
//! Use [`new_bounded`] (or [`new_unpadded_bounded`]) for cloneable handles,
//! or [`MPMCQueue`] directly.
mod const_bounded;

pub use const_bounded::*;
