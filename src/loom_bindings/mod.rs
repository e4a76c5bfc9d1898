//! Switches the queues between `std` and `loom` primitives.
//!
//! Normal builds use `std`. Building with `RUSTFLAGS="--cfg hpc_ring_loom"`
//! replaces atomics, threads and spin hints with their `loom` models so the
//! ring protocols can be checked exhaustively.

#![allow(unused, reason = "Each build uses only a part of the bindings.")]

#[cfg(not(hpc_ring_loom))]
mod std;
#[cfg(not(hpc_ring_loom))]
pub use self::std::*;

#[cfg(hpc_ring_loom)]
mod mocked;
#[cfg(hpc_ring_loom)]
pub use self::mocked::*;
