//! Provides cache-padded and plain atomic cursors.
//!
//! Each hot cursor of a ring (`head`/`tail`, `enqueue_pos`/`dequeue_pos`) is
//! written by a different side of the queue. Keeping them on separate cache
//! lines prevents false sharing between producers and consumers. Padding is a
//! performance property only; both cursor types behave identically.
use crate::loom_bindings::sync::atomic::AtomicUsize;
use std::fmt;
use std::ops::Deref;

#[cfg(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "arm64ec",
    target_arch = "powerpc64",
))]
/// The cache-line size the padded cursors are aligned to.
pub const CACHE_LINE_SIZE: usize = 128;

#[cfg(any(
    target_arch = "arm",
    target_arch = "mips",
    target_arch = "mips32r6",
    target_arch = "mips64",
    target_arch = "mips64r6",
    target_arch = "sparc",
    target_arch = "hexagon",
))]
/// The cache-line size the padded cursors are aligned to.
pub const CACHE_LINE_SIZE: usize = 32;

#[cfg(target_arch = "m68k")]
/// The cache-line size the padded cursors are aligned to.
pub const CACHE_LINE_SIZE: usize = 16;

#[cfg(target_arch = "s390x")]
/// The cache-line size the padded cursors are aligned to.
pub const CACHE_LINE_SIZE: usize = 256;

#[cfg(not(any(
    target_arch = "x86_64",
    target_arch = "aarch64",
    target_arch = "arm64ec",
    target_arch = "powerpc64",
    target_arch = "arm",
    target_arch = "mips",
    target_arch = "mips32r6",
    target_arch = "mips64",
    target_arch = "mips64r6",
    target_arch = "sparc",
    target_arch = "hexagon",
    target_arch = "m68k",
    target_arch = "s390x",
)))]
/// The cache-line size the padded cursors are aligned to.
pub const CACHE_LINE_SIZE: usize = 64;

/// A ring cursor: an [`AtomicUsize`] that can be created with [`Default`].
///
/// The queues are generic over it, so the same ring code runs with
/// [`CachePaddedAtomicUsize`] or [`NotCachePaddedAtomicUsize`].
pub trait AtomicCursor: Deref<Target = AtomicUsize> + Default {}

impl<C: Deref<Target = AtomicUsize> + Default> AtomicCursor for C {}

/// Cache-padded [`AtomicUsize`]. Can be dereferenced to the inner atomic.
///
/// It occupies and is aligned to a whole [`CACHE_LINE_SIZE`].
#[cfg_attr(
    any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "arm64ec",
        target_arch = "powerpc64",
    ),
    repr(C, align(128))
)]
#[cfg_attr(
    any(
        target_arch = "arm",
        target_arch = "mips",
        target_arch = "mips32r6",
        target_arch = "mips64",
        target_arch = "mips64r6",
        target_arch = "sparc",
        target_arch = "hexagon",
    ),
    repr(C, align(32))
)]
#[cfg_attr(target_arch = "m68k", repr(C, align(16)))]
#[cfg_attr(target_arch = "s390x", repr(C, align(256)))]
#[cfg_attr(
    not(any(
        target_arch = "x86_64",
        target_arch = "aarch64",
        target_arch = "arm64ec",
        target_arch = "powerpc64",
        target_arch = "arm",
        target_arch = "mips",
        target_arch = "mips32r6",
        target_arch = "mips64",
        target_arch = "mips64r6",
        target_arch = "sparc",
        target_arch = "hexagon",
        target_arch = "m68k",
        target_arch = "s390x",
    )),
    repr(C, align(64))
)]
pub struct CachePaddedAtomicUsize {
    atomic: AtomicUsize,
}

impl CachePaddedAtomicUsize {
    /// Creates a new cache-padded cursor with the given value.
    pub fn new(value: usize) -> Self {
        Self {
            atomic: AtomicUsize::new(value),
        }
    }
}

impl Deref for CachePaddedAtomicUsize {
    type Target = AtomicUsize;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.atomic
    }
}

impl Default for CachePaddedAtomicUsize {
    fn default() -> Self {
        Self::new(0)
    }
}

impl fmt::Debug for CachePaddedAtomicUsize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CachePaddedAtomicUsize")
            .field(&self.atomic)
            .finish()
    }
}

/// Not cache-padded [`AtomicUsize`].
///
/// Neighbouring cursors may share a cache line. Useful to measure what the
/// padding buys, or when memory matters more than throughput.
#[derive(Debug, Default)]
pub struct NotCachePaddedAtomicUsize(AtomicUsize);

impl NotCachePaddedAtomicUsize {
    /// Creates a new cursor with the given value.
    pub fn new(value: usize) -> Self {
        Self(AtomicUsize::new(value))
    }
}

impl Deref for NotCachePaddedAtomicUsize {
    type Target = AtomicUsize;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
