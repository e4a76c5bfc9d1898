//! Capacity checks shared by the rings.
//!
//! Both rings index their slots with `position & mask`, which is only a
//! correct modulo when the capacity is a power of two.

/// Returns the index mask (`capacity - 1`) for a ring of `capacity` slots.
///
/// Used in a `const` item it turns an invalid capacity into a build error of
/// the offending instantiation, so the rings never round silently.
///
/// # Examples
///
/// A capacity that is not a power of two doesn't build:
///
/// ```compile_fail
/// use hpc_ring::spsc::SPSCQueue;
///
/// let queue = SPSCQueue::<u8, 3>::new();
/// ```
///
/// Neither does a single-slot ring:
///
/// ```compile_fail
/// use hpc_ring::mpmc::MPMCQueue;
///
/// let queue = MPMCQueue::<u8, 1>::new();
/// ```
///
/// Valid capacities build as usual:
///
/// ```
/// use hpc_ring::capacity::mask_for;
/// use hpc_ring::mpmc::MPMCQueue;
///
/// const MASK: usize = mask_for(8);
///
/// assert_eq!(MASK, 7);
/// assert_eq!(MPMCQueue::<u8, 8>::new().capacity(), 8);
/// ```
///
/// # Panics
///
/// If `capacity` is less than 2 or not a power of two.
pub const fn mask_for(capacity: usize) -> usize {
    assert!(capacity >= 2, "ring capacity must be at least 2");
    assert!(
        capacity.is_power_of_two(),
        "ring capacity must be a power of two"
    );

    capacity - 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_for_powers_of_two() {
        assert_eq!(mask_for(2), 1);
        assert_eq!(mask_for(64), 63);
        assert_eq!(mask_for(1024), 1023);
        assert_eq!(mask_for(1 << 20), (1 << 20) - 1);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_mask_for_rejects_non_power_of_two() {
        let capacity = std::hint::black_box(100);

        mask_for(capacity);
    }

    #[test]
    #[should_panic(expected = "at least 2")]
    fn test_mask_for_rejects_single_slot() {
        let capacity = std::hint::black_box(1);

        mask_for(capacity);
    }
}
