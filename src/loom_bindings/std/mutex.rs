use std::sync::{self, MutexGuard};

/// Adapter for `std::Mutex` that ignores poisoning.
///
/// Only the test harness locks it: a stress test that panics must not make
/// every following test fail on a poisoned lock.
#[derive(Debug)]
pub struct Mutex<T: ?Sized>(sync::Mutex<T>);

impl<T> Mutex<T> {
    #[inline]
    pub const fn new(t: T) -> Self {
        Self(sync::Mutex::new(t))
    }

    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.0.lock().unwrap_or_else(sync::PoisonError::into_inner)
    }
}
