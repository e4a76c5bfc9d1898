//! This module provides [`LightArc`], the shared owner behind split queue handles.
use crate::hints::unlikely;
use crate::loom_bindings::sync::atomic::{fence, AtomicUsize};
use std::alloc::{dealloc, Layout};
use std::ptr;
use std::ptr::NonNull;
use std::sync::atomic::Ordering;

#[repr(C)]
struct LightArcInner<T> {
    ref_count: AtomicUsize,
    value: T,
}

/// A light-weight reference-counted pointer to a queue.
///
/// Like [`Arc`](std::sync::Arc), but it keeps only a strong count, so it
/// can't provide weak references. The producer and consumer handles of a
/// queue each hold one; the ring is dropped with the last handle.
#[repr(C)]
pub struct LightArc<T> {
    inner: NonNull<LightArcInner<T>>,
}

impl<T> LightArc<T> {
    /// Creates a new [`LightArc`] from the given value.
    pub fn new(value: T) -> Self {
        let inner = Box::new(LightArcInner {
            ref_count: AtomicUsize::new(1),
            value,
        });

        Self {
            inner: NonNull::from(Box::leak(inner)),
        }
    }

    /// Returns `true` if both pointers point to the same allocation.
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        this.inner == other.inner
    }

    fn inner(&self) -> &LightArcInner<T> {
        unsafe { self.inner.as_ref() }
    }

    /// Drops and deallocates the inner value.
    ///
    /// # Safety
    ///
    /// This function must only be called when the reference count is 0.
    #[inline(never)]
    unsafe fn drop_slow(&mut self) {
        fence(Ordering::Acquire);

        unsafe {
            ptr::drop_in_place(self.inner.as_ptr());

            dealloc(
                self.inner.as_ptr().cast(),
                Layout::new::<LightArcInner<T>>(),
            );
        }
    }
}

impl<T> Clone for LightArc<T> {
    fn clone(&self) -> Self {
        let count = self.inner().ref_count.fetch_add(1, Ordering::Relaxed);

        debug_assert!(count > 0, "use after free");

        Self { inner: self.inner }
    }
}

impl<T> Drop for LightArc<T> {
    fn drop(&mut self) {
        if unlikely(self.inner().ref_count.fetch_sub(1, Ordering::Release) == 1) {
            unsafe { self.drop_slow() };
        }
    }
}

impl<T> std::ops::Deref for LightArc<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner().value
    }
}

unsafe impl<T: Send + Sync> Send for LightArc<T> {}
unsafe impl<T: Send + Sync> Sync for LightArc<T> {}
