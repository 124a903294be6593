//! Per-context allocation hooks, rather than a process-global allocator.
//!
//! Scoping the allocator to a [`Context`](crate::context::Context) instead
//! of the process lets embedders route this crate's allocations through
//! their own arena or tracking allocator. Every owning type that needs to
//! route allocation through the configured hooks takes an `Arc<dyn
//! Allocator>`.

use std::alloc::{GlobalAlloc, Layout, System};
use std::ptr::NonNull;

/// A bundle of allocation hooks: allocate, zero-allocate, reallocate,
/// release.
///
/// Zero-sized requests return a dangling, non-null sentinel rather than
/// `None`, applied uniformly across all four operations.
pub trait Allocator: Send + Sync {
    fn alloc(&self, layout: Layout) -> NonNull<u8>;
    fn alloc_zeroed(&self, layout: Layout) -> NonNull<u8>;
    /// # Safety
    /// `ptr` must have been allocated by this allocator with `old_layout`.
    unsafe fn realloc(&self, ptr: NonNull<u8>, old_layout: Layout, new_size: usize)
        -> NonNull<u8>;
    /// # Safety
    /// `ptr` must have been allocated by this allocator with `layout`.
    unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Default allocator: wraps the platform heap via [`std::alloc::System`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl Allocator for SystemAllocator {
    fn alloc(&self, layout: Layout) -> NonNull<u8> {
        if layout.size() == 0 {
            return NonNull::dangling();
        }
        // SAFETY: layout has nonzero size.
        match NonNull::new(unsafe { System.alloc(layout) }) {
            Some(p) => p,
            None => std::alloc::handle_alloc_error(layout),
        }
    }

    fn alloc_zeroed(&self, layout: Layout) -> NonNull<u8> {
        if layout.size() == 0 {
            return NonNull::dangling();
        }
        match NonNull::new(unsafe { System.alloc_zeroed(layout) }) {
            Some(p) => p,
            None => std::alloc::handle_alloc_error(layout),
        }
    }

    unsafe fn realloc(
        &self,
        ptr: NonNull<u8>,
        old_layout: Layout,
        new_size: usize,
    ) -> NonNull<u8> {
        if old_layout.size() == 0 {
            return self.alloc(Layout::from_size_align(new_size, old_layout.align()).unwrap());
        }
        if new_size == 0 {
            self.dealloc(ptr, old_layout);
            return NonNull::dangling();
        }
        let raw = System.realloc(ptr.as_ptr(), old_layout, new_size);
        match NonNull::new(raw) {
            Some(p) => p,
            None => std::alloc::handle_alloc_error(
                Layout::from_size_align(new_size, old_layout.align()).unwrap(),
            ),
        }
    }

    unsafe fn dealloc(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        System.dealloc(ptr.as_ptr(), layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_sized_alloc_is_a_sentinel_not_null() {
        let alloc = SystemAllocator;
        let layout = Layout::from_size_align(0, 1).unwrap();
        let p = alloc.alloc(layout);
        assert!(!p.as_ptr().is_null());
    }

    #[test]
    fn alloc_realloc_dealloc_roundtrip() {
        let alloc = SystemAllocator;
        let layout = Layout::from_size_align(4, 1).unwrap();
        let p = alloc.alloc(layout);
        unsafe {
            p.as_ptr().write_bytes(0xAB, 4);
            let grown = alloc.realloc(p, layout, 8);
            assert_eq!(*grown.as_ptr(), 0xAB);
            alloc.dealloc(grown, Layout::from_size_align(8, 1).unwrap());
        }
    }
}
