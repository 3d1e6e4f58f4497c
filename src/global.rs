//! Process-wide allocator singleton and free-function API.
//!
//! The shared allocator state lives in one lazily-initialized [`Heap`] value
//! behind [`Locked`]. This module is the only place that touches the
//! singleton; everything else operates on an explicit `&mut Heap` so tests
//! and the fragmentation harness can construct independent instances.

use std::alloc::{GlobalAlloc, Layout};
use std::ptr::NonNull;

use crate::heap::{BlockRef, Heap};
use crate::locked::Locked;

static GLOBAL: Locked<Heap> = Locked::new(Heap::new());

/// See [`Heap::alloc`].
pub fn alloc(request: usize) -> Option<NonNull<u8>> {
    GLOBAL.lock().alloc(request)
}

/// See [`Heap::free`].
pub fn free(ptr: Option<NonNull<u8>>) {
    GLOBAL.lock().free(ptr);
}

pub fn is_free(block: BlockRef) -> bool {
    GLOBAL.lock().is_free(block)
}

pub fn block_size(block: BlockRef) -> usize {
    GLOBAL.lock().block_size(block)
}

pub fn get_start_block() -> Option<BlockRef> {
    GLOBAL.lock().get_start_block()
}

pub fn get_next_block(block: BlockRef) -> Option<BlockRef> {
    GLOBAL.lock().get_next_block(block)
}

pub fn get_prev_block(block: BlockRef) -> Option<BlockRef> {
    GLOBAL.lock().get_prev_block(block)
}

pub fn ptr_to_block(ptr: NonNull<u8>) -> BlockRef {
    GLOBAL.lock().ptr_to_block(ptr)
}

pub fn get_peak_memory_usage() -> usize {
    GLOBAL.lock().get_peak_memory_usage()
}

pub fn get_heap_size() -> usize {
    GLOBAL.lock().get_heap_size()
}

/// Adapter exposing the global singleton as a `#[global_allocator]`.
///
/// Realignment beyond one machine word is out of scope: requests whose
/// `Layout::align()` exceeds the allocator's word alignment are served at
/// word alignment regardless — callers that need a stronger guarantee
/// should not route through this adapter.
pub struct SegAlloc;

unsafe impl GlobalAlloc for SegAlloc {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        match GLOBAL.lock().alloc(layout.size()) {
            Some(ptr) => ptr.as_ptr(),
            None => std::ptr::null_mut(),
        }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: Layout) {
        GLOBAL.lock().free(NonNull::new(ptr));
    }
}
