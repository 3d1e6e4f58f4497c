//! Heap initializer, allocator core, and deallocator core.
//!
//! [`Heap`] owns all process-wide allocator state: the primary region's
//! start block, the segregated free-list index, the mapped-block registry,
//! and the running size/payload counters. Tests and
//! the fragmentation harness each construct their own `Heap` to keep state
//! isolated; [`crate::global`] wraps a single instance as the process-wide
//! singleton behind the public free functions.

use std::ptr::NonNull;

use log::{debug, trace, warn};

use crate::block::{BlockHeader, BlockPtr};
use crate::consts::{
    BLOCK_OVERHEAD, MAX_ALLOCATION_SIZE, METADATA_SIZE, MIN_ALLOCATION_SIZE, PRIMARY_REGION_SIZE,
    round_up,
};
use crate::error::AllocError;
use crate::free_list::FreeListIndex;
use crate::oversize;

/// An opaque handle to a block, returned by the introspection queries.
/// Two handles compare equal iff they refer to the same block.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct BlockRef(pub(crate) BlockPtr);

pub struct Heap {
    /// First usable (non-fencepost) block of the primary region. `None`
    /// until the first successful allocation.
    heap_start: Option<BlockPtr>,
    free_lists: FreeListIndex,
    /// Head of the doubly linked registry of live oversize blocks.
    mapped_blocks: Option<BlockPtr>,
    /// Total bytes ever obtained from the OS (monotonic non-decreasing).
    heap_size: usize,
    /// Sum of payload sizes of all currently live blocks.
    current_payload: usize,
    /// Running maximum of `current_payload`.
    peak_payload: usize,
}

impl Heap {
    pub const fn new() -> Self {
        Self {
            heap_start: None,
            free_lists: FreeListIndex::new(),
            mapped_blocks: None,
            heap_size: 0,
            current_payload: 0,
            peak_payload: 0,
        }
    }

    /// Exclusive upper bound (address) of the primary region's carve space,
    /// i.e. one past the last byte the free-list/allocated blocks may span.
    fn primary_region_end(&self) -> usize {
        let start = self.heap_start.expect("primary region not initialized");
        start.as_ptr() as usize + (PRIMARY_REGION_SIZE - METADATA_SIZE)
    }

    /// Lazily map the 64 MiB primary region and install fenceposts plus the
    /// initial free block. Idempotent; returns `false` if the region is not
    /// (yet) available, either because mapping just failed or failed before.
    fn ensure_primary_region(&mut self) -> bool {
        if self.heap_start.is_some() {
            return true;
        }
        let mem = match unsafe { oversize::mmap_anonymous(PRIMARY_REGION_SIZE) } {
            Ok(mem) => mem,
            Err(err) => {
                warn!("failed to initialize primary heap region: {err}");
                return false;
            }
        };
        unsafe {
            let start_fencepost = NonNull::new_unchecked(mem as *mut BlockHeader);
            BlockHeader::set_size(start_fencepost, 0);
            BlockHeader::set_allocated(start_fencepost, true);
            BlockHeader::set_fencepost(start_fencepost, true);

            let end_fencepost = NonNull::new_unchecked(
                mem.add(PRIMARY_REGION_SIZE - METADATA_SIZE) as *mut BlockHeader
            );
            BlockHeader::set_size(end_fencepost, 0);
            BlockHeader::set_allocated(end_fencepost, true);
            BlockHeader::set_fencepost(end_fencepost, true);

            let initial = NonNull::new_unchecked(mem.add(METADATA_SIZE) as *mut BlockHeader);
            let initial_size = PRIMARY_REGION_SIZE - 2 * METADATA_SIZE;
            BlockHeader::set_size(initial, initial_size);
            BlockHeader::set_allocated(initial, false);
            BlockHeader::write_footer(initial);

            self.free_lists.add(initial);
            self.heap_start = Some(initial);
        }
        self.heap_size += PRIMARY_REGION_SIZE;
        debug!("primary heap region mapped: {PRIMARY_REGION_SIZE} bytes");
        true
    }

    fn record_allocation(&mut self, payload_size: usize) {
        self.current_payload += payload_size;
        if self.current_payload > self.peak_payload {
            self.peak_payload = self.current_payload;
        }
    }

    /// Split `winner` at `target_size` if the remainder is large enough to
    /// hold its own header/footer and at least one word of payload; the
    /// tail is reinserted into the free-list index. `winner`'s size is
    /// updated to `target_size` either way.
    unsafe fn maybe_split(&mut self, winner: BlockPtr, target_size: usize) {
        unsafe {
            let winner_size = BlockHeader::size(winner);
            let leftover = winner_size - target_size;
            if leftover >= BLOCK_OVERHEAD + MIN_ALLOCATION_SIZE {
                let tail = NonNull::new_unchecked(
                    (winner.as_ptr() as *mut u8).add(target_size) as *mut BlockHeader
                );
                BlockHeader::set_size(tail, leftover);
                BlockHeader::set_allocated(tail, false);
                BlockHeader::set_fencepost(tail, false);
                BlockHeader::set_mapped(tail, false);
                BlockHeader::write_footer(tail);
                self.free_lists.add(tail);
                BlockHeader::set_size(winner, target_size);
            }
        }
    }

    /// Service a single allocation request.
    pub fn alloc(&mut self, request: usize) -> Option<NonNull<u8>> {
        if request == 0 {
            trace!("rejecting allocation: {}", AllocError::ZeroSize);
            return None;
        }
        if request > MAX_ALLOCATION_SIZE {
            trace!("rejecting allocation: {}", AllocError::TooLarge(request));
            return None;
        }
        if !self.ensure_primary_region() {
            return None;
        }

        let block_size = round_up(request + BLOCK_OVERHEAD);
        let carve_capacity = PRIMARY_REGION_SIZE - 2 * METADATA_SIZE;

        if block_size > carve_capacity {
            return self.alloc_oversize(block_size);
        }

        let winner = unsafe { self.free_lists.find_best_fit(block_size) };
        let Some(winner) = winner else {
            trace!("rejecting allocation: {}", AllocError::Exhausted);
            return None;
        };

        unsafe {
            self.free_lists.remove(winner);
            self.maybe_split(winner, block_size);
            BlockHeader::set_allocated(winner, true);
            BlockHeader::write_footer(winner);
            self.record_allocation(BlockHeader::payload_size(winner));
            Some(BlockHeader::payload_ptr(winner))
        }
    }

    /// Map a dedicated OS region for a request too large for the primary
    /// region.
    fn alloc_oversize(&mut self, block_size: usize) -> Option<NonNull<u8>> {
        let mmap_size = block_size + 2 * METADATA_SIZE;
        let mem = match unsafe { oversize::mmap_anonymous(mmap_size) } {
            Ok(mem) => mem,
            Err(err) => {
                warn!("failed to map oversize allocation: {err}");
                return None;
            }
        };
        let middle = unsafe { oversize::install_mapped_block(mem, mmap_size, block_size) };
        unsafe {
            let old_head = self.mapped_blocks;
            BlockHeader::set_free_next(middle, old_head);
            BlockHeader::set_free_prev(middle, None);
            if let Some(head) = old_head {
                BlockHeader::set_free_prev(head, Some(middle));
            }
            self.mapped_blocks = Some(middle);
        }
        self.heap_size += mmap_size;
        debug!("oversize region mapped: {mmap_size} bytes");
        unsafe {
            self.record_allocation(BlockHeader::payload_size(middle));
            Some(BlockHeader::payload_ptr(middle))
        }
    }

    fn is_in_primary_region(&self, b: BlockPtr) -> bool {
        match self.heap_start {
            None => false,
            Some(start) => {
                let addr = b.as_ptr() as usize;
                addr >= start.as_ptr() as usize && addr < self.primary_region_end()
            }
        }
    }

    fn is_in_mapped_registry(&self, b: BlockPtr) -> bool {
        let mut current = self.mapped_blocks;
        while let Some(node) = current {
            if node == b {
                return true;
            }
            current = unsafe { BlockHeader::free_next(node) };
        }
        false
    }

    unsafe fn remove_mapped(&mut self, b: BlockPtr) {
        unsafe {
            let prev = BlockHeader::free_prev(b);
            let next = BlockHeader::free_next(b);
            match prev {
                Some(p) => BlockHeader::set_free_next(p, next),
                None => self.mapped_blocks = next,
            }
            if let Some(n) = next {
                BlockHeader::set_free_prev(n, prev);
            }
        }
    }

    /// Release a previously allocated block. Silent no-op on any invalid,
    /// unaligned, out-of-heap, or already-free pointer.
    pub fn free(&mut self, ptr: Option<NonNull<u8>>) {
        let Some(ptr) = ptr else {
            return;
        };

        let block = unsafe { BlockHeader::from_payload_ptr(ptr) };
        if (block.as_ptr() as usize) % crate::consts::ALIGNMENT != 0 {
            warn!("free: misaligned pointer rejected");
            return;
        }

        if !self.is_in_primary_region(block) && !self.is_in_mapped_registry(block) {
            warn!("free: pointer is not a live allocation, ignoring");
            return;
        }

        unsafe {
            if !BlockHeader::is_allocated(block) {
                warn!("free: double free ignored");
                return;
            }

            BlockHeader::set_allocated(block, false);
            BlockHeader::write_footer(block);
            self.current_payload -= BlockHeader::payload_size(block);

            if BlockHeader::is_mapped(block) {
                self.free_mapped(block);
            } else {
                self.free_primary(block);
            }
        }
    }

    unsafe fn free_mapped(&mut self, block: BlockPtr) {
        unsafe {
            self.remove_mapped(block);
            let mmap_size = BlockHeader::size(block) + 2 * METADATA_SIZE;
            let mem = (block.as_ptr() as *mut u8).sub(METADATA_SIZE);
            oversize::munmap_region(mem, mmap_size);
        }
    }

    unsafe fn free_primary(&mut self, block: BlockPtr) {
        unsafe {
            let mut block = block;

            if let Some(next) = BlockHeader::next(block) {
                if !BlockHeader::is_allocated(next) && !BlockHeader::is_fencepost(next) {
                    self.free_lists.remove(next);
                    let merged = BlockHeader::size(block) + BlockHeader::size(next);
                    BlockHeader::set_size(block, merged);
                    BlockHeader::write_footer(block);
                }
            }

            if let Some(prev) = BlockHeader::prev(block) {
                if !BlockHeader::is_allocated(prev) && !BlockHeader::is_fencepost(prev) {
                    self.free_lists.remove(prev);
                    let merged = BlockHeader::size(prev) + BlockHeader::size(block);
                    BlockHeader::set_size(prev, merged);
                    BlockHeader::write_footer(prev);
                    block = prev;
                }
            }

            self.free_lists.add(block);
        }
    }

    // ---- Introspection: pure observers, no allocator state mutation ----

    pub fn is_free(&self, block: BlockRef) -> bool {
        unsafe { !BlockHeader::is_allocated(block.0) }
    }

    pub fn block_size(&self, block: BlockRef) -> usize {
        unsafe { BlockHeader::size(block.0) }
    }

    pub fn get_start_block(&self) -> Option<BlockRef> {
        self.heap_start.map(BlockRef)
    }

    pub fn get_next_block(&self, block: BlockRef) -> Option<BlockRef> {
        unsafe { BlockHeader::next(block.0).map(BlockRef) }
    }

    pub fn get_prev_block(&self, block: BlockRef) -> Option<BlockRef> {
        unsafe { BlockHeader::prev(block.0).map(BlockRef) }
    }

    pub fn ptr_to_block(&self, ptr: NonNull<u8>) -> BlockRef {
        BlockRef(unsafe { BlockHeader::from_payload_ptr(ptr) })
    }

    pub fn get_peak_memory_usage(&self) -> usize {
        self.peak_payload
    }

    pub fn get_heap_size(&self) -> usize {
        self.heap_size
    }

    pub fn current_payload(&self) -> usize {
        self.current_payload
    }

    /// Test-only: the number of blocks currently linked into `class`'s list.
    #[cfg(test)]
    fn free_list_len(&self, class: usize) -> usize {
        self.free_lists.len(class)
    }
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_alloc_free_s1() {
        let mut heap = Heap::new();
        let p = heap.alloc(8).expect("alloc(8) should succeed");
        assert_eq!((p.as_ptr() as usize) % crate::consts::ALIGNMENT, 0);
        let block = heap.ptr_to_block(p);
        assert_eq!(
            heap.block_size(block),
            round_up(8 + BLOCK_OVERHEAD)
        );
        heap.free(Some(p));
        assert_eq!(heap.current_payload(), 0);
        let start = heap.get_start_block().unwrap();
        assert!(heap.is_free(start));
        assert_eq!(heap.block_size(start), PRIMARY_REGION_SIZE - 2 * METADATA_SIZE);
    }

    #[test]
    fn split_and_merge_s2() {
        let mut heap = Heap::new();
        let a = heap.alloc(16).unwrap();
        let _b = heap.alloc(16).unwrap();
        let a_block_size = round_up(16 + BLOCK_OVERHEAD);
        heap.free(Some(a));
        let start = heap.get_start_block().unwrap();
        assert!(heap.is_free(start));
        assert_eq!(heap.block_size(start), a_block_size);
        heap.free(Some(_b));
        let start = heap.get_start_block().unwrap();
        assert_eq!(heap.block_size(start), PRIMARY_REGION_SIZE - 2 * METADATA_SIZE);
    }

    #[test]
    fn best_fit_prefers_freed_hole_s3() {
        let mut heap = Heap::new();
        let a = heap.alloc(1024).unwrap();
        let b = heap.alloc(32).unwrap();
        let _c = heap.alloc(1024).unwrap();
        heap.free(Some(b));
        let d = heap.alloc(24).unwrap();
        // The 32-byte hole should be reused rather than carving the large tail.
        let a_addr = a.as_ptr() as usize;
        let b_addr = b.as_ptr() as usize;
        let d_addr = d.as_ptr() as usize;
        assert_eq!(d_addr, b_addr);
        assert!(d_addr > a_addr);
    }

    #[test]
    fn invalid_free_is_a_noop_s5() {
        let mut heap = Heap::new();
        let p = heap.alloc(64).unwrap();
        let before = heap.current_payload();

        let bogus = unsafe { NonNull::new_unchecked((p.as_ptr() as usize + 4) as *mut u8) };
        heap.free(Some(bogus));
        assert_eq!(heap.current_payload(), before);

        heap.free(Some(p));
        let after_first_free = heap.current_payload();
        heap.free(Some(p));
        assert_eq!(heap.current_payload(), after_first_free);
    }

    #[test]
    fn zero_and_oversized_requests_are_rejected() {
        let mut heap = Heap::new();
        assert!(heap.alloc(0).is_none());
        assert!(heap.alloc(MAX_ALLOCATION_SIZE + 1).is_none());
    }

    #[test]
    fn freed_block_is_in_exactly_its_size_class_s3() {
        use crate::free_list::class_index;

        let mut heap = Heap::new();
        let p = heap.alloc(64).unwrap();
        heap.free(Some(p));

        let start = heap.get_start_block().unwrap();
        let class = class_index(heap.block_size(start));
        assert_eq!(heap.free_list_len(class), 1);
        for other in 0..crate::consts::NUM_FREE_LIST_CLASSES {
            if other != class {
                assert_eq!(heap.free_list_len(other), 0);
            }
        }
    }

    #[test]
    fn peak_payload_is_non_decreasing_across_shrink_and_regrow() {
        let mut heap = Heap::new();
        let a = heap.alloc(4096).unwrap();
        let peak_after_a = heap.get_peak_memory_usage();
        heap.free(Some(a));
        assert_eq!(heap.get_peak_memory_usage(), peak_after_a, "peak must not drop on free");

        let _b = heap.alloc(64).unwrap();
        assert_eq!(
            heap.get_peak_memory_usage(),
            peak_after_a,
            "peak must not drop below a prior high-water mark"
        );
        assert!(heap.get_peak_memory_usage() >= heap.current_payload());
    }

    #[test]
    fn current_payload_tracks_both_primary_and_mapped_allocations() {
        let mut heap = Heap::new();
        let small = heap.alloc(64).unwrap();
        let huge = heap.alloc(100 << 20).unwrap();

        let small_payload = heap.block_size(heap.ptr_to_block(small)) - BLOCK_OVERHEAD;
        let huge_payload = heap.block_size(heap.ptr_to_block(huge)) - BLOCK_OVERHEAD;
        assert_eq!(heap.current_payload(), small_payload + huge_payload);

        heap.free(Some(small));
        assert_eq!(heap.current_payload(), huge_payload);
        heap.free(Some(huge));
        assert_eq!(heap.current_payload(), 0);
    }

    #[test]
    fn heap_size_is_monotonic() {
        let mut heap = Heap::new();
        let before = heap.get_heap_size();
        let p = heap.alloc(100 << 20);
        assert!(p.is_some());
        let after = heap.get_heap_size();
        assert!(after >= before + (100 << 20));
        heap.free(p);
        assert_eq!(heap.get_heap_size(), after);
    }
}
