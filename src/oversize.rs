//! Direct-mapped (oversize) path.
//!
//! Triggered when a single request would not fit in an *empty* primary
//! region. Each oversize allocation gets its own anonymous OS mapping,
//! bracketed by its own fenceposts, with a single allocated middle block
//! flagged `ALLOCATED | MAPPED`. A mapped block is never split, never
//! coalesced, and never linked into the free-list index — its only purpose
//! is registry-based validation on `free`.

use std::io;
use std::ptr::NonNull;

use crate::block::{BlockHeader, BlockPtr};
use crate::consts::METADATA_SIZE;
use crate::error::AllocError;

/// Map `len` bytes of anonymous, private, read-write memory from the OS.
pub(crate) unsafe fn mmap_anonymous(len: usize) -> Result<*mut u8, AllocError> {
    unsafe {
        let ptr = libc::mmap(
            std::ptr::null_mut(),
            len,
            libc::PROT_READ | libc::PROT_WRITE,
            libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
            -1,
            0,
        );
        if ptr == libc::MAP_FAILED {
            return Err(AllocError::MapFailed(io::Error::last_os_error()));
        }
        Ok(ptr as *mut u8)
    }
}

/// Unmap `len` bytes starting at `ptr`. Failure is logged and otherwise
/// ignored — the block is still treated as released for accounting
/// purposes, and nothing downstream retries.
pub(crate) unsafe fn munmap_region(ptr: *mut u8, len: usize) {
    unsafe {
        if libc::munmap(ptr as *mut libc::c_void, len) != 0 {
            log::error!(
                "munmap({:p}, {len}) failed: {}",
                ptr,
                io::Error::last_os_error()
            );
        }
    }
}

/// Install start/end fenceposts and an allocated, mapped middle block of
/// `block_size` bytes (header + payload + footer) into a fresh mapping of
/// `mmap_size` bytes (`block_size + 2 * METADATA_SIZE`). Returns the middle
/// block's pointer.
pub(crate) unsafe fn install_mapped_block(
    mem: *mut u8,
    mmap_size: usize,
    block_size: usize,
) -> BlockPtr {
    unsafe {
        let start_fencepost = NonNull::new_unchecked(mem as *mut BlockHeader);
        BlockHeader::set_size(start_fencepost, 0);
        BlockHeader::set_allocated(start_fencepost, true);
        BlockHeader::set_fencepost(start_fencepost, true);
        BlockHeader::set_mapped(start_fencepost, true);

        let end_fencepost =
            NonNull::new_unchecked(mem.add(mmap_size - METADATA_SIZE) as *mut BlockHeader);
        BlockHeader::set_size(end_fencepost, 0);
        BlockHeader::set_allocated(end_fencepost, true);
        BlockHeader::set_fencepost(end_fencepost, true);
        BlockHeader::set_mapped(end_fencepost, true);

        let middle = NonNull::new_unchecked(mem.add(METADATA_SIZE) as *mut BlockHeader);
        BlockHeader::set_size(middle, block_size);
        BlockHeader::set_allocated(middle, true);
        BlockHeader::set_fencepost(middle, false);
        BlockHeader::set_mapped(middle, true);
        BlockHeader::write_footer(middle);

        middle
    }
}
