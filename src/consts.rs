//! Layout constants shared by every module.
//!
//! Mirrors the constant set from the original `mymalloc.c` assignment
//! (`kAlignment`, `kMinAllocationSize`, `kMetadataSize`, `kMaxAllocationSize`,
//! `kMemorySize`) with Rust naming conventions.

use std::mem::size_of;

use crate::block::BlockHeader;

/// Word alignment. All block addresses and returned payload pointers are
/// aligned to this boundary.
pub const ALIGNMENT: usize = size_of::<usize>();

/// Minimum allocation size: one machine word.
pub const MIN_ALLOCATION_SIZE: usize = ALIGNMENT;

/// Size of a block header (size word + intrusive `next`/`prev` pointers).
/// The footer is a separate trailing word and is not included here.
pub const METADATA_SIZE: usize = size_of::<BlockHeader>();

/// Size of the trailing footer word.
pub const FOOTER_SIZE: usize = size_of::<usize>();

/// Total fixed overhead (header + footer) charged against every block.
pub const BLOCK_OVERHEAD: usize = METADATA_SIZE + FOOTER_SIZE;

/// Largest single request the allocator will service (128 MiB minus one
/// header's worth of headroom for the block that carries it).
pub const MAX_ALLOCATION_SIZE: usize = (128usize << 20) - METADATA_SIZE;

/// Size of the anonymous mapping obtained for the primary region on first use.
pub const PRIMARY_REGION_SIZE: usize = 64usize << 20;

/// Number of segregated free-list size classes.
pub const NUM_FREE_LIST_CLASSES: usize = 59;

/// `size` field low-bit flags, reusing the low three bits of an
/// alignment-guaranteed (8-byte aligned) size value.
pub const ALLOCATED_FLAG: usize = 0x1;
pub const FENCEPOST_FLAG: usize = 0x2;
pub const MAPPED_FLAG: usize = 0x4;
pub const SIZE_MASK: usize = !(ALLOCATED_FLAG | FENCEPOST_FLAG | MAPPED_FLAG);

/// Round `size` up to the next multiple of [`ALIGNMENT`].
#[inline]
pub const fn round_up(size: usize) -> usize {
    (size + ALIGNMENT - 1) & !(ALIGNMENT - 1)
}
