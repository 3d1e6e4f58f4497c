//! # segalloc
//!
//! A general-purpose dynamic memory allocator servicing a `malloc`/`free`
//! interface backed by anonymous pages obtained from the operating system.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                  Heap (process state)                │
//! │  • heap_start, heap_size, current/peak payload        │
//! └───────────────┬───────────────────────┬───────────────┘
//!                 │                       │
//! ┌───────────────▼───────────────┐ ┌─────▼───────────────┐
//! │   Segregated free-list index  │ │   Mapped registry     │
//! │   59 size classes, best-fit   │ │   oversize blocks      │
//! └───────────────┬───────────────┘ └─────┬───────────────┘
//!                 │                       │
//! ┌───────────────▼───────────────────────▼───────────────┐
//! │           Boundary-tag block layout (block.rs)         │
//! │   header + footer, ALLOCATED / FENCEPOST / MAPPED bits  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! A single 64 MiB primary region is mapped lazily on first use and never
//! shrunk. Requests that would not fit in an *empty* primary region are
//! served by a per-request direct mapping instead. The allocator is
//! single-threaded; see [`locked::Locked`] for the exclusive-access
//! boundary around the process-wide singleton in [`global`].
//!
//! Two ways to use this crate:
//! - the free functions in [`global`] (and optionally [`global::SegAlloc`]
//!   as a `#[global_allocator]`) drive one process-wide heap;
//! - [`heap::Heap`] can be instantiated directly for isolated use (tests,
//!   the `fragbench` harness), each with its own primary region and state.

mod block;
mod consts;
mod error;
mod free_list;
mod global;
mod heap;
mod locked;
mod oversize;

pub use error::AllocError;
pub use global::{
    SegAlloc, alloc, block_size, free, get_heap_size, get_next_block, get_peak_memory_usage,
    get_prev_block, get_start_block, is_free, ptr_to_block,
};
pub use heap::{BlockRef, Heap};

pub use consts::{
    BLOCK_OVERHEAD, FOOTER_SIZE, MAX_ALLOCATION_SIZE, METADATA_SIZE, PRIMARY_REGION_SIZE,
    round_up,
};
