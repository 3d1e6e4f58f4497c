//! Typed rejection reasons for `alloc`.
//!
//! The public API stays exception-free — `alloc` returns `Option<NonNull<u8>>` —
//! but every rejection path is represented internally by an `AllocError` so
//! it can be logged with a specific reason instead of a bare `None`.

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum AllocError {
    #[error("requested size is zero")]
    ZeroSize,
    #[error("requested size {0} exceeds the maximum allocation size")]
    TooLarge(usize),
    #[error("failed to map memory from the operating system")]
    MapFailed(#[source] io::Error),
    #[error("no free-list class holds a block large enough for this request")]
    Exhausted,
}
