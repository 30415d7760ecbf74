//! Various utilities

pub mod align;
pub mod byte_size;
pub mod deferred_delete;
