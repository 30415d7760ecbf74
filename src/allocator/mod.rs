//! The allocator module exposes the transient memory system of the frame graph.
//! <br>
//! <br>
//! # Memory provider
//! [`traits::MemoryProvider`] is the interface to the device memory allocator. The frame graph only ever asks it
//! for whole blocks, which it then carves up itself.
//! # Memory classes
//! Defined in [`memory_type`]. Resources of different classes never share a block.
//! # Transient allocator
//! An interval-coloring allocator that places transient resources with non-overlapping lifetimes at the same
//! offsets, and keeps blocks alive until the GPU has finished with them. For more information check the
//! [`transient_allocator`] module documentation.

pub mod traits;
pub mod memory_type;
pub mod transient_allocator;
