//! Frame graph with transient memory aliasing for GPU renderers
//!
//! Deimos schedules the passes of a frame, manages the memory of resources that only live within the frame, and
//! derives the barriers needed between passes. It does not talk to a graphics API itself: GPU memory, command
//! recording and queue submission are provided by the caller through a few traits.
//!
//! To get started, the easiest way is to simply
//! ```
//! // Import types under a namespace.
//! use deimos::prelude as dm;
//!
//! // Or, if you dont care about using the types under a namespace
//! use deimos::prelude::*;
//! ```
//!
//! # Example
//!
//! First, implement the interfaces to your graphics API:
//! - [`MemoryProvider`] hands out blocks of device memory.
//! - [`CommandRecorder`] records barriers and debug labels, and is passed through every pass callback.
//! - [`Submitter`] submits the recorded commands and reports when a frame is complete.
//!
//! A frame graph is created once and reused every frame.
//! ```
//! # use deimos::prelude::*;
//! # use anyhow::Result;
//! fn create<'cb, C: CommandRecorder, M: MemoryProvider>(provider: M) -> Result<FrameGraph<'cb, C, M>> {
//!     let settings = GraphSettingsBuilder::new()
//!         .name("main")
//!         .block_size(16 * 1024 * 1024) // 16 MiB blocks
//!         .memory_budget(512 * 1024 * 1024)
//!         .build()?;
//!     FrameGraph::new(settings, provider)
//! }
//! ```
//! Each frame, resources and passes are declared, and the graph is executed. See the [`graph`] module for an example.
//!
//! For further documentation, check out the following modules
//! - [`graph`] for declaring passes and resources, and executing frames.
//! - [`allocator`] for the transient memory system.
//! - [`sync`] for frame tokens, submission and semaphores.
//! - [`command_buffer`] for the command recording interface.
//! - [`core`] for settings and the error type.
//! - [`util`] for various utilities.

#[macro_use]
extern crate derivative;
#[macro_use]
extern crate log;

pub mod prelude;
pub use crate::prelude::*;

pub mod allocator;
pub mod command_buffer;
pub mod core;
pub mod graph;
pub mod sync;
pub mod util;
