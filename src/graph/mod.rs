//! The frame graph is an abstraction that automatically orders passes, manages the memory of transient resources,
//! and inserts the state transitions and barriers between passes. Each pass declares the resources it reads and
//! writes, and the graph derives everything else from these declarations. The graph is rebuilt every frame.
//!
//! Resources are referred to through [`VirtualResource`] handles. A resource is either *transient*, in which case
//! its memory is owned by the graph and only exists between its first and last use in the frame, or *imported*,
//! in which case it is owned by the caller (like a swapchain image) and identified by an [`ExternalHandle`].
//! Transient resources with disjoint lifetimes share memory.
//!
//! A frame goes through the following steps:
//! 1. Resources and passes are declared. The dependency graph is built incrementally, see [`task_graph`].
//! 2. [`FrameGraph::compile()`](crate::FrameGraph::compile()) culls passes that contribute nothing, orders the rest (see [`schedule`]), plans
//!    transient memory (see [`TransientAllocator`](crate::TransientAllocator)) and derives barriers (see [`barrier`]).
//! 3. [`FrameGraph::execute()`](crate::FrameGraph::execute()) binds physical memory to every resource on first use, records each pass into a
//!    [`CommandRecorder`](crate::CommandRecorder) and hands the result to a [`Submitter`](crate::Submitter).
//!
//! Through the [`GraphViz`] trait, it's possible to export a graphviz-compatible dot file to display the graph.
//!
//! # Example
//!
//! ```
//! # use deimos::prelude::*;
//! # use anyhow::Result;
//! fn frame<C: CommandRecorder, M: MemoryProvider, S: Submitter<Commands = C>>(
//!     graph: &mut FrameGraph<C, M>,
//!     cmd: C,
//!     submitter: &mut S,
//! ) -> Result<FrameToken> {
//!     let swapchain = graph.import_resource(
//!         "swapchain",
//!         ExternalHandle(1),
//!         ImageDescription::new_2d(1920, 1080, Format::Bgra8Srgb, UsageFlags::COLOR_ATTACHMENT),
//!     )?;
//!     let hdr = graph.declare_resource(
//!         "hdr",
//!         ImageDescription::new_2d(1920, 1080, Format::Rgba16Float, UsageFlags::COLOR_ATTACHMENT | UsageFlags::SAMPLED),
//!     )?;
//!     graph.add_pass(
//!         PassBuilder::new("scene")
//!             .clear_color_attachment(&hdr, ClearColor::Float([0.0, 0.0, 0.0, 1.0]))
//!             .build(),
//!     )?;
//!     graph.add_pass(
//!         PassBuilder::new("tonemap")
//!             .sample_image(&hdr, PipelineStage::FRAGMENT_SHADER)
//!             .clear_color_attachment(&swapchain, ClearColor::Float([0.0, 0.0, 0.0, 1.0]))
//!             .build(),
//!     )?;
//!     graph.add_pass(PassBuilder::present("present", &swapchain))?;
//!     graph.execute(cmd, submitter)
//! }
//! ```
//!
//! For more complex passes, see the [`pass`] module documentation.

pub mod barrier;
pub mod pass;
pub mod pass_graph;
pub mod physical_resource;
pub mod registry;
pub mod resource;
pub mod schedule;
pub mod task_graph;
pub mod virtual_resource;

pub(crate) mod record;

pub use pass_graph::GraphViz;
pub use registry::ExternalHandle;
pub use virtual_resource::VirtualResource;
