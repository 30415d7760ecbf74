pub use crate::core::error::Error;
pub use crate::core::settings::*;

pub use crate::sync::fence::FrameCompletion;
pub use crate::sync::frame_token::FrameToken;
pub use crate::sync::semaphore::*;
pub use crate::sync::submit_batch::*;

pub use crate::command_buffer::traits::*;

pub use crate::graph::barrier::{Barrier, BarrierPlan};
pub use crate::graph::pass::{EmptyPassExecutor, Pass, PassBuilder, PassExecutor, PassHandle, PassResource};
pub use crate::graph::pass_graph::{FrameGraph, FrameState, FrameStats, GraphViz};
pub use crate::graph::physical_resource::{PhysicalResource, PhysicalResourceBindings};
pub use crate::graph::registry::{ExternalHandle, ResourceEntry, ResourceOrigin, ResourceRegistry};
pub use crate::graph::resource::*;
pub use crate::graph::schedule::Schedule;
pub use crate::graph::task_graph::{Dependency, DependencyGraph};
pub use crate::graph::virtual_resource::VirtualResource;

pub use crate::allocator::memory_type::{MemoryClass, MemoryRequirements};
pub use crate::allocator::traits::*;
pub use crate::allocator::transient_allocator::{
    AllocatorStats, Lifetime, MemoryPlan, Placement, PlannedBlock, TransientAllocator, TransientRequest,
};
