use anyhow::Result;

use crate::graph::barrier::Barrier;
use crate::graph::physical_resource::PhysicalResourceBindings;

/// The command recording interface. The frame graph only records barriers and debug labels through it. Everything
/// else is recorded by pass callbacks, which receive the recorder by value and hand it back when they are done.
pub trait CommandRecorder {
    /// Record a batch of barriers. All barriers in the batch are positioned before the same pass and can be
    /// translated into a single `vkCmdPipelineBarrier2` call or equivalent.
    fn pipeline_barrier(self, barriers: &[Barrier], bindings: &PhysicalResourceBindings) -> Result<Self>
    where
        Self: Sized;

    /// Open a debug label region. Only called with the `debug-markers` feature.
    fn begin_label(self, _name: &str, _color: [f32; 4]) -> Self
    where
        Self: Sized, {
        self
    }

    /// Close the last opened debug label region. Only called with the `debug-markers` feature.
    fn end_label(self) -> Self
    where
        Self: Sized, {
        self
    }
}
