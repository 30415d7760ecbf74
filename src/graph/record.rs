//! Recording of a scheduled frame into a command recorder.
//!
//! Passes are recorded one by one in execution order:
//! - Transient resources accessed by the pass are realized on first use and bound to their physical memory.
//! - All barriers positioned before the pass are recorded as one batch.
//! - The pass callback is invoked with the bindings of the frame.

use anyhow::Result;

use crate::allocator::traits::MemoryProvider;
use crate::allocator::transient_allocator::TransientAllocator;
use crate::command_buffer::traits::CommandRecorder;
use crate::graph::barrier::BarrierPlan;
use crate::graph::pass::Pass;
use crate::graph::physical_resource::{PhysicalResource, PhysicalResourceBindings};
use crate::graph::registry::{ResourceOrigin, ResourceRegistry};
use crate::graph::schedule::Schedule;

/// Bind every imported resource of the frame to its external handle.
pub(crate) fn bind_imported(registry: &ResourceRegistry, bindings: &mut PhysicalResourceBindings) {
    for entry in registry.iter() {
        if let ResourceOrigin::Imported(handle) = entry.origin() {
            bindings.bind(entry.handle(), PhysicalResource::Imported(handle));
        }
    }
}

fn realize_resources<C, M: MemoryProvider>(
    pass: &Pass<C>,
    allocator: &mut TransientAllocator<M>,
    bindings: &mut PhysicalResourceBindings,
) -> Result<()> {
    for access in pass.accesses() {
        let resource = access.resource;
        if bindings.contains(&resource) {
            continue;
        }
        let physical = allocator.realize(&resource)?;
        trace!("Realized {} for pass `{}` as {:?}", resource, pass.name, physical);
        bindings.bind(resource, physical);
    }
    Ok(())
}

#[cfg(feature = "debug-markers")]
fn annotate_pass<C: CommandRecorder>(pass: &Pass<C>, cmd: C) -> C {
    cmd.begin_label(&pass.name, pass.color.unwrap_or([1.0, 1.0, 1.0, 1.0]))
}

#[cfg(not(feature = "debug-markers"))]
fn annotate_pass<C: CommandRecorder>(_: &Pass<C>, cmd: C) -> C {
    cmd
}

#[cfg(feature = "debug-markers")]
fn end_annotation<C: CommandRecorder>(cmd: C) -> C {
    cmd.end_label()
}

#[cfg(not(feature = "debug-markers"))]
fn end_annotation<C: CommandRecorder>(cmd: C) -> C {
    cmd
}

fn record_pass<C: CommandRecorder>(pass: &mut Pass<C>, bindings: &PhysicalResourceBindings, mut cmd: C) -> Result<C> {
    cmd = annotate_pass(pass, cmd);
    cmd = pass.execute.execute(cmd, bindings)?;
    Ok(end_annotation(cmd))
}

/// Record all scheduled passes of a frame.
/// # Errors
/// Fails if a pass callback fails, or if a resource cannot be realized.
pub(crate) fn record_frame<C: CommandRecorder, M: MemoryProvider>(
    passes: &mut [Pass<C>],
    schedule: &Schedule,
    barriers: &BarrierPlan,
    allocator: &mut TransientAllocator<M>,
    bindings: &mut PhysicalResourceBindings,
    mut cmd: C,
) -> Result<C> {
    for (position, &index) in schedule.order().iter().enumerate() {
        let pass = &mut passes[index];
        realize_resources(pass, allocator, bindings)?;

        let batch = barriers.before(position);
        if !batch.is_empty() {
            cmd = cmd.pipeline_barrier(batch, bindings)?;
        }

        trace!("Recording pass `{}` at position {}", pass.name, position);
        cmd = record_pass(pass, bindings, cmd)?;
    }
    Ok(cmd)
}
