//! This module mainly exposes the [`PassBuilder`] struct, used for correctly defining passes in a
//! [`FrameGraph`](crate::FrameGraph).
//!
//! For documentation on how to use the frame graph, refer to the [`graph`](crate::graph) module level documentation.
//! Each pass must declare the resources it reads and writes, and can optionally specify a closure to be executed when
//! the pass is recorded. Additionally, a color can be given to each pass which will show up in debuggers like
//! [*RenderDoc*](https://renderdoc.org/) if the `debug-markers` feature is enabled.
//!
//! # Example
//!
//! In this example we will define two passes: One that writes to an offscreen texture, and one that samples from this
//! texture to render it to the screen. The frame graph will ensure access is properly synchronized, and the offscreen
//! image is transitioned from [`ResourceState::Undefined`](crate::ResourceState::Undefined) to
//! [`ResourceState::ColorAttachment`](crate::ResourceState::ColorAttachment), and then to
//! [`ResourceState::ShaderRead`](crate::ResourceState::ShaderRead) before the final pass.
//! ```
//! # use deimos::prelude::*;
//! # use anyhow::Result;
//! fn passes<C: CommandRecorder, M: MemoryProvider>(graph: &mut FrameGraph<C, M>) -> Result<()> {
//!     let usage = UsageFlags::COLOR_ATTACHMENT | UsageFlags::SAMPLED;
//!     let offscreen = graph.declare_resource("offscreen", ImageDescription::new_2d(800, 600, Format::Rgba8Unorm, usage))?;
//!     let swapchain = graph.import_resource(
//!         "swapchain",
//!         ExternalHandle(0),
//!         ImageDescription::new_2d(800, 600, Format::Bgra8Srgb, UsageFlags::COLOR_ATTACHMENT),
//!     )?;
//!
//!     let offscreen_pass = PassBuilder::new("offscreen")
//!         .color([1.0, 0.0, 0.0, 1.0])
//!         .clear_color_attachment(&offscreen, ClearColor::Float([1.0, 0.0, 0.0, 1.0]))
//!         .build();
//!     graph.add_pass(offscreen_pass)?;
//!
//!     let sample_pass = PassBuilder::new("sample")
//!         .clear_color_attachment(&swapchain, ClearColor::Float([0.0, 0.0, 0.0, 1.0]))
//!         .sample_image(&offscreen, PipelineStage::FRAGMENT_SHADER)
//!         .execute_fn(move |cmd, bindings| {
//!             let _texture = bindings.get(&offscreen)?;
//!             // Draw a fullscreen quad sampling the offscreen texture.
//!             Ok(cmd)
//!         })
//!         .build();
//!     graph.add_pass(sample_pass)?;
//!     graph.add_pass(PassBuilder::present("present", &swapchain))?;
//!     Ok(())
//! }
//! ```

use anyhow::Result;
use static_assertions::assert_impl_all;

use crate::graph::physical_resource::PhysicalResourceBindings;
use crate::graph::resource::{
    AttachmentType, ClearColor, ClearDepthStencil, ClearValue, LoadOp, PipelineStage, ResourceUsage,
};
use crate::graph::virtual_resource::VirtualResource;
use crate::sync::semaphore::{Semaphore, SemaphoreSignal, SemaphoreWait};

/// The returned value from a pass callback function.
pub type PassFnResult<C> = Result<C>;

/// Defines a pass executor that can be called when the pass is recorded.
pub trait PassExecutor<C> {
    /// Record this pass to a command recorder.
    fn execute(&mut self, cmd: C, bindings: &PhysicalResourceBindings) -> PassFnResult<C>;
}

impl<C, F> PassExecutor<C> for F
where
    F: FnMut(C, &PhysicalResourceBindings) -> PassFnResult<C>,
{
    /// Record this pass by calling the given function.
    fn execute(&mut self, cmd: C, bindings: &PhysicalResourceBindings) -> PassFnResult<C> {
        self(cmd, bindings)
    }
}

pub(crate) type BoxedPassFn<'cb, C> = Box<dyn PassExecutor<C> + 'cb>;

/// An empty pass executor that does nothing
pub struct EmptyPassExecutor;

impl EmptyPassExecutor {
    /// Creates an empty pass executor
    pub fn new() -> Self {
        Self {}
    }

    /// Create a new empty pass executor in a [`Box`]
    pub fn new_boxed() -> Box<Self> {
        Box::new(Self::new())
    }
}

impl Default for EmptyPassExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> PassExecutor<C> for EmptyPassExecutor {
    /// Execute the empty pass executor by just returning the command recorder.
    fn execute(&mut self, cmd: C, _bindings: &PhysicalResourceBindings) -> PassFnResult<C> {
        Ok(cmd)
    }
}

/// Handle to a pass declared in a [`FrameGraph`](crate::FrameGraph). Only valid in the frame it was declared in.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct PassHandle {
    pub(crate) index: u32,
    pub(crate) epoch: u32,
}

assert_impl_all!(PassHandle: Send, Sync, Copy);

impl PassHandle {
    /// Index of the pass in declaration order.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

/// A single resource access of a pass.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PassResource {
    pub(crate) usage: ResourceUsage,
    pub(crate) resource: VirtualResource,
    pub(crate) stage: PipelineStage,
    pub(crate) load_op: Option<LoadOp>,
    pub(crate) clear_value: Option<ClearValue>,
}

impl PassResource {
    fn new(resource: VirtualResource, usage: ResourceUsage, stage: PipelineStage) -> Self {
        Self {
            usage,
            resource,
            stage,
            load_op: None,
            clear_value: None,
        }
    }

    /// Get the virtual resource associated with this pass resource.
    pub fn virtual_resource(&self) -> &VirtualResource {
        &self.resource
    }

    pub fn usage(&self) -> ResourceUsage {
        self.usage
    }

    /// Pipeline stages the access happens in.
    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    /// Load operation of a write. Always `None` for reads.
    pub fn load_op(&self) -> Option<LoadOp> {
        self.load_op
    }

    pub fn clear_value(&self) -> Option<ClearValue> {
        self.clear_value
    }

    /// Returns true if this write preserves the previous contents of the resource.
    pub fn preserves_contents(&self) -> bool {
        self.load_op == Some(LoadOp::Load)
    }
}

/// Represents one pass in a frame graph. You can obtain one using a [`PassBuilder`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct Pass<'cb, C> {
    pub(crate) name: String,
    pub(crate) color: Option<[f32; 4]>,
    pub(crate) inputs: Vec<PassResource>,
    pub(crate) outputs: Vec<PassResource>,
    pub(crate) after: Vec<PassHandle>,
    pub(crate) side_effect: bool,
    pub(crate) is_present: bool,
    pub(crate) wait_semaphores: Vec<SemaphoreWait>,
    pub(crate) signal_semaphores: Vec<SemaphoreSignal>,
    #[derivative(Debug = "ignore")]
    pub(crate) execute: BoxedPassFn<'cb, C>,
}

impl<'cb, C> Pass<'cb, C> {
    /// Get the pass name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resources this pass reads.
    pub fn inputs(&self) -> &[PassResource] {
        &self.inputs
    }

    /// Resources this pass writes.
    pub fn outputs(&self) -> &[PassResource] {
        &self.outputs
    }

    /// All resource accesses of this pass, reads first.
    pub fn accesses(&self) -> impl Iterator<Item = &PassResource> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Returns true if the pass was marked as having a side effect outside the frame graph.
    pub fn has_side_effect(&self) -> bool {
        self.side_effect || self.is_present
    }

    /// Returns true if this pass writes `resource`.
    pub fn writes(&self, resource: &VirtualResource) -> bool {
        self.outputs.iter().any(|output| output.resource == *resource)
    }

    /// Returns true if this pass reads `resource`.
    pub fn reads(&self, resource: &VirtualResource) -> bool {
        self.inputs.iter().any(|input| input.resource == *resource)
    }
}

/// Used to create [`Pass`] objects correctly.
/// # Example
/// See the [`pass`](crate::graph::pass) module level documentation.
pub struct PassBuilder<'cb, C> {
    inner: Pass<'cb, C>,
}

impl<'cb, C> PassBuilder<'cb, C> {
    /// Create a new pass without any resource accesses.
    pub fn new(name: impl Into<String>) -> Self {
        PassBuilder {
            inner: Pass {
                name: name.into(),
                color: None,
                inputs: vec![],
                outputs: vec![],
                after: vec![],
                side_effect: false,
                is_present: false,
                wait_semaphores: vec![],
                signal_semaphores: vec![],
                execute: EmptyPassExecutor::new_boxed(),
            },
        }
    }

    /// Create a pass for presenting an imported image.
    /// Note that this doesn't actually do the presentation, it just transitions the image to
    /// [`ResourceState::Present`](crate::ResourceState::Present) at the end of the frame. Present passes are never culled.
    pub fn present(name: impl Into<String>, swapchain: &VirtualResource) -> Pass<'cb, C> {
        let mut pass = PassBuilder::new(name).build();
        pass.inputs.push(PassResource::new(
            *swapchain,
            ResourceUsage::Present,
            ResourceUsage::Present.default_stage(),
        ));
        pass.is_present = true;
        pass
    }

    /// Set the color of this pass. This can show up in graphics debuggers like RenderDoc.
    #[cfg(feature = "debug-markers")]
    pub fn color(mut self, color: [f32; 4]) -> Self {
        self.inner.color = Some(color);
        self
    }

    fn push_output(mut self, resource: &VirtualResource, usage: ResourceUsage, stage: PipelineStage, op: LoadOp, clear: Option<ClearValue>) -> Self {
        self.inner.outputs.push(PassResource {
            load_op: Some(op),
            clear_value: clear,
            ..PassResource::new(*resource, usage, stage)
        });
        self
    }

    /// Adds a color attachment to this pass. If [`LoadOp::Clear`] was specified without a clear value, the attachment is
    /// cleared to zero.
    pub fn color_attachment(self, resource: &VirtualResource, op: LoadOp, clear: Option<ClearColor>) -> Self {
        let clear = match op {
            LoadOp::Clear => Some(ClearValue::Color(clear.unwrap_or(ClearColor::Float([0.0; 4])))),
            _ => None,
        };
        let usage = ResourceUsage::Attachment(AttachmentType::Color);
        self.push_output(resource, usage, usage.default_stage(), op, clear)
    }

    /// Clear a color attachment with the specified clear color
    pub fn clear_color_attachment(self, resource: &VirtualResource, color: ClearColor) -> Self {
        self.color_attachment(resource, LoadOp::Clear, Some(color))
    }

    /// Load a color attachment, preserving its previous contents.
    pub fn load_color_attachment(self, resource: &VirtualResource) -> Self {
        self.color_attachment(resource, LoadOp::Load, None)
    }

    /// Adds a depth attachment to this pass. If [`LoadOp::Clear`] was specified without a clear value, the attachment is
    /// cleared to zero.
    pub fn depth_attachment(self, resource: &VirtualResource, op: LoadOp, clear: Option<ClearDepthStencil>) -> Self {
        let clear = match op {
            LoadOp::Clear => Some(ClearValue::DepthStencil(clear.unwrap_or_default())),
            _ => None,
        };
        let usage = ResourceUsage::Attachment(AttachmentType::Depth);
        self.push_output(resource, usage, usage.default_stage(), op, clear)
    }

    /// Clear the depth attachment with the specified clear values
    pub fn clear_depth_attachment(self, resource: &VirtualResource, clear: ClearDepthStencil) -> Self {
        self.depth_attachment(resource, LoadOp::Clear, Some(clear))
    }

    /// Load a depth attachment, preserving its previous contents.
    pub fn load_depth_attachment(self, resource: &VirtualResource) -> Self {
        self.depth_attachment(resource, LoadOp::Load, None)
    }

    /// Declare that a resource will be used as a sampled image in the given pipeline stages.
    pub fn sample_image(mut self, resource: &VirtualResource, stage: PipelineStage) -> Self {
        self.inner
            .inputs
            .push(PassResource::new(*resource, ResourceUsage::ShaderRead, stage));
        self
    }

    /// Declare that a resource will be used as a storage image that is written to in the given pipeline stages.
    /// The previous contents are discarded.
    pub fn write_storage_image(self, resource: &VirtualResource, stage: PipelineStage) -> Self {
        self.push_output(resource, ResourceUsage::ShaderWrite, stage, LoadOp::DontCare, None)
    }

    /// Declare a read of a resource with the given usage, in the default pipeline stage of that usage.
    pub fn read(mut self, resource: &VirtualResource, usage: ResourceUsage) -> Self {
        self.inner
            .inputs
            .push(PassResource::new(*resource, usage, usage.default_stage()));
        self
    }

    /// Declare a read of a resource with the given usage in specific pipeline stages.
    pub fn read_in(mut self, resource: &VirtualResource, usage: ResourceUsage, stage: PipelineStage) -> Self {
        self.inner.inputs.push(PassResource::new(*resource, usage, stage));
        self
    }

    /// Declare a write of a resource with the given usage. The previous contents are discarded.
    pub fn write(self, resource: &VirtualResource, usage: ResourceUsage) -> Self {
        self.push_output(resource, usage, usage.default_stage(), LoadOp::DontCare, None)
    }

    /// Declare a write of a resource that preserves its previous contents, like a read-modify-write of a storage
    /// buffer. The pass is ordered after the previous writer of the resource.
    pub fn modify(self, resource: &VirtualResource, usage: ResourceUsage) -> Self {
        self.push_output(resource, usage, usage.default_stage(), LoadOp::Load, None)
    }

    /// Mark this pass as having an effect outside the frame graph, so it is never culled.
    pub fn side_effect(mut self) -> Self {
        self.inner.side_effect = true;
        self
    }

    /// Order this pass after another pass, even if they share no resources.
    pub fn after(mut self, pass: PassHandle) -> Self {
        self.inner.after.push(pass);
        self
    }

    /// Make the submission of this frame wait on a timeline semaphore before `stage`.
    pub fn wait_semaphore(mut self, semaphore: Semaphore, value: u64, stage: PipelineStage) -> Self {
        self.inner.wait_semaphores.push(SemaphoreWait {
            semaphore,
            value,
            stage,
        });
        self
    }

    /// Signal a timeline semaphore once the submission of this frame completes.
    pub fn signal_semaphore(mut self, semaphore: Semaphore, value: u64) -> Self {
        self.inner.signal_semaphores.push(SemaphoreSignal {
            semaphore,
            value,
        });
        self
    }

    /// Set the executor to be called when recording this pass.
    pub fn executor(mut self, exec: impl PassExecutor<C> + 'cb) -> Self {
        self.inner.execute = Box::new(exec);
        self
    }

    /// Set the executor to be called when recording this pass. This method can be used to deduce types
    /// when a closure is used as a pass executor.
    pub fn execute_fn<F>(mut self, exec: F) -> Self
    where
        F: FnMut(C, &PhysicalResourceBindings) -> PassFnResult<C> + 'cb, {
        self.inner.execute = Box::new(exec);
        self
    }

    /// Obtain a built [`Pass`] object.
    pub fn build(self) -> Pass<'cb, C> {
        self.inner
    }
}
