#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};

use deimos::prelude::*;

/// Memory provider that hands out fake block handles and keeps track of everything it allocated.
#[derive(Debug, Default)]
pub struct MockMemoryProvider {
    next: u64,
    pub live: HashMap<BlockHandle, (u64, MemoryClass)>,
    pub allocations: usize,
    pub frees: usize,
    /// Fail the next allocation, like a device that ran out of memory.
    pub fail_next: bool,
}

impl MockMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_bytes(&self) -> u64 {
        self.live.values().map(|(size, _)| *size).sum()
    }
}

impl MemoryProvider for MockMemoryProvider {
    fn allocate_block(&mut self, size: u64, _alignment: u64, class: MemoryClass) -> Result<BlockHandle> {
        if self.fail_next {
            self.fail_next = false;
            return Err(anyhow!("mock device out of memory"));
        }
        self.next += 1;
        let handle = BlockHandle(self.next);
        self.live.insert(handle, (size, class));
        self.allocations += 1;
        Ok(handle)
    }

    fn free_block(&mut self, block: BlockHandle) -> Result<()> {
        self.live
            .remove(&block)
            .ok_or_else(|| anyhow!("double free of {:?}", block))?;
        self.frees += 1;
        Ok(())
    }
}

/// A single call made on a [`RecordingCommands`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Barriers(Vec<Barrier>),
    BeginLabel(String),
    EndLabel,
    Pass(String),
}

/// Command recorder that logs every call instead of talking to a GPU.
#[derive(Debug, Default)]
pub struct RecordingCommands {
    pub commands: Vec<Command>,
}

impl RecordingCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the recorded passes, in recording order.
    pub fn passes(&self) -> Vec<String> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::Pass(name) => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    /// All recorded barrier batches, in recording order.
    pub fn barrier_batches(&self) -> Vec<Vec<Barrier>> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::Barriers(batch) => Some(batch.clone()),
                _ => None,
            })
            .collect()
    }
}

impl CommandRecorder for RecordingCommands {
    fn pipeline_barrier(mut self, barriers: &[Barrier], _bindings: &PhysicalResourceBindings) -> Result<Self> {
        self.commands.push(Command::Barriers(barriers.to_vec()));
        Ok(self)
    }

    fn begin_label(mut self, name: &str, _color: [f32; 4]) -> Self {
        self.commands.push(Command::BeginLabel(name.to_owned()));
        self
    }

    fn end_label(mut self) -> Self {
        self.commands.push(Command::EndLabel);
        self
    }
}

/// Pass callback that logs its own name into the recorder.
pub fn record(name: &'static str) -> impl FnMut(RecordingCommands, &PhysicalResourceBindings) -> Result<RecordingCommands> {
    move |mut cmd, _| {
        cmd.commands.push(Command::Pass(name.to_owned()));
        Ok(cmd)
    }
}

/// Submitter that keeps every submission around. Frames complete when the test says so.
#[derive(Debug, Default)]
pub struct MockSubmitter {
    next: u64,
    /// Amount of frames the "GPU" has finished. Shared so other threads can complete frames.
    pub completed: Arc<AtomicU64>,
    pub submissions: Vec<Submission<RecordingCommands>>,
    pub fail_next: bool,
}

impl MockSubmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Complete every frame submitted so far.
    pub fn complete_all(&self) {
        self.completed.store(self.next, Ordering::SeqCst);
    }

    /// Complete every frame up to and including `token`.
    pub fn complete(&self, token: FrameToken) {
        self.completed.fetch_max(token.frame() + 1, Ordering::SeqCst);
    }

    pub fn last(&self) -> Option<&Submission<RecordingCommands>> {
        self.submissions.last()
    }
}

impl Submitter for MockSubmitter {
    type Commands = RecordingCommands;

    fn submit(&mut self, submission: Submission<RecordingCommands>) -> Result<FrameToken> {
        if self.fail_next {
            self.fail_next = false;
            return Err(anyhow!("mock queue lost"));
        }
        let token = FrameToken::new(self.next);
        self.next += 1;
        self.submissions.push(submission);
        Ok(token)
    }

    fn is_complete(&self, token: FrameToken) -> bool {
        token.frame() < self.completed.load(Ordering::SeqCst)
    }
}

pub fn init_logging() {
    let _ = pretty_env_logger::try_init();
}

pub fn settings() -> GraphSettings {
    GraphSettingsBuilder::new()
        .name("test graph")
        .build()
        .expect("default settings are valid")
}

pub fn make_graph<'cb>() -> FrameGraph<'cb, RecordingCommands, MockMemoryProvider> {
    make_graph_with(settings())
}

pub fn make_graph_with<'cb>(settings: GraphSettings) -> FrameGraph<'cb, RecordingCommands, MockMemoryProvider> {
    init_logging();
    FrameGraph::new(settings, MockMemoryProvider::new()).expect("Can create frame graph.")
}

pub fn render_target(format: Format) -> ImageDescription {
    ImageDescription::new_2d(256, 256, format, UsageFlags::COLOR_ATTACHMENT | UsageFlags::SAMPLED)
}

pub fn depth_target() -> ImageDescription {
    ImageDescription::new_2d(256, 256, Format::D32Float, UsageFlags::DEPTH_STENCIL_ATTACHMENT | UsageFlags::SAMPLED)
}

pub fn storage_image() -> ImageDescription {
    ImageDescription::new_2d(256, 256, Format::Rgba16Float, UsageFlags::STORAGE | UsageFlags::SAMPLED)
}

pub fn swapchain_image() -> ImageDescription {
    ImageDescription::new_2d(256, 256, Format::Bgra8Srgb, UsageFlags::COLOR_ATTACHMENT)
}

pub fn storage_buffer(size: u64) -> BufferDescription {
    BufferDescription::new(size, UsageFlags::STORAGE)
}

/// Handles of the resources of [`declare_scene()`].
#[derive(Debug, Copy, Clone)]
pub struct Scene {
    pub depth: VirtualResource,
    pub color: VirtualResource,
    pub bloom: VirtualResource,
    pub swapchain: VirtualResource,
}

/// Declare the geometry, compute and composite passes of a small deferred renderer.
pub fn declare_scene(
    graph: &mut FrameGraph<RecordingCommands, MockMemoryProvider>,
    bloom: ImageDescription,
) -> Result<Scene> {
    let depth = graph.declare_resource("depth", depth_target())?;
    let color = graph.declare_resource("color", render_target(Format::Rgba16Float))?;
    let bloom = graph.declare_resource("bloom", bloom)?;
    let swapchain = graph.import_resource("swapchain", ExternalHandle(7), swapchain_image())?;

    graph.add_pass(
        PassBuilder::new("geometry")
            .clear_depth_attachment(&depth, ClearDepthStencil { depth: 1.0, stencil: 0 })
            .clear_color_attachment(&color, ClearColor::Float([0.0, 0.0, 0.0, 1.0]))
            .execute_fn(record("geometry"))
            .build(),
    )?;
    graph.add_pass(
        PassBuilder::new("compute")
            .sample_image(&color, PipelineStage::COMPUTE_SHADER)
            .write_storage_image(&bloom, PipelineStage::COMPUTE_SHADER)
            .execute_fn(record("compute"))
            .build(),
    )?;
    graph.add_pass(
        PassBuilder::new("composite")
            .sample_image(&bloom, PipelineStage::FRAGMENT_SHADER)
            .sample_image(&color, PipelineStage::FRAGMENT_SHADER)
            .clear_color_attachment(&swapchain, ClearColor::Float([0.0, 0.0, 0.0, 1.0]))
            .execute_fn(record("composite"))
            .build(),
    )?;
    Ok(Scene {
        depth,
        color,
        bloom,
        swapchain,
    })
}
