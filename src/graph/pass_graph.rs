//! The pass graph module holds the frame graph implementation.

use std::collections::{HashSet, VecDeque};

use anyhow::{anyhow, Result};
use layout::backends::svg::SVGWriter;
use layout::gv;
use layout::gv::GraphBuilder;
use petgraph::dot::Dot;

use crate::allocator::traits::MemoryProvider;
use crate::allocator::transient_allocator::{MemoryPlan, TransientAllocator, TransientRequest};
use crate::command_buffer::traits::CommandRecorder;
use crate::core::error::Error;
use crate::core::settings::GraphSettings;
use crate::graph::barrier::{derive_barriers, BarrierPlan};
use crate::graph::pass::{Pass, PassBuilder, PassExecutor, PassHandle};
use crate::graph::physical_resource::PhysicalResourceBindings;
use crate::graph::record::{bind_imported, record_frame};
use crate::graph::registry::{ExternalHandle, ResourceOrigin, ResourceRegistry};
use crate::graph::resource::{ResourceDescription, ResourceState};
use crate::graph::schedule::{schedule, Schedule};
use crate::graph::task_graph::DependencyGraph;
use crate::graph::virtual_resource::VirtualResource;
use crate::sync::fence::FrameCompletion;
use crate::sync::frame_token::FrameToken;
use crate::sync::submit_batch::{Submission, Submitter};

/// Lifecycle of a frame.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum FrameState {
    /// Passes and resources are being declared.
    #[default]
    Building,
    /// The frame has an execution order and a memory plan. No further declarations are allowed.
    Scheduled,
    /// Passes are being recorded.
    Executing,
    /// Recorded work was handed to the GPU.
    Submitted,
    /// The GPU finished the frame and its memory is being reclaimed.
    Retiring,
    /// Nothing is left of the frame.
    Done,
}

/// Per-frame instrumentation.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FrameStats {
    /// Index of the frame these statistics belong to.
    pub frame: u64,
    pub passes_declared: usize,
    pub passes_scheduled: usize,
    pub passes_culled: usize,
    pub resources_declared: usize,
    /// Transient resources that got physical memory bound during execution.
    pub resources_realized: usize,
    pub barriers: usize,
    /// Bytes of transient memory the frame needs with aliasing.
    pub bytes_planned: u64,
    /// Bytes of transient memory the frame would need without aliasing.
    pub bytes_unaliased: u64,
    /// Largest sum of sizes of transient resources that are alive at the same pass.
    pub peak_live_bytes: u64,
    /// Amount of blocks requested from the memory provider since the graph was created.
    pub blocks_allocated: usize,
    /// Bytes of transient memory currently owned by the graph.
    pub resident_bytes: u64,
}

#[derive(Debug)]
struct CompiledFrame {
    schedule: Schedule,
    barriers: BarrierPlan,
}

/// A linear frame graph. Passes are declared every frame, and executed in declaration order unless their
/// dependencies require otherwise. See the [`graph`](crate::graph) module level documentation for an overview.
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct FrameGraph<'cb, C: CommandRecorder, M: MemoryProvider> {
    settings: GraphSettings,
    registry: ResourceRegistry,
    #[derivative(Debug = "ignore")]
    passes: Vec<Pass<'cb, C>>,
    graph: DependencyGraph,
    state: FrameState,
    allocator: TransientAllocator<M>,
    compiled: Option<CompiledFrame>,
    bindings: PhysicalResourceBindings,
    stats: FrameStats,
    epoch: u32,
    frame: u64,
    in_flight: VecDeque<FrameToken>,
}

impl<'cb, C: CommandRecorder, M: MemoryProvider> FrameGraph<'cb, C, M> {
    /// Create a new frame graph that allocates transient memory from `provider`.
    /// # Errors
    /// Fails with [`Error::InvalidSettings`] if the settings are out of range.
    pub fn new(settings: GraphSettings, provider: M) -> Result<Self> {
        settings.validate()?;
        info!("Created frame graph `{}`", settings.name);
        Ok(Self {
            allocator: TransientAllocator::new(provider, &settings),
            settings,
            registry: ResourceRegistry::new(),
            passes: vec![],
            graph: DependencyGraph::new(),
            state: FrameState::Building,
            compiled: None,
            bindings: PhysicalResourceBindings::new(),
            stats: FrameStats::default(),
            epoch: 0,
            frame: 0,
            in_flight: VecDeque::new(),
        })
    }

    fn transition(&mut self, state: FrameState) {
        trace!("Frame {} of `{}`: {:?} -> {:?}", self.frame, self.settings.name, self.state, state);
        self.state = state;
    }

    fn ensure_building(&self) -> Result<()> {
        match self.state {
            FrameState::Building => Ok(()),
            _ => Err(Error::GraphFinalized.into()),
        }
    }

    /// Get the settings of this graph.
    pub fn settings(&self) -> &GraphSettings {
        &self.settings
    }

    /// State of the frame currently being built.
    pub fn state(&self) -> FrameState {
        self.state
    }

    /// Get the resource registry of the current frame.
    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Get the dependency graph of the current frame.
    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Get the transient allocator.
    pub fn allocator(&self) -> &TransientAllocator<M> {
        &self.allocator
    }

    /// Get mutable access to the memory provider.
    pub fn memory_provider_mut(&mut self) -> &mut M {
        self.allocator.provider_mut()
    }

    /// Declare a transient resource. Its memory is owned by the graph and only exists while passes use it.
    /// # Errors
    /// Fails with [`Error::GraphFinalized`] if the frame was already scheduled.
    pub fn declare_resource(
        &mut self,
        name: impl Into<String>,
        description: impl Into<ResourceDescription>,
    ) -> Result<VirtualResource> {
        self.ensure_building()?;
        Ok(self.registry.declare(name, description))
    }

    /// Import an externally owned resource. It starts in the state the previous frame left it in.
    /// # Errors
    /// Fails with [`Error::GraphFinalized`] if the frame was already scheduled.
    pub fn import_resource(
        &mut self,
        name: impl Into<String>,
        handle: ExternalHandle,
        description: impl Into<ResourceDescription>,
    ) -> Result<VirtualResource> {
        self.ensure_building()?;
        Ok(self.registry.import(name, handle, description))
    }

    /// Import an externally owned resource that is known to be in `state`.
    /// # Errors
    /// Fails with [`Error::GraphFinalized`] if the frame was already scheduled.
    pub fn import_resource_with_state(
        &mut self,
        name: impl Into<String>,
        handle: ExternalHandle,
        description: impl Into<ResourceDescription>,
        state: ResourceState,
    ) -> Result<VirtualResource> {
        self.ensure_building()?;
        Ok(self.registry.import_with_state(name, handle, description, state))
    }

    fn validate_pass(&self, pass: &Pass<C>) -> Result<()> {
        let mut seen = HashSet::new();
        for access in pass.accesses() {
            let entry = self.registry.get(&access.resource)?;
            if !seen.insert(access.resource) {
                return Err(Error::OverlappingAccess {
                    pass: pass.name.clone(),
                    resource: entry.name().to_owned(),
                }
                .into());
            }
            if !entry.description().allows(&access.usage) {
                return Err(Error::IncompatibleUsage {
                    pass: pass.name.clone(),
                    resource: entry.name().to_owned(),
                    usage: access.usage,
                }
                .into());
            }
        }
        for after in &pass.after {
            if after.epoch != self.epoch || after.index() >= self.passes.len() {
                return Err(Error::UnknownPass(after.index()).into());
            }
        }
        Ok(())
    }

    /// Add a pass to the frame. To obtain a pass, use the [`PassBuilder`].
    /// # Errors
    /// * Fails with [`Error::GraphFinalized`] if the frame was already scheduled.
    /// * Fails with [`Error::UnknownResource`] if the pass uses a resource that was not declared in this frame.
    /// * Fails with [`Error::OverlappingAccess`] if the pass uses a resource more than once.
    /// * Fails with [`Error::IncompatibleUsage`] if a usage is not allowed by the description of its resource.
    /// * Fails with [`Error::UnknownPass`] if an `after` edge names a pass that was not declared in this frame.
    pub fn add_pass(&mut self, pass: Pass<'cb, C>) -> Result<PassHandle> {
        self.ensure_building()?;
        self.validate_pass(&pass)?;
        let side_effect = pass.has_side_effect()
            || pass
                .outputs
                .iter()
                .any(|output| self.registry.is_imported(&output.resource));
        let index = self.graph.add_pass(&pass, side_effect, &self.registry)?;
        self.passes.push(pass);
        Ok(PassHandle {
            index: index as u32,
            epoch: self.epoch,
        })
    }

    /// Declare a pass from plain read and write lists. Usages are inferred from the resource descriptions: render
    /// target images are written as attachments, everything else as storage, and reads are shader reads. A resource
    /// that is both read and written keeps its previous contents.
    /// # Errors
    /// See [`FrameGraph::add_pass()`].
    pub fn declare_pass(
        &mut self,
        name: impl Into<String>,
        reads: &[VirtualResource],
        writes: &[VirtualResource],
        side_effect: bool,
        f: impl PassExecutor<C> + 'cb,
    ) -> Result<PassHandle> {
        self.ensure_building()?;
        let mut builder = PassBuilder::new(name);
        for resource in reads.iter().filter(|resource| !writes.contains(resource)) {
            let description = self.registry.get(resource)?.description();
            builder = builder.read(resource, description.default_read());
        }
        for resource in writes {
            let usage = self.registry.get(resource)?.description().default_write();
            builder = if reads.contains(resource) {
                builder.modify(resource, usage)
            } else {
                builder.write(resource, usage)
            };
        }
        if side_effect {
            builder = builder.side_effect();
        }
        self.add_pass(builder.executor(f).build())
    }

    /// Validate, schedule and plan the memory of the current frame. No further declarations are allowed afterwards.
    /// Calling this on a frame that is already scheduled does nothing.
    ///
    /// If this fails, the frame is discarded and the graph is reset to [`FrameState::Building`].
    /// # Errors
    /// * Fails with [`Error::CyclicDependency`] or [`Error::AmbiguousWrite`] if the passes cannot be ordered.
    /// * Fails with [`Error::OutOfMemory`] or [`Error::AllocationFailure`] if transient memory cannot be acquired.
    pub fn compile(&mut self) -> Result<()> {
        match self.state {
            FrameState::Building => {}
            FrameState::Scheduled => return Ok(()),
            _ => return Err(Error::GraphFinalized.into()),
        }
        self.stats = FrameStats {
            frame: self.frame,
            passes_declared: self.passes.len(),
            resources_declared: self.registry.len(),
            ..Default::default()
        };
        match self.try_compile() {
            Ok(compiled) => {
                self.compiled = Some(compiled);
                self.transition(FrameState::Scheduled);
                Ok(())
            }
            Err(err) => {
                error!("Failed to compile frame {} of `{}`: {}", self.frame, self.settings.name, err);
                self.abort_frame();
                Err(err)
            }
        }
    }

    fn try_compile(&mut self) -> Result<CompiledFrame> {
        self.graph.validate(&self.registry)?;
        let schedule = schedule(&self.graph, &self.passes, &self.registry, self.settings.cull_passes)?;

        let mut resources = schedule.lifetimes().map(|(resource, lifetime)| (*resource, *lifetime)).collect::<Vec<_>>();
        resources.sort_by_key(|(resource, _)| *resource);
        let requests = resources
            .into_iter()
            .map(|(resource, lifetime)| -> Result<TransientRequest> {
                let entry = self.registry.get(&resource)?;
                Ok(TransientRequest {
                    resource,
                    requirements: self.allocator.requirements(entry.description()),
                    lifetime,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.stats.passes_scheduled = schedule.len();
        self.stats.passes_culled = schedule.culled().len();
        self.stats.bytes_unaliased = requests.iter().map(|request| request.requirements.size).sum();
        self.stats.peak_live_bytes = (0..schedule.len())
            .map(|position| {
                requests
                    .iter()
                    .filter(|request| request.lifetime.contains(position))
                    .map(|request| request.requirements.size)
                    .sum::<u64>()
            })
            .max()
            .unwrap_or(0);

        let plan = self.allocator.allocate(&requests)?;
        self.stats.bytes_planned = plan.total_size();
        let barriers = derive_barriers(&schedule, &self.passes, &self.registry, self.allocator.current_plan());
        self.stats.barriers = barriers.len();
        Ok(CompiledFrame {
            schedule,
            barriers,
        })
    }

    /// The schedule of the current frame, once it is compiled.
    pub fn schedule(&self) -> Option<&Schedule> {
        self.compiled.as_ref().map(|compiled| &compiled.schedule)
    }

    /// The barriers of the current frame, once it is compiled.
    pub fn barriers(&self) -> Option<&BarrierPlan> {
        self.compiled.as_ref().map(|compiled| &compiled.barriers)
    }

    /// Names of the scheduled passes in execution order, once the frame is compiled.
    pub fn order(&self) -> Option<Vec<&str>> {
        self.schedule().map(|schedule| {
            schedule
                .order()
                .iter()
                .map(|&pass| self.passes[pass].name.as_str())
                .collect()
        })
    }

    /// The memory plan of the last compiled frame.
    pub fn memory_plan(&self) -> &MemoryPlan {
        self.allocator.current_plan()
    }

    /// Get a pass of the current frame.
    pub fn pass(&self, handle: PassHandle) -> Option<&Pass<'cb, C>> {
        (handle.epoch == self.epoch)
            .then(|| self.passes.get(handle.index()))
            .flatten()
    }

    /// Compile the frame if needed, record every scheduled pass into `cmd` and submit the result. Completed frames are
    /// retired first, so their memory can be reused. On success the graph is reset for the next frame.
    ///
    /// If compiling or recording fails, the frame is discarded without submitting anything.
    /// # Errors
    /// * Fails with any error of [`FrameGraph::compile()`].
    /// * Fails if a pass callback or the submitter fails.
    pub fn execute<S: Submitter<Commands = C>>(&mut self, cmd: C, submitter: &mut S) -> Result<FrameToken> {
        self.retire_completed(&*submitter);
        self.compile()?;
        let Some(compiled) = self.compiled.take() else {
            return Err(Error::GraphFinalized.into());
        };

        self.transition(FrameState::Executing);
        self.bindings.clear();
        bind_imported(&self.registry, &mut self.bindings);
        let recorded = record_frame(
            &mut self.passes,
            &compiled.schedule,
            &compiled.barriers,
            &mut self.allocator,
            &mut self.bindings,
            cmd,
        );
        self.stats.resources_realized = self.allocator.stats().realized;
        let cmd = match recorded {
            Ok(cmd) => cmd,
            Err(err) => {
                error!("Failed to record frame {} of `{}`: {}", self.frame, self.settings.name, err);
                self.abort_frame();
                return Err(err);
            }
        };

        let mut submission = Submission {
            commands: cmd,
            wait_semaphores: vec![],
            signal_semaphores: vec![],
        };
        for &pass in compiled.schedule.order() {
            submission.wait_semaphores.extend_from_slice(&self.passes[pass].wait_semaphores);
            submission.signal_semaphores.extend_from_slice(&self.passes[pass].signal_semaphores);
        }
        let token = match submitter.submit(submission) {
            Ok(token) => token,
            Err(err) => {
                error!("Failed to submit frame {} of `{}`: {}", self.frame, self.settings.name, err);
                self.abort_frame();
                return Err(err);
            }
        };

        self.transition(FrameState::Submitted);
        self.allocator.defer(token);
        self.in_flight.push_back(token);
        for (resource, state) in compiled.barriers.final_states() {
            if let ResourceOrigin::Imported(handle) = self.registry.get(resource)?.origin() {
                self.registry.record_final_state(handle, *state);
            }
        }
        debug!("Submitted frame {} of `{}` as {}", self.frame, self.settings.name, token);
        self.finish_frame();
        Ok(token)
    }

    fn abort_frame(&mut self) {
        warn!("Aborting frame {} of `{}` before submission", self.frame, self.settings.name);
        self.allocator.abort_frame();
        self.finish_frame();
    }

    fn finish_frame(&mut self) {
        self.transition(FrameState::Done);
        self.passes.clear();
        self.graph.clear();
        self.registry.reset();
        self.bindings.clear();
        self.compiled = None;
        self.epoch = self.epoch.wrapping_add(1);
        self.frame += 1;
        self.transition(FrameState::Building);
    }

    /// Discard every declaration of the current frame. If the frame was already scheduled, its memory is released.
    pub fn reset(&mut self) {
        if self.state == FrameState::Scheduled {
            self.allocator.abort_frame();
        }
        self.finish_frame();
    }

    /// Retire all submitted frames up to and including `token`. Only call this once the GPU finished that frame.
    pub fn retire(&mut self, token: FrameToken) {
        let previous = self.state;
        self.state = FrameState::Retiring;
        self.allocator.retire(token);
        self.in_flight.retain(|pending| *pending > token);
        trace!("Retired frames of `{}` up to {}", self.settings.name, token);
        self.state = previous;
    }

    /// Retire every frame the submitter reports as complete. Returns the amount of frames retired.
    pub fn retire_completed<S: Submitter>(&mut self, submitter: &S) -> usize {
        let Some(completed) = self
            .in_flight
            .iter()
            .copied()
            .filter(|token| submitter.is_complete(*token))
            .max()
        else {
            return 0;
        };
        let count = self.in_flight.iter().filter(|token| **token <= completed).count();
        self.retire(completed);
        count
    }

    /// Block until the frame identified by `token` is complete, then retire it.
    pub fn wait_for<S: Submitter>(&mut self, token: FrameToken, submitter: &S) -> Result<()> {
        let token = futures::executor::block_on(FrameCompletion::new(submitter, token));
        self.retire(token);
        Ok(())
    }

    /// Block until every submitted frame is complete, then retire them all.
    pub fn wait_idle<S: Submitter>(&mut self, submitter: &S) -> Result<()> {
        match self.in_flight.back().copied() {
            Some(last) => self.wait_for(last, submitter),
            None => Ok(()),
        }
    }

    /// Tokens of all submitted frames that were not retired yet.
    pub fn in_flight(&self) -> impl Iterator<Item = FrameToken> + '_ {
        self.in_flight.iter().copied()
    }

    /// Statistics of the last compiled frame.
    pub fn stats(&self) -> FrameStats {
        let allocator = self.allocator.stats();
        FrameStats {
            blocks_allocated: allocator.blocks_allocated,
            resident_bytes: allocator.resident_bytes,
            ..self.stats
        }
    }
}

/// Trait that is implemented for the frame graph to help with debugging and visualizing the graph.
pub trait GraphViz {
    /// Get the string representation of this graph in `dot` format.
    fn dot(&self) -> Result<String>;

    /// Render the graph to an SVG image.
    fn svg(&self) -> Result<String> {
        let dot = self.dot()?;
        let mut parser = gv::DotParser::new(&dot);
        let graph = parser
            .process()
            .map_err(|err| anyhow!("dot render error: {}", err))?;
        let mut builder = GraphBuilder::new();
        builder.visit_graph(&graph);
        let mut visual = builder.get();
        let mut svg = SVGWriter::new();
        visual.do_it(false, false, false, &mut svg);
        Ok(svg.finalize())
    }
}

impl GraphViz for DependencyGraph {
    fn dot(&self) -> Result<String> {
        Ok(format!(
            "{}",
            Dot::with_attr_getters(&self.graph, &[], &Self::get_edge_attributes, &Self::get_node_attributes)
        ))
    }
}

impl<C: CommandRecorder, M: MemoryProvider> GraphViz for FrameGraph<'_, C, M> {
    fn dot(&self) -> Result<String> {
        self.graph.dot()
    }
}
