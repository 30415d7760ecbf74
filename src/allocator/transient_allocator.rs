//! An aliasing allocator for transient frame graph resources.
//!
//! Every frame, the allocator receives the memory requirements and [`Lifetime`] of each transient resource that
//! survived scheduling, and builds a [`MemoryPlan`] from them. Resources are grouped by memory class and alignment.
//! Within a group, a linear scan over the lifetimes (sorted by first use) assigns each resource to a *slot*: a byte
//! range of the block that is reused once its previous occupant is dead. This is interval graph coloring, so the
//! amount of slots equals the largest amount of resources that are alive at the same time.
//!
//! Backing blocks for a plan are acquired from a pool of retired blocks, or requested from the
//! [`MemoryProvider`]. Blocks used by a submitted frame are only returned to the pool once that frame's
//! [`FrameToken`] is retired, which callers must only do after the GPU has signaled completion.
//!
//! # Example
//! ```
//! # use deimos::prelude::*;
//! # use anyhow::Result;
//! fn plan<M: MemoryProvider>(allocator: &mut TransientAllocator<M>, a: VirtualResource, b: VirtualResource) -> Result<()> {
//!     let requirements = MemoryRequirements {
//!         size: 1024,
//!         alignment: 256,
//!         class: MemoryClass::Buffer,
//!     };
//!     let plan = allocator.plan(&[
//!         TransientRequest { resource: a, requirements, lifetime: Lifetime::new(0, 1) },
//!         TransientRequest { resource: b, requirements, lifetime: Lifetime::new(2, 3) },
//!     ]);
//!     // Lifetimes do not overlap, so both resources share the same memory.
//!     assert_eq!(plan.placement(&a).unwrap().offset, plan.placement(&b).unwrap().offset);
//!     Ok(())
//! }
//! ```

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use anyhow::Result;

use crate::allocator::memory_type::{MemoryClass, MemoryRequirements};
use crate::allocator::traits::{BlockHandle, MemoryProvider};
use crate::core::error::Error;
use crate::core::settings::{AliasingMode, GraphSettings};
use crate::graph::physical_resource::PhysicalResource;
use crate::graph::resource::ResourceDescription;
use crate::graph::virtual_resource::VirtualResource;
use crate::sync::frame_token::FrameToken;
use crate::util::align::align;
use crate::util::deferred_delete::DeletionQueue;

/// Inclusive range of positions in the execution order during which a transient resource is alive.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Lifetime {
    /// Position of the first pass that accesses the resource.
    pub first: usize,
    /// Position of the last pass that accesses the resource.
    pub last: usize,
}

impl Lifetime {
    pub fn new(first: usize, last: usize) -> Self {
        Self {
            first: first.min(last),
            last: last.max(first),
        }
    }

    /// Returns true if both lifetimes share at least one pass.
    pub fn overlaps(&self, other: &Lifetime) -> bool {
        !(self.last < other.first || other.last < self.first)
    }

    /// Returns true if the pass at `index` lies within this lifetime.
    pub fn contains(&self, index: usize) -> bool {
        self.first <= index && index <= self.last
    }

    /// Extend the lifetime to include `index`.
    pub fn extend(&mut self, index: usize) {
        self.first = self.first.min(index);
        self.last = self.last.max(index);
    }
}

/// A transient resource that needs memory for a frame.
#[derive(Debug, Copy, Clone)]
pub struct TransientRequest {
    pub resource: VirtualResource,
    pub requirements: MemoryRequirements,
    pub lifetime: Lifetime,
}

/// Where a transient resource lives inside the blocks of a [`MemoryPlan`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Placement {
    /// Index of the block in [`MemoryPlan::blocks()`].
    pub block: usize,
    /// Byte offset inside the block.
    pub offset: u64,
    /// Size of the resource in bytes.
    pub size: u64,
    /// The resource that used this memory before, if any.
    pub previous: Option<VirtualResource>,
}

/// A block of memory a [`MemoryPlan`] needs.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PlannedBlock {
    pub class: MemoryClass,
    pub alignment: u64,
    pub size: u64,
}

/// Result of [`TransientAllocator::plan()`].
#[derive(Debug, Default, Clone)]
pub struct MemoryPlan {
    placements: HashMap<VirtualResource, Placement>,
    lifetimes: HashMap<VirtualResource, Lifetime>,
    blocks: Vec<PlannedBlock>,
}

impl MemoryPlan {
    /// Get the placement of a resource.
    pub fn placement(&self, resource: &VirtualResource) -> Option<&Placement> {
        self.placements.get(resource)
    }

    /// Iterate over all placements in the plan.
    pub fn placements(&self) -> impl Iterator<Item = (&VirtualResource, &Placement)> {
        self.placements.iter()
    }

    /// Get the lifetime a resource was planned with.
    pub fn lifetime(&self, resource: &VirtualResource) -> Option<Lifetime> {
        self.lifetimes.get(resource).copied()
    }

    /// All blocks this plan needs.
    pub fn blocks(&self) -> &[PlannedBlock] {
        &self.blocks
    }

    /// Total amount of bytes the plan needs.
    pub fn total_size(&self) -> u64 {
        self.blocks.iter().map(|block| block.size).sum()
    }

    /// Returns true if the byte ranges of two placements overlap.
    pub fn memory_overlaps(&self, a: &VirtualResource, b: &VirtualResource) -> bool {
        let (Some(a), Some(b)) = (self.placement(a), self.placement(b)) else {
            return false;
        };
        a.block == b.block && a.offset < b.offset + b.size && b.offset < a.offset + a.size
    }
}

#[derive(Debug)]
struct Slot {
    size: u64,
    last_use: usize,
    occupant: VirtualResource,
    members: Vec<VirtualResource>,
}

/// A block of device memory owned by the transient allocator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PhysicalBlock {
    pub handle: BlockHandle,
    pub class: MemoryClass,
    pub alignment: u64,
    pub size: u64,
}

impl PhysicalBlock {
    fn fits(&self, planned: &PlannedBlock) -> bool {
        self.class == planned.class && self.alignment % planned.alignment == 0 && self.size >= planned.size
    }
}

/// Allocation statistics of the transient allocator.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct AllocatorStats {
    /// Amount of blocks requested from the memory provider since creation.
    pub blocks_allocated: usize,
    /// Amount of blocks returned to the memory provider since creation.
    pub blocks_freed: usize,
    /// Amount of resources realized since the last plan.
    pub realized: usize,
    /// Bytes currently owned by the allocator, in use or not.
    pub resident_bytes: u64,
}

/// Aliasing allocator for transient resources. See the [module level documentation](self).
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct TransientAllocator<M: MemoryProvider> {
    #[derivative(Debug = "ignore")]
    provider: M,
    aliasing: AliasingMode,
    block_size: u64,
    memory_budget: Option<u64>,
    /// Blocks that no frame uses. Freed once they were idle for too long.
    free: DeletionQueue<PhysicalBlock>,
    /// Blocks acquired for the frame that is currently being built or executed.
    in_use: Vec<PhysicalBlock>,
    /// Blocks of submitted frames, waiting for the GPU to finish.
    pending: VecDeque<(FrameToken, Vec<PhysicalBlock>)>,
    plan: MemoryPlan,
    realized: HashSet<VirtualResource>,
    stats: AllocatorStats,
}

impl<M: MemoryProvider> TransientAllocator<M> {
    /// Create a new transient allocator on top of a memory provider.
    pub fn new(provider: M, settings: &GraphSettings) -> Self {
        Self {
            provider,
            aliasing: settings.aliasing,
            block_size: settings.block_size,
            memory_budget: settings.memory_budget,
            free: DeletionQueue::new(settings.max_idle_frames.max(1)),
            in_use: vec![],
            pending: VecDeque::new(),
            plan: MemoryPlan::default(),
            realized: HashSet::new(),
            stats: AllocatorStats::default(),
        }
    }

    /// Get the memory provider.
    pub fn provider(&self) -> &M {
        &self.provider
    }

    /// Get mutable access to the memory provider.
    pub fn provider_mut(&mut self) -> &mut M {
        &mut self.provider
    }

    /// Memory requirements of a resource, as reported by the memory provider.
    pub fn requirements(&self, description: &ResourceDescription) -> MemoryRequirements {
        self.provider.requirements(description)
    }

    /// Compute a memory plan for a set of transient resources. This does not allocate anything.
    ///
    /// Any two resources whose byte ranges overlap in the resulting plan have disjoint lifetimes.
    pub fn plan(&self, requests: &[TransientRequest]) -> MemoryPlan {
        let mut groups: BTreeMap<(MemoryClass, u64), Vec<(usize, &TransientRequest)>> = BTreeMap::new();
        for (index, request) in requests.iter().enumerate() {
            let alignment = request.requirements.alignment.max(1);
            groups
                .entry((request.requirements.class, alignment))
                .or_default()
                .push((index, request));
        }

        let mut plan = MemoryPlan::default();
        for ((class, alignment), mut group) in groups {
            group.sort_by_key(|(index, request)| (request.lifetime.first, *index));
            let mut slots: Vec<Slot> = Vec::new();
            let mut previous = HashMap::new();
            for (_, request) in &group {
                let size = align(request.requirements.size.max(1), alignment);
                let slot = match self.aliasing {
                    AliasingMode::Disabled => None,
                    AliasingMode::SameClass => Self::find_slot(&slots, request.lifetime, size),
                };
                match slot {
                    Some(index) => {
                        let slot = &mut slots[index];
                        previous.insert(request.resource, slot.occupant);
                        slot.size = slot.size.max(size);
                        slot.last_use = request.lifetime.last;
                        slot.occupant = request.resource;
                        slot.members.push(request.resource);
                    }
                    None => slots.push(Slot {
                        size,
                        last_use: request.lifetime.last,
                        occupant: request.resource,
                        members: vec![request.resource],
                    }),
                }
                plan.lifetimes.insert(request.resource, request.lifetime);
            }

            let block = plan.blocks.len();
            let mut offset = 0;
            for slot in &slots {
                for member in &slot.members {
                    let size = group
                        .iter()
                        .find(|(_, request)| request.resource == *member)
                        .map(|(_, request)| align(request.requirements.size.max(1), alignment))
                        .unwrap_or(slot.size);
                    plan.placements.insert(*member, Placement {
                        block,
                        offset,
                        size,
                        previous: previous.get(member).copied(),
                    });
                }
                offset += slot.size;
            }
            trace!("Planned {} resources of class {:?} into {} slots ({} bytes)", group.len(), class, slots.len(), offset);
            plan.blocks.push(PlannedBlock {
                class,
                alignment,
                size: offset,
            });
        }
        plan
    }

    // A slot is free for a lifetime once its last occupant died before the lifetime starts.
    // Prefer the smallest free slot that fits, otherwise grow the largest free slot.
    fn find_slot(slots: &[Slot], lifetime: Lifetime, size: u64) -> Option<usize> {
        let free = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.last_use < lifetime.first);
        let mut best_fit: Option<(usize, u64)> = None;
        let mut largest: Option<(usize, u64)> = None;
        for (index, slot) in free {
            if slot.size >= size && best_fit.map_or(true, |(_, best)| slot.size < best) {
                best_fit = Some((index, slot.size));
            }
            if largest.map_or(true, |(_, best)| slot.size > best) {
                largest = Some((index, slot.size));
            }
        }
        best_fit.or(largest).map(|(index, _)| index)
    }

    /// Plan the given resources and acquire backing blocks for the plan, reusing retired blocks where possible.
    /// # Errors
    /// * Fails with [`Error::OutOfMemory`] if the memory budget cannot fit the plan, even after releasing idle blocks.
    /// * Fails with [`Error::AllocationFailure`] if the memory provider cannot allocate a new block.
    ///
    /// On failure, every block acquired for this frame is released again.
    pub fn allocate(&mut self, requests: &[TransientRequest]) -> Result<&MemoryPlan> {
        if !self.in_use.is_empty() {
            warn!("Transient allocator planned a new frame while the previous frame was not submitted. Releasing its blocks.");
            self.abort_frame();
        }
        self.plan = self.plan(requests);
        self.realized.clear();
        self.stats.realized = 0;
        let planned = self.plan.blocks.clone();
        for planned in &planned {
            match self.acquire_block(planned) {
                Ok(block) => self.in_use.push(block),
                Err(err) => {
                    self.abort_frame();
                    return Err(err);
                }
            }
        }
        // Only blocks this frame could not reuse age.
        if let Err(err) = self.expire_idle_blocks() {
            self.abort_frame();
            return Err(err);
        }
        debug!(
            "Transient plan: {} resources in {} blocks, {} bytes (unaliased {} bytes)",
            requests.len(),
            planned.len(),
            self.plan.total_size(),
            requests.iter().map(|request| request.requirements.size).sum::<u64>()
        );
        Ok(&self.plan)
    }

    fn acquire_block(&mut self, planned: &PlannedBlock) -> Result<PhysicalBlock> {
        if let Some(block) = self.free.take_best(|block| block.fits(planned).then_some(block.size)) {
            return Ok(block);
        }

        let size = align(planned.size.max(self.block_size), planned.alignment);
        if let Some(budget) = self.memory_budget {
            // Escalate by releasing idle blocks that were too small or of the wrong class.
            while self.resident_bytes() + size > budget {
                let Some(block) = self.free.take_best(|block| Some(std::cmp::Reverse(block.size))) else {
                    return Err(Error::OutOfMemory {
                        requested: self.resident_bytes() + size,
                        budget,
                    }
                    .into());
                };
                self.free_block(block)?;
            }
        }

        let handle = self
            .provider
            .allocate_block(size, planned.alignment, planned.class)
            .map_err(|err| Error::AllocationFailure(err.to_string()))?;
        self.stats.blocks_allocated += 1;
        #[cfg(feature = "log-objects")]
        trace!("Allocated transient block {:?} of {} bytes ({:?})", handle, size, planned.class);
        Ok(PhysicalBlock {
            handle,
            class: planned.class,
            alignment: planned.alignment,
            size,
        })
    }

    fn free_block(&mut self, block: PhysicalBlock) -> Result<()> {
        self.provider.free_block(block.handle)?;
        self.stats.blocks_freed += 1;
        #[cfg(feature = "log-objects")]
        trace!("Freed transient block {:?} of {} bytes ({:?})", block.handle, block.size, block.class);
        Ok(())
    }

    fn expire_idle_blocks(&mut self) -> Result<()> {
        for block in self.free.next_frame() {
            self.free_block(block)?;
        }
        Ok(())
    }

    /// Bind physical memory to a transient resource of the current plan. Realizing the same resource twice
    /// returns the same physical resource.
    /// # Errors
    /// Fails with [`Error::NoResourceBound`] if the resource is not part of the current plan.
    pub fn realize(&mut self, resource: &VirtualResource) -> Result<PhysicalResource> {
        let placement = self
            .plan
            .placement(resource)
            .ok_or_else(|| Error::NoResourceBound(resource.to_string()))?;
        let block = self
            .in_use
            .get(placement.block)
            .ok_or_else(|| Error::NoResourceBound(resource.to_string()))?;
        if self.realized.insert(*resource) {
            self.stats.realized += 1;
        }
        Ok(PhysicalResource::Transient {
            block: block.handle,
            offset: placement.offset,
            size: placement.size,
        })
    }

    /// Returns true if the resource was realized since the last plan.
    pub fn is_realized(&self, resource: &VirtualResource) -> bool {
        self.realized.contains(resource)
    }

    /// The plan of the current frame.
    pub fn current_plan(&self) -> &MemoryPlan {
        &self.plan
    }

    /// Hand the blocks of the current frame over to the GPU. They stay unavailable until `token` is retired.
    pub fn defer(&mut self, token: FrameToken) {
        if let Some((last, _)) = self.pending.back() {
            if *last >= token {
                warn!("Frame token {:?} submitted after {:?}. Frame tokens should be increasing.", token, last);
            }
        }
        let blocks = std::mem::take(&mut self.in_use);
        self.pending.push_back((token, blocks));
    }

    /// Release the blocks of the current frame without submitting it. Only valid if nothing from this frame
    /// reached the GPU.
    pub fn abort_frame(&mut self) {
        for block in self.in_use.drain(..) {
            self.free.push(block);
        }
        self.realized.clear();
    }

    /// Mark all blocks used by frames at or before `token` as reclaimable. Must only be called once the GPU
    /// has finished all work of that frame.
    pub fn retire(&mut self, token: FrameToken) {
        let mut retired = 0;
        let mut still_pending = VecDeque::with_capacity(self.pending.len());
        for (pending, blocks) in self.pending.drain(..) {
            if pending <= token {
                retired += blocks.len();
                for block in blocks {
                    self.free.push(block);
                }
            } else {
                still_pending.push_back((pending, blocks));
            }
        }
        self.pending = still_pending;
        trace!("Retired {} blocks up to {:?}", retired, token);
    }

    /// Tokens of all frames that still hold blocks.
    pub fn pending_tokens(&self) -> impl Iterator<Item = FrameToken> + '_ {
        self.pending.iter().map(|(token, _)| *token)
    }

    /// Handles of blocks that are free for reuse.
    pub fn free_blocks(&self) -> impl Iterator<Item = BlockHandle> + '_ {
        self.free.iter().map(|block| block.handle)
    }

    /// Handles of blocks used by the current frame.
    pub fn blocks_in_use(&self) -> impl Iterator<Item = BlockHandle> + '_ {
        self.in_use.iter().map(|block| block.handle)
    }

    /// Bytes currently owned by the allocator.
    pub fn resident_bytes(&self) -> u64 {
        let free: u64 = self.free.iter().map(|block| block.size).sum();
        let in_use: u64 = self.in_use.iter().map(|block| block.size).sum();
        let pending: u64 = self
            .pending
            .iter()
            .flat_map(|(_, blocks)| blocks.iter())
            .map(|block| block.size)
            .sum();
        free + in_use + pending
    }

    /// Get allocation statistics.
    pub fn stats(&self) -> AllocatorStats {
        AllocatorStats {
            resident_bytes: self.resident_bytes(),
            ..self.stats
        }
    }

    /// Return every block that is not in use by a submitted frame to the memory provider.
    pub fn release_idle(&mut self) -> Result<()> {
        let idle = self.free.drain().collect::<Vec<_>>();
        for block in idle {
            self.free_block(block)?;
        }
        Ok(())
    }
}

impl<M: MemoryProvider> Drop for TransientAllocator<M> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            warn!(
                "Dropping transient allocator with {} frames in flight. Their blocks are not freed.",
                self.pending.len()
            );
        }
        self.abort_frame();
        if let Err(err) = self.release_idle() {
            error!("Failed to free transient memory blocks: {}", err);
        }
    }
}
