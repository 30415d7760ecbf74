//! The barrier manager derives the state transitions and synchronization points of a scheduled frame.
//!
//! For every resource, accesses are walked in execution order. A barrier is placed before an access unless both it
//! and the previous access are reads in the same state. The first use of a transient resource always gets a barrier,
//! since its contents start out undefined. If its memory was used by another resource earlier in the frame, the
//! barrier also synchronizes against the last use of that resource.

use multimap::MultiMap;

use crate::allocator::transient_allocator::MemoryPlan;
use crate::graph::pass::Pass;
use crate::graph::registry::ResourceRegistry;
use crate::graph::resource::{PipelineStage, ResourceState};
use crate::graph::schedule::Schedule;
use crate::graph::virtual_resource::VirtualResource;

/// A resource state transition, positioned right before the pass that needs it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Barrier {
    pub resource: VirtualResource,
    pub src_state: ResourceState,
    pub dst_state: ResourceState,
    pub src_stage: PipelineStage,
    pub dst_stage: PipelineStage,
    /// Position of the pass that last accessed the resource (or the previous occupant of its memory), if any.
    pub producer: Option<usize>,
    /// Position of the pass that needs the transition.
    pub consumer: usize,
    /// Resource that used the same memory before, for the first use of an aliased resource.
    pub previous_occupant: Option<VirtualResource>,
}

impl Barrier {
    /// Returns true if the barrier changes the state of the resource.
    pub fn is_transition(&self) -> bool {
        self.src_state != self.dst_state
    }
}

#[derive(Debug, Copy, Clone)]
struct Access {
    position: usize,
    state: ResourceState,
    stage: PipelineStage,
    is_read: bool,
}

/// All barriers of a frame, grouped by the position of the pass they are recorded before.
#[derive(Debug, Default, Clone)]
pub struct BarrierPlan {
    barriers: MultiMap<usize, Barrier>,
    final_states: Vec<(VirtualResource, ResourceState)>,
}

impl BarrierPlan {
    /// Barriers to record before the pass at `position`.
    pub fn before(&self, position: usize) -> &[Barrier] {
        self.barriers
            .get_vec(&position)
            .map(|barriers| barriers.as_slice())
            .unwrap_or(&[])
    }

    /// Iterate over all barriers of the frame.
    pub fn iter(&self) -> impl Iterator<Item = &Barrier> {
        self.barriers.iter_all().flat_map(|(_, barriers)| barriers.iter())
    }

    /// Barriers on a single resource, in execution order.
    pub fn for_resource(&self, resource: &VirtualResource) -> Vec<Barrier> {
        let mut barriers = self
            .iter()
            .filter(|barrier| barrier.resource == *resource)
            .copied()
            .collect::<Vec<_>>();
        barriers.sort_by_key(|barrier| barrier.consumer);
        barriers
    }

    pub fn len(&self) -> usize {
        self.barriers.iter_all().map(|(_, barriers)| barriers.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.barriers.is_empty()
    }

    /// State every accessed imported resource is left in at the end of the frame.
    pub fn final_states(&self) -> &[(VirtualResource, ResourceState)] {
        &self.final_states
    }
}

/// Derive all barriers of a scheduled frame.
pub fn derive_barriers<C>(
    schedule: &Schedule,
    passes: &[Pass<C>],
    registry: &ResourceRegistry,
    memory: &MemoryPlan,
) -> BarrierPlan {
    let mut accesses: MultiMap<VirtualResource, Access> = MultiMap::new();
    for (position, &pass) in schedule.order().iter().enumerate() {
        for access in passes[pass].accesses() {
            accesses.insert(
                access.resource,
                Access {
                    position,
                    state: access.usage.state(),
                    stage: access.stage,
                    is_read: access.usage.is_read(),
                },
            );
        }
    }

    // Stage of the last access of every resource, needed to synchronize against previous occupants.
    let last_stage = accesses
        .iter_all()
        .filter_map(|(resource, list)| list.last().map(|access| (*resource, access.stage)))
        .collect::<std::collections::HashMap<_, _>>();

    let mut resources = accesses.keys().copied().collect::<Vec<_>>();
    resources.sort();

    let mut plan = BarrierPlan::default();
    for resource in resources {
        let Some(list) = accesses.get_vec(&resource) else {
            continue;
        };
        let Ok(entry) = registry.get(&resource) else {
            continue;
        };

        let mut previous = if entry.is_imported() {
            let state = entry.initial_state();
            Some(Access {
                position: 0,
                state,
                stage: if state == ResourceState::Undefined {
                    PipelineStage::NONE
                } else {
                    PipelineStage::ALL_COMMANDS
                },
                is_read: true,
            })
        } else {
            None
        };

        for (index, access) in list.iter().enumerate() {
            let barrier = match previous {
                // The initial state of imported resources comes from a previous frame.
                Some(prev) if index == 0 => {
                    (!(prev.is_read && access.is_read && prev.state == access.state)).then(|| Barrier {
                        resource,
                        src_state: prev.state,
                        dst_state: access.state,
                        src_stage: prev.stage,
                        dst_stage: access.stage,
                        producer: None,
                        consumer: access.position,
                        previous_occupant: None,
                    })
                }
                Some(prev) => (!(prev.is_read && access.is_read && prev.state == access.state)).then(|| Barrier {
                    resource,
                    src_state: prev.state,
                    dst_state: access.state,
                    src_stage: prev.stage,
                    dst_stage: access.stage,
                    producer: Some(prev.position),
                    consumer: access.position,
                    previous_occupant: None,
                }),
                None => {
                    let occupant = memory.placement(&resource).and_then(|placement| placement.previous);
                    let occupant_end = occupant.and_then(|occupant| memory.lifetime(&occupant));
                    Some(Barrier {
                        resource,
                        src_state: ResourceState::Undefined,
                        dst_state: access.state,
                        src_stage: occupant
                            .and_then(|occupant| last_stage.get(&occupant).copied())
                            .unwrap_or(PipelineStage::NONE),
                        dst_stage: access.stage,
                        producer: occupant_end.map(|lifetime| lifetime.last),
                        consumer: access.position,
                        previous_occupant: occupant,
                    })
                }
            };
            if let Some(barrier) = barrier {
                plan.barriers.insert(barrier.consumer, barrier);
            }
            previous = Some(*access);
        }

        if entry.is_imported() {
            if let Some(last) = list.last() {
                plan.final_states.push((resource, last.state));
            }
        }
    }

    debug!("Derived {} barriers for {} passes", plan.len(), schedule.len());
    plan
}
