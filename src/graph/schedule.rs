//! The scheduler turns the dependency graph into a linear order of passes.
//!
//! Scheduling happens in three steps:
//! 1. Passes that do not (transitively) produce data for a side-effecting pass are culled.
//! 2. The remaining passes are sorted topologically. Among the passes that are ready to run, the one that was declared
//!    first is picked, so the declaration order is kept unless a dependency requires otherwise.
//! 3. The lifetime of every transient resource used by a remaining pass is computed from the order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use anyhow::Result;

use crate::allocator::transient_allocator::Lifetime;
use crate::core::error::Error;
use crate::graph::pass::Pass;
use crate::graph::registry::ResourceRegistry;
use crate::graph::task_graph::DependencyGraph;
use crate::graph::virtual_resource::VirtualResource;

/// The linearized frame.
#[derive(Debug, Default, Clone)]
pub struct Schedule {
    order: Vec<usize>,
    positions: HashMap<usize, usize>,
    culled: Vec<usize>,
    lifetimes: HashMap<VirtualResource, Lifetime>,
}

impl Schedule {
    /// Pass indices in execution order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Passes that were removed because nothing consumes their results.
    pub fn culled(&self) -> &[usize] {
        &self.culled
    }

    /// Position of a pass in the execution order, or `None` if it was culled.
    pub fn position(&self, pass: usize) -> Option<usize> {
        self.positions.get(&pass).copied()
    }

    /// Lifetime of a transient resource, or `None` if no scheduled pass uses it.
    pub fn lifetime(&self, resource: &VirtualResource) -> Option<Lifetime> {
        self.lifetimes.get(resource).copied()
    }

    /// All transient resources used by scheduled passes, with their lifetime.
    pub fn lifetimes(&self) -> impl Iterator<Item = (&VirtualResource, &Lifetime)> {
        self.lifetimes.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Find all passes that must be kept. A pass is kept if it has a side effect, or if a kept pass consumes its data.
fn live_passes(graph: &DependencyGraph, roots: &[bool]) -> Vec<bool> {
    let mut live = roots.to_vec();
    let mut stack = roots
        .iter()
        .enumerate()
        .filter_map(|(index, root)| root.then_some(index))
        .collect::<Vec<_>>();
    while let Some(pass) = stack.pop() {
        for (producer, dependency) in graph.dependencies(pass) {
            if dependency.carries_data() && !live[producer] {
                live[producer] = true;
                stack.push(producer);
            }
        }
    }
    live
}

/// Compute the execution order of a validated dependency graph.
/// # Errors
/// Fails with [`Error::CyclicDependency`] if no valid order exists.
pub fn schedule<C>(
    graph: &DependencyGraph,
    passes: &[Pass<C>],
    registry: &ResourceRegistry,
    cull: bool,
) -> Result<Schedule> {
    let count = passes.len();
    let roots = passes
        .iter()
        .map(|pass| {
            !cull || pass.has_side_effect() || pass.outputs.iter().any(|output| registry.is_imported(&output.resource))
        })
        .collect::<Vec<_>>();
    let live = live_passes(graph, &roots);

    let mut in_degree = vec![0usize; count];
    for (from, to, _) in graph.edges() {
        if live[from] && live[to] {
            in_degree[to] += 1;
        }
    }

    let mut ready = (0..count)
        .filter(|&pass| live[pass] && in_degree[pass] == 0)
        .map(Reverse)
        .collect::<BinaryHeap<_>>();
    let mut order = Vec::with_capacity(count);
    while let Some(Reverse(pass)) = ready.pop() {
        order.push(pass);
        for (next, _) in graph.dependents(pass) {
            if !live[next] {
                continue;
            }
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    let live_count = live.iter().filter(|&&live| live).count();
    if order.len() != live_count {
        let stuck = (0..count)
            .filter(|&pass| live[pass] && in_degree[pass] > 0)
            .map(|pass| passes[pass].name.clone())
            .collect();
        return Err(Error::CyclicDependency(stuck).into());
    }

    let positions = order
        .iter()
        .enumerate()
        .map(|(position, pass)| (*pass, position))
        .collect::<HashMap<_, _>>();
    let culled = (0..count).filter(|&pass| !live[pass]).collect::<Vec<_>>();

    let mut lifetimes: HashMap<VirtualResource, Lifetime> = HashMap::new();
    for (position, &pass) in order.iter().enumerate() {
        for access in passes[pass].accesses() {
            if registry.is_imported(&access.resource) {
                continue;
            }
            lifetimes
                .entry(access.resource)
                .and_modify(|lifetime| lifetime.extend(position))
                .or_insert_with(|| Lifetime::new(position, position));
        }
    }

    debug!(
        "Scheduled {} passes, culled {}: {:?}",
        order.len(),
        culled.len(),
        order.iter().map(|&pass| passes[pass].name.as_str()).collect::<Vec<_>>()
    );

    Ok(Schedule {
        order,
        positions,
        culled,
        lifetimes,
    })
}
