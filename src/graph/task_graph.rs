//! The dependency graph between passes, built incrementally as passes are declared.
//!
//! Every pass is a node. Edges point from a pass to the passes that must run after it:
//! - A pass that reads a resource depends on the last pass declared before it that writes the resource. If no such
//!   writer exists and the resource is transient, the read binds to the first writer declared later instead, which
//!   makes that writer run first.
//! - A pass that writes a resource depends on every pass that read the previous contents of the resource.
//! - A write with [`LoadOp::Load`](crate::LoadOp::Load) also reads the previous contents.
//! - Explicit [`PassBuilder::after()`](crate::PassBuilder::after()) edges.
//!
//! Two writes of the same resource must be ordered by a path through these edges, or the graph is rejected with
//! [`Error::AmbiguousWrite`].

use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use anyhow::Result;
use petgraph::algo::{has_path_connecting, is_cyclic_directed, tarjan_scc};
use petgraph::graph::{EdgeReference, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::{Direction, Graph};

use crate::core::error::Error;
use crate::graph::pass::Pass;
use crate::graph::registry::ResourceRegistry;
use crate::graph::virtual_resource::VirtualResource;

/// Why one pass must run before another.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// The target reads what the source wrote.
    ReadAfterWrite(VirtualResource),
    /// The target overwrites what the source read.
    WriteAfterRead(VirtualResource),
    /// Declared with [`PassBuilder::after()`](crate::PassBuilder::after()).
    Explicit,
}

impl Dependency {
    /// Returns true if the target consumes data produced by the source. Only these edges keep passes alive during
    /// culling. Explicit edges order passes, but do not keep them alive.
    pub fn carries_data(&self) -> bool {
        matches!(self, Dependency::ReadAfterWrite(_))
    }
}

impl Display for Dependency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Dependency::ReadAfterWrite(resource) => write!(f, "RAW {}", resource),
            Dependency::WriteAfterRead(resource) => write!(f, "WAR {}", resource),
            Dependency::Explicit => write!(f, "after"),
        }
    }
}

/// A pass in the dependency graph.
#[derive(Debug, Clone)]
pub struct PassNode {
    pub(crate) index: usize,
    pub(crate) name: String,
    pub(crate) side_effect: bool,
}

impl Display for PassNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.index, self.name)
    }
}

#[derive(Debug, Default)]
struct ResourceHistory {
    last_writer: Option<usize>,
    // Passes that read the contents of `last_writer`.
    readers: Vec<usize>,
    // Reads of a transient resource declared before its first writer.
    unbound_readers: Vec<usize>,
}

/// Dependency graph over the passes of one frame.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    pub(crate) graph: Graph<PassNode, Dependency>,
    history: HashMap<VirtualResource, ResourceHistory>,
    // Pairs of writers of the same resource that must be ordered.
    write_pairs: Vec<(usize, usize, VirtualResource)>,
}

impl DependencyGraph {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    fn node(index: usize) -> NodeIndex {
        NodeIndex::new(index)
    }

    /// Amount of passes in the graph.
    pub fn num_passes(&self) -> usize {
        self.graph.node_count()
    }

    /// Iterate over all edges as `(from, to, dependency)` triples of pass indices.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize, Dependency)> + '_ {
        self.graph
            .edge_references()
            .map(|edge| (edge.source().index(), edge.target().index(), *edge.weight()))
    }

    /// Passes that must run before `pass`, with the reason.
    pub fn dependencies(&self, pass: usize) -> impl Iterator<Item = (usize, Dependency)> + '_ {
        self.graph
            .edges_directed(Self::node(pass), Direction::Incoming)
            .map(|edge| (edge.source().index(), *edge.weight()))
    }

    /// Passes that must run after `pass`, with the reason.
    pub fn dependents(&self, pass: usize) -> impl Iterator<Item = (usize, Dependency)> + '_ {
        self.graph
            .edges_directed(Self::node(pass), Direction::Outgoing)
            .map(|edge| (edge.target().index(), *edge.weight()))
    }

    /// Returns true if there is an edge from `from` to `to`.
    pub fn depends_on(&self, to: usize, from: usize) -> bool {
        self.graph.find_edge(Self::node(from), Self::node(to)).is_some()
    }

    fn add_edge(&mut self, from: usize, to: usize, dependency: Dependency) {
        if from == to {
            return;
        }
        let (from, to) = (Self::node(from), Self::node(to));
        let exists = self
            .graph
            .edges_connecting(from, to)
            .any(|edge| *edge.weight() == dependency);
        if !exists {
            self.graph.add_edge(from, to, dependency);
        }
    }

    /// Add a pass to the graph and record its edges. Passes must be added in declaration order, and must already
    /// be validated against the registry.
    pub fn add_pass<C>(&mut self, pass: &Pass<C>, side_effect: bool, registry: &ResourceRegistry) -> Result<usize> {
        let index = self.graph.add_node(PassNode {
            index: self.graph.node_count(),
            name: pass.name.clone(),
            side_effect,
        });
        let index = index.index();

        for after in &pass.after {
            self.add_edge(after.index(), index, Dependency::Explicit);
        }

        for input in &pass.inputs {
            let resource = input.resource;
            let transient = !registry.is_imported(&resource);
            let history = self.history.entry(resource).or_default();
            match history.last_writer {
                Some(writer) => {
                    history.readers.push(index);
                    self.add_edge(writer, index, Dependency::ReadAfterWrite(resource));
                }
                None if transient => history.unbound_readers.push(index),
                None => history.readers.push(index),
            }
        }

        for output in &pass.outputs {
            let resource = output.resource;
            let history = self.history.entry(resource).or_default();
            let previous = history.last_writer;
            let readers = std::mem::take(&mut history.readers);
            let unbound = std::mem::take(&mut history.unbound_readers);
            history.last_writer = Some(index);
            history.readers = unbound.clone();

            if let Some(writer) = previous {
                if output.preserves_contents() {
                    self.add_edge(writer, index, Dependency::ReadAfterWrite(resource));
                }
                self.write_pairs.push((writer, index, resource));
            }
            for reader in readers {
                self.add_edge(reader, index, Dependency::WriteAfterRead(resource));
            }
            for reader in unbound {
                self.add_edge(index, reader, Dependency::ReadAfterWrite(resource));
            }
        }

        trace!("Added pass `{}` as node {} of the dependency graph", pass.name, index);
        Ok(index)
    }

    /// Check that the graph can be linearized.
    /// # Errors
    /// * Fails with [`Error::CyclicDependency`] if the edges form a cycle.
    /// * Fails with [`Error::AmbiguousWrite`] if two writes of the same resource are not ordered.
    pub fn validate(&self, registry: &ResourceRegistry) -> Result<()> {
        if is_cyclic_directed(&self.graph) {
            let cycle = tarjan_scc(&self.graph)
                .into_iter()
                .filter(|component| component.len() > 1)
                .min_by_key(|component| component.iter().map(|node| node.index()).min())
                .unwrap_or_default();
            let mut cycle = cycle.into_iter().map(|node| node.index()).collect::<Vec<_>>();
            cycle.sort_unstable();
            let names = cycle
                .into_iter()
                .map(|index| self.graph[Self::node(index)].name.clone())
                .collect::<Vec<_>>();
            return Err(Error::CyclicDependency(names).into());
        }

        for (first, second, resource) in &self.write_pairs {
            if !has_path_connecting(&self.graph, Self::node(*first), Self::node(*second), None) {
                return Err(Error::AmbiguousWrite {
                    resource: registry.name_of(resource),
                    first: self.graph[Self::node(*first)].name.clone(),
                    second: self.graph[Self::node(*second)].name.clone(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Remove all passes and edges.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.history.clear();
        self.write_pairs.clear();
    }

    pub(crate) fn get_edge_attributes(_: &Graph<PassNode, Dependency>, edge: EdgeReference<Dependency>) -> String {
        match edge.weight() {
            Dependency::ReadAfterWrite(_) => String::from(""),
            Dependency::WriteAfterRead(_) => String::from("style = dashed"),
            Dependency::Explicit => String::from("style = dotted"),
        }
    }

    pub(crate) fn get_node_attributes(_: &Graph<PassNode, Dependency>, node: (NodeIndex, &PassNode)) -> String {
        if node.1.side_effect {
            String::from("fillcolor = \"#f75e70\" style = filled")
        } else {
            String::from("fillcolor = \"#5e6df7\" style = filled")
        }
    }
}
