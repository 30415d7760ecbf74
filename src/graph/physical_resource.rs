use std::collections::HashMap;

use anyhow::Result;

use crate::allocator::traits::BlockHandle;
use crate::core::error::Error;
use crate::graph::registry::ExternalHandle;
use crate::graph::virtual_resource::VirtualResource;

/// Describes the physical memory behind a virtual resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PhysicalResource {
    /// An externally owned resource.
    Imported(ExternalHandle),
    /// A range of a transient memory block.
    Transient {
        block: BlockHandle,
        offset: u64,
        size: u64,
    },
}

impl PhysicalResource {
    /// Returns true if both resources use overlapping bytes of the same block.
    pub fn overlaps(&self, other: &PhysicalResource) -> bool {
        match (self, other) {
            (
                PhysicalResource::Transient {
                    block: a,
                    offset: a_offset,
                    size: a_size,
                },
                PhysicalResource::Transient {
                    block: b,
                    offset: b_offset,
                    size: b_size,
                },
            ) => a == b && *a_offset < b_offset + b_size && *b_offset < a_offset + a_size,
            (PhysicalResource::Imported(a), PhysicalResource::Imported(b)) => a == b,
            _ => false,
        }
    }
}

/// Stores bindings from virtual resources to physical resources. Pass callbacks receive this to look up the
/// resources they declared.
/// # Example usage
/// ```
/// # use deimos::prelude::*;
/// # use anyhow::Result;
/// fn lookup(bindings: &PhysicalResourceBindings, color: &VirtualResource) -> Result<()> {
///     match bindings.get(color)? {
///         PhysicalResource::Imported(handle) => println!("imported {:?}", handle),
///         PhysicalResource::Transient { block, offset, .. } => println!("{:?} at {}", block, offset),
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Default, Clone)]
pub struct PhysicalResourceBindings {
    bindings: HashMap<VirtualResource, PhysicalResource>,
}

impl PhysicalResourceBindings {
    /// Create a new physical resource binding map.
    pub fn new() -> Self {
        PhysicalResourceBindings {
            bindings: Default::default(),
        }
    }

    /// Bind a physical resource to a virtual resource, replacing the previous binding.
    pub fn bind(&mut self, resource: VirtualResource, physical: PhysicalResource) {
        self.bindings.insert(resource, physical);
    }

    /// Resolve a virtual resource to a physical resource. Returns `None` if the resource was not found.
    pub fn resolve(&self, resource: &VirtualResource) -> Option<&PhysicalResource> {
        self.bindings.get(resource)
    }

    /// Resolve a virtual resource to a physical resource.
    /// # Errors
    /// Fails with [`Error::NoResourceBound`] if nothing was bound to the resource.
    pub fn get(&self, resource: &VirtualResource) -> Result<&PhysicalResource> {
        self.resolve(resource)
            .ok_or_else(|| Error::NoResourceBound(resource.to_string()).into())
    }

    pub fn contains(&self, resource: &VirtualResource) -> bool {
        self.bindings.contains_key(resource)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VirtualResource, &PhysicalResource)> {
        self.bindings.iter()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Remove all bindings.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }
}
