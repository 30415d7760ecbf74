//! The resource registry tracks every resource declared in a frame, and remembers the state of imported resources
//! across frames.

use std::collections::HashMap;

use anyhow::Result;

use crate::core::error::Error;
use crate::graph::resource::{ResourceDescription, ResourceState};
use crate::graph::virtual_resource::VirtualResource;

/// Opaque handle to an externally owned resource, such as a swapchain image.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalHandle(pub u64);

/// Where the memory of a resource comes from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceOrigin {
    /// Memory is owned by the transient allocator and only lives during part of the frame.
    Transient,
    /// Memory is owned by someone else.
    Imported(ExternalHandle),
}

/// A resource known to the registry.
#[derive(Debug, Clone)]
pub struct ResourceEntry {
    name: String,
    handle: VirtualResource,
    description: ResourceDescription,
    origin: ResourceOrigin,
    initial_state: ResourceState,
}

impl ResourceEntry {
    /// Debug name of the resource.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> VirtualResource {
        self.handle
    }

    pub fn description(&self) -> &ResourceDescription {
        &self.description
    }

    pub fn origin(&self) -> ResourceOrigin {
        self.origin
    }

    /// State the resource is in at the start of the frame. Always [`ResourceState::Undefined`] for transient resources.
    pub fn initial_state(&self) -> ResourceState {
        self.initial_state
    }

    /// Returns true if the resource is owned externally.
    pub fn is_imported(&self) -> bool {
        matches!(self.origin, ResourceOrigin::Imported(_))
    }
}

/// Tracks resource descriptions for the current frame.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    epoch: u32,
    resources: Vec<ResourceEntry>,
    imported_states: HashMap<ExternalHandle, ResourceState>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(
        &mut self,
        name: String,
        description: ResourceDescription,
        origin: ResourceOrigin,
        initial_state: ResourceState,
    ) -> VirtualResource {
        let handle = VirtualResource::new(self.resources.len() as u32, self.epoch, description.resource_type());
        self.resources.push(ResourceEntry {
            name,
            handle,
            description,
            origin,
            initial_state,
        });
        handle
    }

    /// Declare a transient resource.
    pub fn declare(&mut self, name: impl Into<String>, description: impl Into<ResourceDescription>) -> VirtualResource {
        self.push(name.into(), description.into(), ResourceOrigin::Transient, ResourceState::Undefined)
    }

    /// Import an externally owned resource. It starts in the state it was left in by the last frame that used it, or
    /// [`ResourceState::Undefined`] if no frame used it yet.
    pub fn import(
        &mut self,
        name: impl Into<String>,
        handle: ExternalHandle,
        description: impl Into<ResourceDescription>,
    ) -> VirtualResource {
        let state = self.imported_states.get(&handle).copied().unwrap_or_default();
        self.push(name.into(), description.into(), ResourceOrigin::Imported(handle), state)
    }

    /// Import an externally owned resource that is known to be in `state`. This overrides the remembered state,
    /// for example after the resource was used outside the frame graph.
    pub fn import_with_state(
        &mut self,
        name: impl Into<String>,
        handle: ExternalHandle,
        description: impl Into<ResourceDescription>,
        state: ResourceState,
    ) -> VirtualResource {
        self.imported_states.insert(handle, state);
        self.push(name.into(), description.into(), ResourceOrigin::Imported(handle), state)
    }

    /// Look up a resource.
    /// # Errors
    /// Fails with [`Error::UnknownResource`] if the handle was not declared in the current frame.
    pub fn get(&self, resource: &VirtualResource) -> Result<&ResourceEntry> {
        self.resources
            .get(resource.index())
            .filter(|entry| resource.epoch == self.epoch && entry.handle == *resource)
            .ok_or_else(|| Error::UnknownResource(*resource).into())
    }

    /// Returns true if the handle refers to a resource of the current frame.
    pub fn contains(&self, resource: &VirtualResource) -> bool {
        self.get(resource).is_ok()
    }

    pub fn is_imported(&self, resource: &VirtualResource) -> bool {
        self.get(resource).map_or(false, |entry| entry.is_imported())
    }

    /// Debug name of a resource, or its handle if it is unknown.
    pub fn name_of(&self, resource: &VirtualResource) -> String {
        self.get(resource)
            .map(|entry| entry.name.clone())
            .unwrap_or_else(|_| resource.to_string())
    }

    /// Remember the state an imported resource was left in, so the next frame can continue from there.
    pub fn record_final_state(&mut self, handle: ExternalHandle, state: ResourceState) {
        self.imported_states.insert(handle, state);
    }

    /// The state an external resource was last left in.
    pub fn last_known_state(&self, handle: ExternalHandle) -> Option<ResourceState> {
        self.imported_states.get(&handle).copied()
    }

    /// Forget the remembered state of an external resource, for example because it was destroyed.
    pub fn forget(&mut self, handle: ExternalHandle) {
        self.imported_states.remove(&handle);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceEntry> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Drop all resources of this frame. Handles of this frame become invalid.
    pub fn reset(&mut self) {
        self.resources.clear();
        self.epoch = self.epoch.wrapping_add(1);
    }
}
