//! Exposes the deimos error type

use thiserror::Error;

use crate::graph::resource::ResourceUsage;
use crate::graph::virtual_resource::VirtualResource;

/// Error type that deimos can return.
///
/// Graph structure errors ([`Error::CyclicDependency`], [`Error::UnknownResource`], [`Error::AmbiguousWrite`],
/// [`Error::GraphFinalized`]) are programming errors. Retrying the same declarations reproduces them, so the frame
/// should be skipped. Allocation errors may succeed again after reducing the size of transient resources.
#[derive(Error, Debug)]
pub enum Error {
    /// The declared passes form a dependency cycle and cannot be linearized.
    #[error("Frame graph contains a cycle through passes {0:?}.")]
    CyclicDependency(Vec<String>),
    /// A pass referenced a resource handle that was never declared or imported in this frame.
    #[error("Unknown resource `{0}`. Was it declared in this frame?")]
    UnknownResource(VirtualResource),
    /// An `after` edge referenced a pass handle that was never declared in this frame.
    #[error("Unknown pass handle `{0}`.")]
    UnknownPass(usize),
    /// Two passes write the same resource without any ordering constraint between them.
    #[error("Passes `{first}` and `{second}` both write `{resource}` with no ordering between them. Declare an explicit `after` edge.")]
    AmbiguousWrite {
        /// Name of the resource written twice.
        resource: String,
        /// Name of the first writer in declaration order.
        first: String,
        /// Name of the second writer in declaration order.
        second: String,
    },
    /// Tried to declare passes or resources after the graph was scheduled.
    #[error("Frame graph is already finalized for this frame.")]
    GraphFinalized,
    /// A pass names the same resource more than once.
    #[error("Pass `{pass}` accesses `{resource}` more than once.")]
    OverlappingAccess {
        /// Name of the offending pass.
        pass: String,
        /// Name of the resource.
        resource: String,
    },
    /// A pass uses a resource in a way its usage flags do not allow.
    #[error("Pass `{pass}` uses `{resource}` as {usage:?}, which its description does not allow.")]
    IncompatibleUsage {
        /// Name of the offending pass.
        pass: String,
        /// Name of the resource.
        resource: String,
        /// The requested usage.
        usage: ResourceUsage,
    },
    /// The transient memory budget cannot fit this frame, even after releasing idle blocks.
    #[error("Out of transient memory: requested {requested} bytes with a budget of {budget} bytes.")]
    OutOfMemory {
        /// Total bytes that would be resident.
        requested: u64,
        /// Configured budget.
        budget: u64,
    },
    /// The device memory interface failed to provide a backing block.
    #[error("Failed to allocate a transient memory block: {0}")]
    AllocationFailure(String),
    /// No physical resource was bound to a virtual resource.
    #[error("No physical resource bound to virtual resource `{0}`")]
    NoResourceBound(String),
    /// Graph settings failed validation.
    #[error("Invalid graph settings: {0}")]
    InvalidSettings(&'static str),
}
