use std::fmt::{Display, Formatter};

use static_assertions::assert_impl_all;

use crate::graph::resource::ResourceType;

/// Handle to a resource declared in a [`FrameGraph`](crate::FrameGraph). Handles are only valid for the frame
/// they were declared in. Using a handle from a previous frame fails with
/// [`Error::UnknownResource`](crate::Error::UnknownResource).
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct VirtualResource {
    pub(crate) index: u32,
    pub(crate) epoch: u32,
    ty: ResourceType,
}

assert_impl_all!(VirtualResource: Send, Sync, Copy);

impl VirtualResource {
    pub(crate) fn new(index: u32, epoch: u32, ty: ResourceType) -> Self {
        Self {
            index,
            epoch,
            ty,
        }
    }

    /// Get the resource type of this virtual resource
    pub fn resource_type(&self) -> ResourceType {
        self.ty
    }

    /// Index of the resource in declaration order within its frame.
    pub fn index(&self) -> usize {
        self.index as usize
    }
}

impl Display for VirtualResource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.ty {
            ResourceType::Image => write!(f, "image#{}", self.index),
            ResourceType::Buffer => write!(f, "buffer#{}", self.index),
        }
    }
}
