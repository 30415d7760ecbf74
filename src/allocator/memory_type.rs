//! Exposes the memory classes that decide which transient resources may share a block.

use crate::graph::resource::{ResourceDescription, UsageFlags};
use crate::util::align::align;

/// Alignment used for buffers placed in transient blocks.
pub const BUFFER_ALIGNMENT: u64 = 256;
/// Alignment used for images placed in transient blocks.
pub const IMAGE_ALIGNMENT: u64 = 64 * 1024;
/// Alignment used for multisampled images placed in transient blocks.
pub const MSAA_IMAGE_ALIGNMENT: u64 = 4 * 1024 * 1024;

/// The memory class of a resource indicates which kind of block it can be placed in.
/// Resources only alias memory with resources of the same class, since drivers are free to
/// require different heaps for buffers, sampled images and render targets.
///
/// See also: [`MemoryProvider::allocate_block()`](crate::MemoryProvider::allocate_block())
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum MemoryClass {
    /// Buffers of any usage.
    Buffer,
    /// Images that are never bound as attachments.
    Image,
    /// Images that are bound as color or depth attachments.
    RenderTarget,
}

/// Memory requirements of a single resource.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct MemoryRequirements {
    /// Size in bytes, already padded to `alignment`.
    pub size: u64,
    /// Required alignment of the placement offset.
    pub alignment: u64,
    pub class: MemoryClass,
}

impl MemoryRequirements {
    /// Conservative estimate of the requirements of a resource, used when the memory provider does not
    /// report anything better.
    pub fn from_description(description: &ResourceDescription) -> Self {
        match description {
            ResourceDescription::Buffer(buffer) => Self {
                size: align(buffer.size.max(1), BUFFER_ALIGNMENT),
                alignment: BUFFER_ALIGNMENT,
                class: MemoryClass::Buffer,
            },
            ResourceDescription::Image(image) => {
                let alignment = if image.samples > 1 {
                    MSAA_IMAGE_ALIGNMENT
                } else {
                    IMAGE_ALIGNMENT
                };
                let class = if image
                    .usage
                    .intersects(UsageFlags::COLOR_ATTACHMENT | UsageFlags::DEPTH_STENCIL_ATTACHMENT)
                {
                    MemoryClass::RenderTarget
                } else {
                    MemoryClass::Image
                };
                Self {
                    size: align(image.byte_size().max(1), alignment),
                    alignment,
                    class,
                }
            }
        }
    }
}
