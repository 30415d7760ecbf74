//! Resource descriptions, usages and the GPU-visible states they map to.

use bitflags::bitflags;

use crate::util::byte_size::ByteSize;

/// Type of a resource in the pass graph.
#[derive(Debug, Default, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ResourceType {
    /// Image resource
    #[default]
    Image,
    /// Buffer resource
    Buffer,
}

bitflags! {
    /// How a resource may be used over its lifetime. Checked against every declared access.
    #[derive(Debug, Default, Copy, Clone, Hash, PartialEq, Eq)]
    pub struct UsageFlags: u32 {
        const SAMPLED = 1 << 0;
        const STORAGE = 1 << 1;
        const COLOR_ATTACHMENT = 1 << 2;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 3;
        const TRANSFER_SRC = 1 << 4;
        const TRANSFER_DST = 1 << 5;
        const UNIFORM = 1 << 6;
        const VERTEX = 1 << 7;
        const INDEX = 1 << 8;
        const INDIRECT = 1 << 9;
    }
}

bitflags! {
    /// Pipeline stages a barrier synchronizes.
    #[derive(Debug, Default, Copy, Clone, Hash, PartialEq, Eq)]
    pub struct PipelineStage: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const DRAW_INDIRECT = 1 << 1;
        const VERTEX_INPUT = 1 << 2;
        const VERTEX_SHADER = 1 << 3;
        const FRAGMENT_SHADER = 1 << 4;
        const EARLY_FRAGMENT_TESTS = 1 << 5;
        const LATE_FRAGMENT_TESTS = 1 << 6;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 7;
        const COMPUTE_SHADER = 1 << 8;
        const TRANSFER = 1 << 9;
        const BOTTOM_OF_PIPE = 1 << 10;
        const ALL_COMMANDS = 1 << 11;
    }
}

impl PipelineStage {
    /// No stage at all. Used as the source stage of resources without a previous use.
    pub const NONE: PipelineStage = PipelineStage::empty();
}

/// Texel formats known to the frame graph. Only used to estimate memory requirements.
#[derive(Debug, Default, Copy, Clone, Hash, PartialEq, Eq)]
pub enum Format {
    R8Unorm,
    Rg8Unorm,
    #[default]
    Rgba8Unorm,
    Rgba8Srgb,
    Bgra8Srgb,
    R16Float,
    Rg16Float,
    Rgba16Float,
    R32Float,
    R32Uint,
    Rg32Float,
    Rgba32Float,
    R11G11B10Float,
    D16Unorm,
    D24UnormS8Uint,
    D32Float,
}

impl Format {
    /// Whether this is a depth (or depth-stencil) format.
    pub fn is_depth(&self) -> bool {
        matches!(self, Format::D16Unorm | Format::D24UnormS8Uint | Format::D32Float)
    }
}

/// Description of an image resource.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct ImageDescription {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub format: Format,
    pub mip_levels: u32,
    pub array_layers: u32,
    pub samples: u32,
    pub usage: UsageFlags,
}

impl ImageDescription {
    /// A single-sampled 2D image without mip levels.
    pub fn new_2d(width: u32, height: u32, format: Format, usage: UsageFlags) -> Self {
        Self {
            width,
            height,
            depth: 1,
            format,
            mip_levels: 1,
            array_layers: 1,
            samples: 1,
            usage,
        }
    }

    /// Set the amount of mip levels.
    pub fn mip_levels(mut self, levels: u32) -> Self {
        self.mip_levels = levels.max(1);
        self
    }

    /// Set the amount of array layers.
    pub fn array_layers(mut self, layers: u32) -> Self {
        self.array_layers = layers.max(1);
        self
    }

    /// Set the sample count.
    pub fn samples(mut self, samples: u32) -> Self {
        self.samples = samples.max(1);
        self
    }

    /// Size in bytes of the image with all its levels and layers, before any alignment is applied.
    pub fn byte_size(&self) -> u64 {
        let texel = self.format.byte_size() as u64 * self.samples as u64;
        let (mut w, mut h, mut d) = (self.width as u64, self.height as u64, self.depth as u64);
        let mut total = 0;
        for _ in 0..self.mip_levels {
            total += w.max(1) * h.max(1) * d.max(1) * texel;
            w /= 2;
            h /= 2;
            d /= 2;
        }
        total * self.array_layers as u64
    }
}

/// Description of a buffer resource.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct BufferDescription {
    pub size: u64,
    pub usage: UsageFlags,
}

impl BufferDescription {
    pub fn new(size: u64, usage: UsageFlags) -> Self {
        Self {
            size,
            usage,
        }
    }
}

/// Description of any resource known to the frame graph.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum ResourceDescription {
    Image(ImageDescription),
    Buffer(BufferDescription),
}

impl From<ImageDescription> for ResourceDescription {
    fn from(value: ImageDescription) -> Self {
        ResourceDescription::Image(value)
    }
}

impl From<BufferDescription> for ResourceDescription {
    fn from(value: BufferDescription) -> Self {
        ResourceDescription::Buffer(value)
    }
}

impl ResourceDescription {
    /// Get the resource type of this description.
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceDescription::Image(_) => ResourceType::Image,
            ResourceDescription::Buffer(_) => ResourceType::Buffer,
        }
    }

    /// Get the usage flags of this description.
    pub fn usage(&self) -> UsageFlags {
        match self {
            ResourceDescription::Image(image) => image.usage,
            ResourceDescription::Buffer(buffer) => buffer.usage,
        }
    }

    /// Returns true if the resource may be accessed with this usage.
    pub fn allows(&self, usage: &ResourceUsage) -> bool {
        let flags = self.usage();
        let ty = self.resource_type();
        match usage {
            ResourceUsage::Nothing => true,
            ResourceUsage::Present => ty == ResourceType::Image,
            ResourceUsage::Attachment(AttachmentType::Color) => {
                ty == ResourceType::Image && flags.contains(UsageFlags::COLOR_ATTACHMENT)
            }
            ResourceUsage::Attachment(AttachmentType::Depth) => {
                ty == ResourceType::Image && flags.contains(UsageFlags::DEPTH_STENCIL_ATTACHMENT)
            }
            ResourceUsage::ShaderRead => match ty {
                ResourceType::Image => flags.intersects(UsageFlags::SAMPLED | UsageFlags::STORAGE),
                ResourceType::Buffer => flags.intersects(UsageFlags::STORAGE | UsageFlags::UNIFORM),
            },
            ResourceUsage::ShaderWrite => flags.contains(UsageFlags::STORAGE),
            ResourceUsage::TransferRead => flags.contains(UsageFlags::TRANSFER_SRC),
            ResourceUsage::TransferWrite => flags.contains(UsageFlags::TRANSFER_DST),
            ResourceUsage::VertexRead => {
                ty == ResourceType::Buffer && flags.intersects(UsageFlags::VERTEX | UsageFlags::INDEX)
            }
            ResourceUsage::IndirectRead => ty == ResourceType::Buffer && flags.contains(UsageFlags::INDIRECT),
        }
    }

    /// The usage a plain read of this resource is assumed to have.
    pub fn default_read(&self) -> ResourceUsage {
        ResourceUsage::ShaderRead
    }

    /// The usage a plain write of this resource is assumed to have. Render target images are written as attachments,
    /// everything else as storage.
    pub fn default_write(&self) -> ResourceUsage {
        match self {
            ResourceDescription::Image(image) if image.usage.contains(UsageFlags::DEPTH_STENCIL_ATTACHMENT) => {
                ResourceUsage::Attachment(AttachmentType::Depth)
            }
            ResourceDescription::Image(image) if image.usage.contains(UsageFlags::COLOR_ATTACHMENT) => {
                ResourceUsage::Attachment(AttachmentType::Color)
            }
            _ => ResourceUsage::ShaderWrite,
        }
    }
}

/// GPU-visible state of a resource. For images this corresponds to a layout, for buffers
/// to the kind of access that must be made visible.
#[derive(Debug, Default, Copy, Clone, Hash, PartialEq, Eq)]
pub enum ResourceState {
    /// Contents are undefined. Every transient resource starts here.
    #[default]
    Undefined,
    ColorAttachment,
    DepthStencilAttachment,
    ShaderRead,
    /// Read-write storage access.
    General,
    TransferSrc,
    TransferDst,
    VertexInput,
    IndirectArgument,
    Present,
}

#[derive(Debug, Default, Copy, Clone, Hash, PartialEq, Eq)]
pub enum AttachmentType {
    #[default]
    Color,
    Depth,
}

/// Resource usage in a task graph.
#[derive(Debug, Default, PartialEq, Eq, Copy, Clone, Hash)]
pub enum ResourceUsage {
    #[default]
    Nothing,
    Present,
    Attachment(AttachmentType),
    ShaderRead,
    ShaderWrite,
    TransferRead,
    TransferWrite,
    VertexRead,
    IndirectRead,
}

impl ResourceUsage {
    /// The state a resource must be in for this usage.
    pub fn state(&self) -> ResourceState {
        match self {
            ResourceUsage::Nothing => ResourceState::Undefined,
            ResourceUsage::Present => ResourceState::Present,
            ResourceUsage::Attachment(AttachmentType::Color) => ResourceState::ColorAttachment,
            ResourceUsage::Attachment(AttachmentType::Depth) => ResourceState::DepthStencilAttachment,
            ResourceUsage::ShaderRead => ResourceState::ShaderRead,
            ResourceUsage::ShaderWrite => ResourceState::General,
            ResourceUsage::TransferRead => ResourceState::TransferSrc,
            ResourceUsage::TransferWrite => ResourceState::TransferDst,
            ResourceUsage::VertexRead => ResourceState::VertexInput,
            ResourceUsage::IndirectRead => ResourceState::IndirectArgument,
        }
    }

    /// The pipeline stage this usage happens in if the pass does not specify one.
    pub fn default_stage(&self) -> PipelineStage {
        match self {
            ResourceUsage::Nothing => PipelineStage::NONE,
            ResourceUsage::Present => PipelineStage::BOTTOM_OF_PIPE,
            ResourceUsage::Attachment(AttachmentType::Color) => PipelineStage::COLOR_ATTACHMENT_OUTPUT,
            ResourceUsage::Attachment(AttachmentType::Depth) => {
                PipelineStage::EARLY_FRAGMENT_TESTS | PipelineStage::LATE_FRAGMENT_TESTS
            }
            ResourceUsage::ShaderRead | ResourceUsage::ShaderWrite => {
                PipelineStage::FRAGMENT_SHADER | PipelineStage::COMPUTE_SHADER
            }
            ResourceUsage::TransferRead | ResourceUsage::TransferWrite => PipelineStage::TRANSFER,
            ResourceUsage::VertexRead => PipelineStage::VERTEX_INPUT,
            ResourceUsage::IndirectRead => PipelineStage::DRAW_INDIRECT,
        }
    }

    /// Whether this usage is a read operation
    pub fn is_read(&self) -> bool {
        match self {
            ResourceUsage::Nothing => true,
            ResourceUsage::Present => true,
            ResourceUsage::Attachment(_) => false,
            ResourceUsage::ShaderRead => true,
            ResourceUsage::ShaderWrite => false,
            ResourceUsage::TransferRead => true,
            ResourceUsage::TransferWrite => false,
            ResourceUsage::VertexRead => true,
            ResourceUsage::IndirectRead => true,
        }
    }
}

/// What happens to the previous contents of a written resource at the start of a pass.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum LoadOp {
    /// Previous contents are preserved. The write depends on the previous version of the resource.
    Load,
    /// Contents are cleared to the given clear value.
    Clear,
    /// Previous contents are discarded.
    #[default]
    DontCare,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ClearColor {
    Float([f32; 4]),
    Int([i32; 4]),
    Uint([u32; 4]),
}

#[derive(Copy, Clone, Default, Debug, PartialEq)]
pub struct ClearDepthStencil {
    pub depth: f32,
    pub stencil: u32,
}

/// Clear value attached to a written resource.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ClearValue {
    Color(ClearColor),
    DepthStencil(ClearDepthStencil),
}
