use crate::graph::resource::Format;

pub trait ByteSize {
    fn byte_size(&self) -> usize;
}

impl ByteSize for Format {
    fn byte_size(&self) -> usize {
        match *self {
            Format::R8Unorm => 1,
            Format::Rg8Unorm => 2,
            Format::Rgba8Unorm | Format::Rgba8Srgb | Format::Bgra8Srgb => 4,
            Format::R16Float => 2,
            Format::Rg16Float => 2 * 2,
            Format::Rgba16Float => 4 * 2,
            Format::R32Float | Format::R32Uint => 4,
            Format::Rg32Float => 2 * 4,
            Format::Rgba32Float => 4 * 4,
            Format::R11G11B10Float => 4,
            Format::D16Unorm => 2,
            Format::D24UnormS8Uint => 4,
            Format::D32Float => 4,
        }
    }
}
