use anyhow::Result;

use crate::allocator::memory_type::{MemoryClass, MemoryRequirements};
use crate::graph::resource::ResourceDescription;

/// Opaque handle to a block of device memory, returned by a [`MemoryProvider`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHandle(pub u64);

/// The device memory interface. The transient allocator requests its backing blocks from here, and
/// returns them once they have been idle for long enough.
///
/// Implement this on top of your GPU API of choice. The frame graph never touches the memory itself.
pub trait MemoryProvider {
    /// Allocate a block of at least `size` bytes, aligned to `alignment`, suitable for resources of `class`.
    /// # Errors
    /// Return an error if the device is out of memory. The frame being built is aborted with
    /// [`Error::AllocationFailure`](crate::Error::AllocationFailure).
    fn allocate_block(&mut self, size: u64, alignment: u64, class: MemoryClass) -> Result<BlockHandle>;
    /// Free a block previously returned from [`MemoryProvider::allocate_block()`]. The frame graph only calls
    /// this once no submitted frame uses the block anymore.
    fn free_block(&mut self, block: BlockHandle) -> Result<()>;

    /// Memory requirements of a resource with the given description. The default implementation returns a
    /// conservative estimate.
    fn requirements(&self, description: &ResourceDescription) -> MemoryRequirements {
        MemoryRequirements::from_description(description)
    }
}
