//! Exposes the settings a [`FrameGraph`](crate::FrameGraph) is created with.

use anyhow::Result;

use crate::core::error::Error;

/// Controls which transient resources may share memory.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AliasingMode {
    /// Every transient resource gets its own memory. Useful to rule out aliasing bugs.
    Disabled,
    /// Resources of the same memory class with disjoint lifetimes share memory.
    #[default]
    SameClass,
}

/// Settings used to create a frame graph.
#[derive(Debug, Clone)]
pub struct GraphSettings {
    /// Name of the graph, used in log messages.
    pub name: String,
    /// Minimum size of a transient memory block, in bytes. Larger blocks are allocated if a frame needs them.
    pub block_size: u64,
    /// Maximum amount of transient memory the graph may hold at once, in bytes. `None` means unlimited.
    pub memory_budget: Option<u64>,
    /// Which resources may share memory.
    pub aliasing: AliasingMode,
    /// Whether passes that do not contribute to a side effect are removed.
    pub cull_passes: bool,
    /// Amount of frames an unused transient block is kept around before it is freed.
    pub max_idle_frames: u32,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            name: String::from(""),
            block_size: 64 * 1024,
            memory_budget: None,
            aliasing: AliasingMode::SameClass,
            cull_passes: true,
            max_idle_frames: 3,
        }
    }
}

/// The settings builder is a convenience struct to easily create [`GraphSettings`].
///
/// For information about each of the fields, see [`GraphSettings`]
/// # Example
/// ```
/// # use deimos::prelude::*;
/// # use anyhow::Result;
/// # fn main() -> Result<()> {
/// let settings = GraphSettingsBuilder::new()
///     .name("main graph")
///     .block_size(4 * 1024 * 1024)
///     .memory_budget(256 * 1024 * 1024)
///     .max_idle_frames(2)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct GraphSettingsBuilder {
    inner: GraphSettings,
}

impl Default for GraphSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphSettingsBuilder {
    /// Create a new settings builder with default settings.
    pub fn new() -> Self {
        GraphSettingsBuilder {
            inner: GraphSettings::default(),
        }
    }

    /// Sets the graph name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.inner.name = name.into();
        self
    }

    /// Minimum size of each transient block requested from the memory provider.
    pub fn block_size(mut self, size: u64) -> Self {
        self.inner.block_size = size;
        self
    }

    /// Cap the total amount of transient memory.
    pub fn memory_budget(mut self, budget: u64) -> Self {
        self.inner.memory_budget = Some(budget);
        self
    }

    /// Remove the cap on transient memory.
    pub fn unlimited_memory(mut self) -> Self {
        self.inner.memory_budget = None;
        self
    }

    pub fn aliasing(mut self, mode: AliasingMode) -> Self {
        self.inner.aliasing = mode;
        self
    }

    /// Enable or disable dead pass elimination.
    pub fn cull_passes(mut self, cull: bool) -> Self {
        self.inner.cull_passes = cull;
        self
    }

    /// Amount of frames an unused block survives.
    pub fn max_idle_frames(mut self, frames: u32) -> Self {
        self.inner.max_idle_frames = frames;
        self
    }

    /// Validate and build the resulting settings.
    /// # Errors
    /// Fails with [`Error::InvalidSettings`] if a value is out of range.
    pub fn build(self) -> Result<GraphSettings> {
        self.inner.validate()?;
        Ok(self.inner)
    }
}

impl GraphSettings {
    /// Check all values are in range.
    /// # Errors
    /// Fails with [`Error::InvalidSettings`] if a value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::InvalidSettings("block size must not be zero").into());
        }
        if self.max_idle_frames == 0 {
            return Err(Error::InvalidSettings("blocks must stay idle for at least one frame").into());
        }
        match self.memory_budget {
            Some(budget) if budget < self.block_size => {
                Err(Error::InvalidSettings("memory budget is smaller than a single block").into())
            }
            _ => Ok(()),
        }
    }
}
