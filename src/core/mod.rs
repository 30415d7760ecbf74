//! The core module holds the error type and the settings every frame graph is created with.

pub mod error;
pub mod settings;
