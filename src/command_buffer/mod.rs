//! The frame graph never records GPU commands itself. It talks to a [`CommandRecorder`](traits::CommandRecorder)
//! supplied by the caller, which is passed through every pass callback in execution order.
//!
//! Like a command buffer, a recorder is consumed and returned by every call, so passes chain their commands:
//! ```
//! # use deimos::prelude::*;
//! # use anyhow::Result;
//! fn record<C: CommandRecorder>(cmd: C, bindings: &PhysicalResourceBindings) -> Result<C> {
//!     let cmd = cmd.begin_label("my commands", [1.0, 0.0, 0.0, 1.0]);
//!     let cmd = cmd.pipeline_barrier(&[], bindings)?;
//!     Ok(cmd.end_label())
//! }
//! ```

pub mod traits;
