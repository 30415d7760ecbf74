//! The sync module provides the types used to synchronize the frame graph with the GPU.
//!
//! - The [`frame_token`] module provides [`FrameToken`](frame_token::FrameToken), the handle of a submitted frame
//! that gates the reuse of its transient memory.
//! - The [`submit_batch`] module defines the [`Submitter`](submit_batch::Submitter) interface and the
//! [`Submission`](submit_batch::Submission) handed to it.
//! - The [`fence`] module provides [`FrameCompletion`](fence::FrameCompletion), a [`Future`](std::future::Future)
//! that resolves once a frame is complete.
//! - The [`semaphore`] module provides opaque timeline semaphore handles passes can wait on or signal.

pub mod fence;
pub mod frame_token;
pub mod semaphore;
pub mod submit_batch;
