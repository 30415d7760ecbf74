use anyhow::Result;

use crate::sync::frame_token::FrameToken;
use crate::sync::semaphore::{SemaphoreSignal, SemaphoreWait};

/// Everything a frame hands to the GPU in one submission.
#[derive(Debug)]
pub struct Submission<C> {
    /// The recorded commands of every pass, in execution order.
    pub commands: C,
    /// Semaphore waits requested by the passes of the frame, in execution order.
    pub wait_semaphores: Vec<SemaphoreWait>,
    /// Semaphore signals requested by the passes of the frame, in execution order.
    pub signal_semaphores: Vec<SemaphoreSignal>,
}

/// The submission and synchronization interface. Implement this on top of your queue submission code.
pub trait Submitter {
    /// The command recorder type that is submitted.
    type Commands;

    /// Submit the recorded work of a frame to the GPU and return a token that identifies it.
    /// Tokens must be increasing.
    fn submit(&mut self, submission: Submission<Self::Commands>) -> Result<FrameToken>;

    /// Returns true once the GPU finished all work of the frame identified by `token`.
    fn is_complete(&self, token: FrameToken) -> bool;
}
