use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use crate::sync::frame_token::FrameToken;
use crate::sync::submit_batch::Submitter;

/// Future that resolves once the GPU finished a submitted frame. The submitter is polled for completion.
/// # Example
/// ```
/// # use deimos::prelude::*;
/// fn wait<S: Submitter>(submitter: &S, token: FrameToken) {
///     let token = futures::executor::block_on(FrameCompletion::new(submitter, token));
///     println!("{} is done", token);
/// }
/// ```
#[derive(Derivative)]
#[derivative(Debug)]
pub struct FrameCompletion<'s, S: Submitter> {
    #[derivative(Debug = "ignore")]
    submitter: &'s S,
    token: FrameToken,
    poll_interval: Duration,
}

impl<'s, S: Submitter> FrameCompletion<'s, S> {
    pub fn new(submitter: &'s S, token: FrameToken) -> Self {
        Self {
            submitter,
            token,
            poll_interval: Duration::from_millis(5),
        }
    }

    /// Set the time between two completion checks.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Returns true if the frame is complete, without waiting.
    pub fn is_complete(&self) -> bool {
        self.submitter.is_complete(self.token)
    }
}

impl<S: Submitter> Unpin for FrameCompletion<'_, S> {}

// The submitter has no way to notify us, so we poll it periodically.
impl<S: Submitter> Future for FrameCompletion<'_, S> {
    type Output = FrameToken;

    fn poll(self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.submitter.is_complete(self.token) {
            Poll::Ready(self.token)
        } else {
            let waker = ctx.waker().clone();
            let interval = self.poll_interval;
            std::thread::spawn(move || {
                std::thread::sleep(interval);
                waker.wake();
            });
            Poll::Pending
        }
    }
}
