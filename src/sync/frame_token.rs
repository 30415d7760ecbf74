use std::fmt::{Display, Formatter};

use static_assertions::assert_impl_all;

/// Opaque handle to a submitted frame. Once the GPU has finished a frame, every frame with a smaller token has
/// finished too, so tokens are totally ordered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameToken(u64);

assert_impl_all!(FrameToken: Send, Sync, Copy);

impl FrameToken {
    /// Create a token for the frame with the given index.
    pub fn new(frame: u64) -> Self {
        Self(frame)
    }

    /// Index of the frame this token was issued for.
    pub fn frame(&self) -> u64 {
        self.0
    }

    /// The token of the frame after this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for FrameToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame {}", self.0)
    }
}
