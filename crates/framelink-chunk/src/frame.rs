use bytes::Bytes;

use crate::error::Result;
use crate::stats::EncoderStats;

/// One payload ready for the visual codec.
///
/// Identity is positional: `seq` counts frames emitted by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: u64,
    pub payload: Bytes,
}

/// Outcome of polling a [`FrameSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePoll {
    Ready(Frame),
    /// Nothing to send right now; poll again later.
    Idle,
    /// The input is exhausted and every unit has been sent.
    Finished,
}

impl FramePoll {
    pub fn into_frame(self) -> Option<Frame> {
        match self {
            Self::Ready(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Encoder side producer of frame payloads.
pub trait FrameSource {
    /// Next frame payload, if one is ready.
    fn poll_frame(&mut self) -> Result<FramePoll>;

    /// Snapshot of the encoder counters.
    fn stats(&self) -> EncoderStats;
}
