use bytes::Bytes;
use serde::Serialize;

use crate::error::Result;
use crate::stats::{ReceiverStats, SenderStats};

/// Delivery policy for a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SendingMode {
    /// Each unit is sent once, paced by the input source.
    #[default]
    Stream,
    /// The whole input is split up front and the unit set is replayed.
    Lake,
}

impl std::fmt::Display for SendingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream => f.write_str("stream"),
            Self::Lake => f.write_str("lake"),
        }
    }
}

/// A message reassembled by a receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceivedMessage {
    pub schema_id: u16,
    pub text: String,
}

/// Sender side of a transport: turns messages and blobs into units.
pub trait UnitSender {
    /// Next unit ready to be put in a frame, if any.
    fn poll_unit(&mut self) -> Option<Bytes>;

    /// Queue a message record tagged with its schema id.
    fn add_message(&mut self, schema_id: u16, text: &str) -> Result<()>;

    /// Queue one blob. `data` must not exceed [`max_blob_payload`](Self::max_blob_payload).
    fn add_blob(&mut self, data: &[u8]) -> Result<()>;

    /// Largest blob that fits in one unit at the current frame length.
    fn max_blob_payload(&self) -> usize;

    /// Change the maximum unit length, framing overhead included.
    fn set_frame_max_length(&mut self, len: usize) -> Result<()>;

    fn sending_mode(&self) -> SendingMode;

    fn set_sending_mode(&mut self, mode: SendingMode);

    /// In lake mode, replay the unit set forever instead of once.
    fn set_lake_loop(&mut self, looping: bool);

    fn stats(&self) -> SenderStats;
}

/// Receiver side of a transport: reassembles units into messages and bytes.
pub trait UnitReceiver {
    /// Feed one decoded unit.
    fn put_unit(&mut self, unit: &[u8]) -> Result<()>;

    /// Next fully received message, if any.
    fn poll_message(&mut self) -> Option<ReceivedMessage>;

    /// Up to `limit` reassembled blob bytes, in order.
    fn poll_binary(&mut self, limit: usize) -> Bytes;

    /// Lake completion bitmap, one entry per unit. Empty outside lake mode.
    fn buffer_status(&self) -> Vec<bool>;

    /// Units missing from the stream, inferred from sequence gaps.
    fn message_lost_count(&self) -> u64;

    /// Mode of the transfer as seen from the last unit, if any arrived.
    fn sending_mode(&self) -> Option<SendingMode>;

    /// Sequence number of the last unit accepted.
    fn last_segment_seen(&self) -> Option<u32>;

    fn stats(&self) -> ReceiverStats;

    /// Forget all reassembly state and counters.
    fn reset(&mut self);
}
