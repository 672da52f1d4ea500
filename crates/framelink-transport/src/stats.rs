use serde::Serialize;

/// Segment count and bit volume for one segment category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub segments: u64,
    pub bits: u64,
}

impl CategoryStats {
    pub(crate) fn record(&mut self, payload_len: usize) {
        self.segments = self.segments.saturating_add(1);
        self.bits = self.bits.saturating_add(bits(payload_len));
    }
}

/// Counters maintained by a sender.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SenderStats {
    /// Units handed out by `poll_unit`.
    pub frames: u64,
    /// Bits handed out, headers included.
    pub raw_bits: u64,
    /// Message segments queued, with payload bits.
    pub messages: CategoryStats,
    /// Blob segments queued, with payload bits.
    pub blobs: CategoryStats,
    /// Segments waiting to be sent (stream) or in the replayed set (lake).
    pub buffered_segments: u64,
    pub buffered_bits: u64,
}

/// Counters maintained by a receiver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverStats {
    /// Units accepted, duplicates included.
    pub units: u64,
    /// Bits accepted, headers and duplicates included.
    pub raw_bits: u64,
    /// Bits of segments seen for the first time.
    pub distinct_bits: u64,
    /// Distinct message segments, with payload bits.
    pub messages: CategoryStats,
    /// Distinct blob segments, with payload bits.
    pub blobs: CategoryStats,
    /// Units that failed to decode.
    pub malformed: u64,
}

pub(crate) fn bits(bytes: usize) -> u64 {
    (bytes as u64).saturating_mul(8)
}
