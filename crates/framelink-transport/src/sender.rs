use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use framelink_schema::SchemaRegistry;
use tracing::{debug, info, warn};

use crate::error::{Result, TransportError};
use crate::segment::{encode_segment, Segment, SegmentKind, HEADER_SIZE, MAX_SEGMENT_PAYLOAD};
use crate::stats::{bits, SenderStats};
use crate::traits::{SendingMode, UnitSender};

/// Default maximum unit length in bytes, header included.
pub const DEFAULT_FRAME_MAX_LENGTH: usize = 256;

/// Default cap on one message, before it is split into segments.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 1024 * 1024;

/// Configuration for a [`SegmentSender`].
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Maximum unit length in bytes, header included. Default: 256.
    pub frame_max_length: usize,
    /// Default: `Stream`.
    pub mode: SendingMode,
    /// Replay the lake forever instead of once. Default: true.
    pub lake_loop: bool,
    /// Longest message accepted. Longer than one unit is fine: the message
    /// is split over consecutive segments. Default: 1 MiB.
    pub max_message_len: usize,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            frame_max_length: DEFAULT_FRAME_MAX_LENGTH,
            mode: SendingMode::Stream,
            lake_loop: true,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

#[derive(Debug, Clone)]
struct Pending {
    kind: SegmentKind,
    schema_id: u16,
    continuation: bool,
    more: bool,
    payload: Bytes,
}

/// Reference [`UnitSender`] producing one segment per unit.
#[derive(Debug)]
pub struct SegmentSender {
    config: SenderConfig,
    registry: Option<SchemaRegistry>,
    queue: VecDeque<Pending>,
    lake: Vec<Pending>,
    cursor: usize,
    next_seq: u32,
    stats: SenderStats,
}

impl SegmentSender {
    /// Create a sender with default configuration.
    pub fn new() -> Self {
        Self::with_config(SenderConfig::default())
    }

    /// Create a sender with explicit configuration.
    ///
    /// A frame length outside the valid range is clamped.
    pub fn with_config(mut config: SenderConfig) -> Self {
        config.frame_max_length = config
            .frame_max_length
            .clamp(min_frame_length(), HEADER_SIZE + MAX_SEGMENT_PAYLOAD);
        Self {
            config,
            registry: None,
            queue: VecDeque::new(),
            lake: Vec::new(),
            cursor: 0,
            next_seq: 0,
            stats: SenderStats::default(),
        }
    }

    /// Check message records against `registry` before queueing them.
    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn config(&self) -> &SenderConfig {
        &self.config
    }

    /// Segments not yet sent (stream) or in the replayed set (lake).
    pub fn buffered_segments(&self) -> usize {
        match self.config.mode {
            SendingMode::Stream => self.queue.len(),
            SendingMode::Lake => self.lake.len(),
        }
    }

    fn enqueue(&mut self, pending: Pending) {
        match self.config.mode {
            SendingMode::Stream => self.queue.push_back(pending),
            SendingMode::Lake => self.lake.push(pending),
        }
    }

    fn check_fits(&self, size: usize) -> Result<()> {
        let max = self.max_blob_payload();
        if size > max {
            return Err(TransportError::PayloadTooLarge { size, max });
        }
        Ok(())
    }

    fn next_stream(&mut self) -> Option<(Pending, u32, u32)> {
        let pending = self.queue.pop_front()?;
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        Some((pending, seq, 0))
    }

    fn next_lake(&mut self) -> Option<(Pending, u32, u32)> {
        if self.lake.is_empty() {
            return None;
        }
        if self.cursor >= self.lake.len() {
            if !self.config.lake_loop {
                return None;
            }
            debug!(units = self.lake.len(), "lake replay restarting");
            self.cursor = 0;
        }
        let seq = u32::try_from(self.cursor).unwrap_or(u32::MAX);
        let total = u32::try_from(self.lake.len()).unwrap_or(u32::MAX);
        let pending = self.lake[self.cursor].clone();
        self.cursor += 1;
        Some((pending, seq, total))
    }
}

impl Default for SegmentSender {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitSender for SegmentSender {
    fn poll_unit(&mut self) -> Option<Bytes> {
        let (pending, seq, lake_total) = match self.config.mode {
            SendingMode::Stream => self.next_stream()?,
            SendingMode::Lake => self.next_lake()?,
        };
        let segment = Segment {
            kind: pending.kind,
            schema_id: pending.schema_id,
            seq,
            lake_total,
            continuation: pending.continuation,
            more: pending.more,
            payload: pending.payload,
        };

        let mut buf = BytesMut::with_capacity(segment.wire_size());
        if let Err(err) = encode_segment(&segment, &mut buf) {
            warn!(error = %err, seq, "dropping unencodable segment");
            return None;
        }
        self.stats.frames = self.stats.frames.saturating_add(1);
        self.stats.raw_bits = self.stats.raw_bits.saturating_add(bits(buf.len()));
        Some(buf.freeze())
    }

    fn add_message(&mut self, schema_id: u16, text: &str) -> Result<()> {
        if let Some(registry) = &self.registry {
            if !registry.accepts(schema_id) {
                return Err(TransportError::UnknownSchema(schema_id));
            }
            if registry.has_schema(schema_id) {
                registry.validate(schema_id, text.as_bytes())?;
            }
        }
        let max = self.config.max_message_len;
        if text.len() > max {
            return Err(TransportError::PayloadTooLarge {
                size: text.len(),
                max,
            });
        }

        let payload = Bytes::copy_from_slice(text.as_bytes());
        let part_len = self.max_blob_payload();
        let parts = payload.len().div_ceil(part_len).max(1);
        if parts > 1 {
            debug!(schema_id, len = payload.len(), segments = parts, "message split");
        }
        for index in 0..parts {
            let start = index * part_len;
            let end = (start + part_len).min(payload.len());
            let part = payload.slice(start..end);
            self.stats.messages.record(part.len());
            self.enqueue(Pending {
                kind: SegmentKind::Message,
                schema_id,
                continuation: index > 0,
                more: index + 1 < parts,
                payload: part,
            });
        }
        Ok(())
    }

    fn add_blob(&mut self, data: &[u8]) -> Result<()> {
        self.check_fits(data.len())?;

        self.stats.blobs.record(data.len());
        self.enqueue(Pending {
            kind: SegmentKind::Blob,
            schema_id: 0,
            continuation: false,
            more: false,
            payload: Bytes::copy_from_slice(data),
        });
        Ok(())
    }

    fn max_blob_payload(&self) -> usize {
        self.config.frame_max_length - HEADER_SIZE
    }

    fn set_frame_max_length(&mut self, len: usize) -> Result<()> {
        let min = min_frame_length();
        if len < min {
            return Err(TransportError::FrameTooSmall { len, min });
        }
        let max = HEADER_SIZE + MAX_SEGMENT_PAYLOAD;
        if len > max {
            return Err(TransportError::PayloadTooLarge { size: len, max });
        }
        self.config.frame_max_length = len;
        Ok(())
    }

    fn sending_mode(&self) -> SendingMode {
        self.config.mode
    }

    fn set_sending_mode(&mut self, mode: SendingMode) {
        if mode == self.config.mode {
            return;
        }
        match mode {
            SendingMode::Lake => self.lake.extend(self.queue.drain(..)),
            SendingMode::Stream => self.queue.extend(self.lake.drain(..)),
        }
        self.cursor = 0;
        info!(%mode, "sending mode changed");
        self.config.mode = mode;
    }

    fn set_lake_loop(&mut self, looping: bool) {
        self.config.lake_loop = looping;
    }

    fn stats(&self) -> SenderStats {
        let (segments, payload_bytes) = match self.config.mode {
            SendingMode::Stream => summarize(self.queue.iter()),
            SendingMode::Lake => summarize(self.lake.iter()),
        };
        SenderStats {
            buffered_segments: segments,
            buffered_bits: bits(payload_bytes),
            ..self.stats
        }
    }
}

fn summarize<'a>(pending: impl Iterator<Item = &'a Pending>) -> (u64, usize) {
    pending.fold((0, 0), |(count, len), p| (count + 1, len + p.payload.len()))
}

fn min_frame_length() -> usize {
    HEADER_SIZE + 1
}

#[cfg(test)]
mod tests {
    use crate::segment::decode_segment;

    use super::*;

    fn decode(unit: Bytes) -> Segment {
        decode_segment(&unit).unwrap()
    }

    #[test]
    fn stream_units_are_sent_once_in_order() {
        let mut sender = SegmentSender::new();
        sender.add_blob(b"one").unwrap();
        sender.add_message(4, "two").unwrap();

        let first = decode(sender.poll_unit().unwrap());
        let second = decode(sender.poll_unit().unwrap());
        assert!(sender.poll_unit().is_none());

        assert_eq!((first.seq, first.kind), (0, SegmentKind::Blob));
        assert_eq!((second.seq, second.kind, second.schema_id), (1, SegmentKind::Message, 4));
        assert_eq!(second.lake_total, 0);
        assert_eq!(sender.stats().frames, 2);
    }

    #[test]
    fn lake_replays_when_looping() {
        let mut sender = SegmentSender::with_config(SenderConfig {
            mode: SendingMode::Lake,
            ..SenderConfig::default()
        });
        for chunk in [b"a", b"b", b"c"] {
            sender.add_blob(chunk).unwrap();
        }

        let seqs: Vec<u32> = (0..7)
            .map(|_| decode(sender.poll_unit().unwrap()).seq)
            .collect();
        assert_eq!(seqs, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(sender.stats().buffered_segments, 3);
    }

    #[test]
    fn lake_without_loop_drains_once() {
        let mut sender = SegmentSender::with_config(SenderConfig {
            mode: SendingMode::Lake,
            lake_loop: false,
            ..SenderConfig::default()
        });
        sender.add_blob(b"x").unwrap();
        sender.add_blob(b"y").unwrap();

        let first = decode(sender.poll_unit().unwrap());
        assert_eq!(first.lake_total, 2);
        assert!(sender.poll_unit().is_some());
        assert!(sender.poll_unit().is_none());
    }

    #[test]
    fn frame_length_bounds_blob_size() {
        let mut sender = SegmentSender::new();
        assert_eq!(sender.max_blob_payload(), DEFAULT_FRAME_MAX_LENGTH - HEADER_SIZE);

        sender.set_frame_max_length(HEADER_SIZE + 4).unwrap();
        assert_eq!(sender.max_blob_payload(), 4);
        assert!(sender.add_blob(b"1234").is_ok());
        assert!(matches!(
            sender.add_blob(b"12345"),
            Err(TransportError::PayloadTooLarge { size: 5, max: 4 })
        ));
        assert!(matches!(
            sender.set_frame_max_length(HEADER_SIZE),
            Err(TransportError::FrameTooSmall { .. })
        ));
    }

    #[test]
    fn long_message_spans_consecutive_segments() {
        let mut sender = SegmentSender::new();
        let text = "x".repeat(600);
        sender.add_message(3, &text).unwrap();

        let parts: Vec<Segment> = std::iter::from_fn(|| sender.poll_unit()).map(decode).collect();
        let lens: Vec<usize> = parts.iter().map(|p| p.payload.len()).collect();
        let part = DEFAULT_FRAME_MAX_LENGTH - HEADER_SIZE;
        assert_eq!(lens, vec![part, part, 600 - 2 * part]);

        let flags: Vec<(u32, bool, bool)> =
            parts.iter().map(|p| (p.seq, p.continuation, p.more)).collect();
        assert_eq!(flags, vec![(0, false, true), (1, true, true), (2, true, false)]);
        assert!(parts.iter().all(|p| p.schema_id == 3));
        assert_eq!(sender.stats().messages.segments, 3);
    }

    #[test]
    fn message_above_limit_is_rejected() {
        let mut sender = SegmentSender::with_config(SenderConfig {
            max_message_len: 10,
            ..SenderConfig::default()
        });
        assert!(sender.add_message(1, "0123456789").is_ok());
        assert!(matches!(
            sender.add_message(1, "0123456789a"),
            Err(TransportError::PayloadTooLarge { size: 11, max: 10 })
        ));
    }

    #[test]
    fn registry_rejects_unknown_and_invalid_messages() {
        let mut registry =
            SchemaRegistry::with_config(framelink_schema::RegistryConfig::closed());
        registry
            .register(1, r#"{"type":"object","required":["v"]}"#)
            .unwrap();
        let mut sender = SegmentSender::new().with_registry(registry);

        assert!(sender.add_message(1, r#"{"v":3}"#).is_ok());
        assert!(matches!(
            sender.add_message(2, r#"{"v":3}"#),
            Err(TransportError::UnknownSchema(2))
        ));
        assert!(matches!(
            sender.add_message(1, r#"{"w":3}"#),
            Err(TransportError::Schema(_))
        ));
        assert_eq!(sender.stats().messages.segments, 1);
    }

    #[test]
    fn switching_mode_keeps_buffered_segments() {
        let mut sender = SegmentSender::new();
        sender.add_blob(b"kept").unwrap();
        sender.set_sending_mode(SendingMode::Lake);

        let segment = decode(sender.poll_unit().unwrap());
        assert_eq!(segment.payload.as_ref(), b"kept");
        assert_eq!(segment.lake_total, 1);
    }
}
