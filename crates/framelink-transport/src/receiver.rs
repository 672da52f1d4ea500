use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, trace, warn};

use crate::error::{Result, TransportError};
use crate::segment::{decode_segment, Segment, SegmentKind};
use crate::sender::DEFAULT_MAX_MESSAGE_LEN;
use crate::stats::{bits, ReceiverStats};
use crate::traits::{ReceivedMessage, SendingMode, UnitReceiver};

/// Default cap on the number of units a lake may announce.
pub const DEFAULT_MAX_LAKE_UNITS: usize = 65_536;

/// Default number of units announcing a new lake size that must arrive in a
/// row before the current lake is abandoned.
pub const DEFAULT_LAKE_CONFIRM_UNITS: usize = 3;

/// Configuration for a [`SegmentReceiver`].
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    /// Lake units announcing a larger total are rejected. Default: 65536.
    pub max_lake_units: usize,
    /// Units needed to switch to a lake of a different size. Default: 3.
    pub lake_confirm_units: usize,
    /// A split message growing past this is dropped. Default: 1 MiB.
    pub max_message_len: usize,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            max_lake_units: DEFAULT_MAX_LAKE_UNITS,
            lake_confirm_units: DEFAULT_LAKE_CONFIRM_UNITS,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
        }
    }
}

#[derive(Debug)]
struct PartialMessage {
    schema_id: u16,
    text: BytesMut,
}

/// Reference [`UnitReceiver`] for units produced by a `SegmentSender`.
///
/// Stream segments are delivered on arrival; repeats of an already seen
/// sequence number are ignored and gaps are counted as lost. Lake segments
/// are stored in their slot and released in order once every earlier slot
/// has been filled.
///
/// A message split over several segments is delivered once its last
/// segment is released. A gap in the middle of it drops the whole message.
///
/// Units announcing a lake of a different size are held back until
/// `lake_confirm_units` of them arrive in a row, so a single stray unit
/// cannot restart a transfer whose bytes were already released.
#[derive(Debug, Default)]
pub struct SegmentReceiver {
    config: ReceiverConfig,
    messages: VecDeque<ReceivedMessage>,
    partial: Option<PartialMessage>,
    binary: BytesMut,
    mode: Option<SendingMode>,
    last_seq: Option<u32>,
    expected_seq: Option<u32>,
    lost: u64,
    slots: Vec<Option<Segment>>,
    released: usize,
    candidates: Vec<Segment>,
    stats: ReceiverStats,
}

impl SegmentReceiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReceiverConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    fn deliver(&mut self, segment: &Segment) {
        match segment.kind {
            SegmentKind::Message => self.deliver_message(segment),
            SegmentKind::Blob => self.binary.extend_from_slice(&segment.payload),
        }
    }

    fn deliver_message(&mut self, segment: &Segment) {
        if segment.continuation {
            let extends = self
                .partial
                .as_ref()
                .is_some_and(|partial| partial.schema_id == segment.schema_id);
            if !extends {
                debug!(seq = segment.seq, "message continuation without its start");
                self.partial = None;
                return;
            }
            if let Some(partial) = self.partial.as_mut() {
                partial.text.extend_from_slice(&segment.payload);
            }
        } else {
            if let Some(dropped) = self.partial.take() {
                debug!(
                    schema_id = dropped.schema_id,
                    len = dropped.text.len(),
                    "incomplete message dropped"
                );
            }
            self.partial = Some(PartialMessage {
                schema_id: segment.schema_id,
                text: BytesMut::from(segment.payload.as_ref()),
            });
        }

        let len = self.partial.as_ref().map_or(0, |partial| partial.text.len());
        if len > self.config.max_message_len {
            warn!(len, max = self.config.max_message_len, "split message too long, dropped");
            self.partial = None;
            return;
        }
        if segment.more {
            return;
        }
        if let Some(done) = self.partial.take() {
            self.messages.push_back(ReceivedMessage {
                schema_id: done.schema_id,
                text: String::from_utf8_lossy(&done.text).into_owned(),
            });
        }
    }

    fn count_distinct(&mut self, segment: &Segment) {
        self.stats.distinct_bits = self
            .stats
            .distinct_bits
            .saturating_add(bits(segment.wire_size()));
        match segment.kind {
            SegmentKind::Message => self.stats.messages.record(segment.payload.len()),
            SegmentKind::Blob => self.stats.blobs.record(segment.payload.len()),
        }
    }

    fn put_stream(&mut self, segment: Segment) {
        if let Some(expected) = self.expected_seq {
            if segment.seq < expected {
                trace!(seq = segment.seq, "repeated stream segment");
                return;
            }
            if segment.seq > expected {
                let gap = u64::from(segment.seq - expected);
                debug!(expected, seq = segment.seq, gap, "stream segments lost");
                self.lost = self.lost.saturating_add(gap);
                self.partial = None;
            }
        }
        self.expected_seq = Some(segment.seq.wrapping_add(1));
        self.count_distinct(&segment);
        self.deliver(&segment);
    }

    fn put_lake(&mut self, segment: Segment) -> Result<()> {
        if segment.seq >= segment.lake_total {
            return Err(TransportError::SequenceOutOfRange {
                seq: segment.seq,
                total: segment.lake_total,
            });
        }
        let total = segment.lake_total as usize;
        if total > self.config.max_lake_units {
            return Err(TransportError::LakeTooLarge {
                total: segment.lake_total,
                max: self.config.max_lake_units,
            });
        }

        if self.slots.is_empty() {
            self.start_lake(total);
        } else if self.slots.len() != total {
            self.propose_lake(segment);
            return Ok(());
        }
        if !self.candidates.is_empty() {
            trace!(held = self.candidates.len(), "lake size change not confirmed");
            self.candidates.clear();
        }
        self.store_lake(segment);
        Ok(())
    }

    fn start_lake(&mut self, total: usize) {
        self.slots = vec![None; total];
        self.released = 0;
        self.partial = None;
    }

    fn propose_lake(&mut self, segment: Segment) {
        let total = segment.lake_total as usize;
        if self
            .candidates
            .first()
            .is_some_and(|first| first.lake_total != segment.lake_total)
        {
            self.candidates.clear();
        }
        self.candidates.push(segment);
        if self.candidates.len() < self.config.lake_confirm_units {
            debug!(
                current = self.slots.len(),
                announced = total,
                held = self.candidates.len(),
                "unit from a lake of another size held back"
            );
            return;
        }

        info!(old = self.slots.len(), new = total, "lake size changed, restarting");
        self.start_lake(total);
        for candidate in std::mem::take(&mut self.candidates) {
            self.store_lake(candidate);
        }
    }

    fn store_lake(&mut self, segment: Segment) {
        let slot = segment.seq as usize;
        if !matches!(self.slots.get(slot), Some(None)) {
            return;
        }
        self.count_distinct(&segment);
        self.slots[slot] = Some(segment);

        while let Some(Some(ready)) = self.slots.get(self.released) {
            let ready = ready.clone();
            self.deliver(&ready);
            self.released += 1;
        }
        if self.released == self.slots.len() {
            debug!(units = self.slots.len(), "lake complete");
        }
    }
}

impl UnitReceiver for SegmentReceiver {
    fn put_unit(&mut self, unit: &[u8]) -> Result<()> {
        let segment = match decode_segment(unit) {
            Ok(segment) => segment,
            Err(err) => {
                self.stats.malformed = self.stats.malformed.saturating_add(1);
                return Err(err);
            }
        };

        self.stats.units = self.stats.units.saturating_add(1);
        self.stats.raw_bits = self.stats.raw_bits.saturating_add(bits(unit.len()));
        let seq = segment.seq;

        if segment.is_lake() {
            self.put_lake(segment)?;
            self.mode = Some(SendingMode::Lake);
        } else {
            self.put_stream(segment);
            self.mode = Some(SendingMode::Stream);
        }
        self.last_seq = Some(seq);
        Ok(())
    }

    fn poll_message(&mut self) -> Option<ReceivedMessage> {
        self.messages.pop_front()
    }

    fn poll_binary(&mut self, limit: usize) -> Bytes {
        let take = limit.min(self.binary.len());
        self.binary.split_to(take).freeze()
    }

    fn buffer_status(&self) -> Vec<bool> {
        self.slots.iter().map(Option::is_some).collect()
    }

    fn message_lost_count(&self) -> u64 {
        self.lost
    }

    fn sending_mode(&self) -> Option<SendingMode> {
        self.mode
    }

    fn last_segment_seen(&self) -> Option<u32> {
        self.last_seq
    }

    fn stats(&self) -> ReceiverStats {
        self.stats
    }

    fn reset(&mut self) {
        *self = Self::with_config(self.config.clone());
    }
}
