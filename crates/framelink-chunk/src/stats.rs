use std::time::Instant;

use framelink_loop::FrameClock;
use framelink_transport::{SenderStats, SendingMode};
use serde::Serialize;

/// Encoder-side statistics.
#[derive(Debug, Clone, Serialize)]
pub struct EncoderStats {
    pub mode: SendingMode,
    pub frames_sent: u64,
    pub nominal_fps: u32,
    /// Rate implied by the last inter-frame interval.
    pub actual_fps: f64,
    /// Input bytes read but not yet handed to the sender.
    pub raw_buffered_bytes: usize,
    /// Records dropped because they were malformed or rejected.
    pub discarded_records: u64,
    /// Bits per second the nominal rate would carry at the average unit size.
    pub nominal_bps: f64,
    /// Bits per second actually emitted since the first frame.
    pub actual_bps: f64,
    pub sender: SenderStats,
}

/// Counters shared by the chunker variants.
#[derive(Debug, Default)]
pub(crate) struct EncoderCounters {
    frames_sent: u64,
    discarded: u64,
    clock: FrameClock,
    started: Option<Instant>,
}

impl EncoderCounters {
    /// Record one emitted frame and return its sequence number.
    pub(crate) fn frame_emitted(&mut self) -> u64 {
        let now = Instant::now();
        self.started.get_or_insert(now);
        self.clock.tick_at(now);
        let seq = self.frames_sent;
        self.frames_sent = self.frames_sent.saturating_add(1);
        seq
    }

    pub(crate) fn record_discarded(&mut self) {
        self.discarded = self.discarded.saturating_add(1);
    }

    pub(crate) fn discarded(&self) -> u64 {
        self.discarded
    }

    pub(crate) fn snapshot(
        &self,
        mode: SendingMode,
        nominal_fps: u32,
        raw_buffered_bytes: usize,
        sender: SenderStats,
    ) -> EncoderStats {
        let elapsed = self
            .started
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let actual_bps = if elapsed > 0.0 {
            sender.raw_bits as f64 / elapsed
        } else {
            0.0
        };
        let avg_unit_bits = if sender.frames > 0 {
            sender.raw_bits as f64 / sender.frames as f64
        } else {
            0.0
        };

        EncoderStats {
            mode,
            frames_sent: self.frames_sent,
            nominal_fps,
            actual_fps: self.clock.actual_fps(),
            raw_buffered_bytes,
            discarded_records: self.discarded,
            nominal_bps: avg_unit_bits * f64::from(nominal_fps),
            actual_bps,
            sender,
        }
    }
}
