use std::collections::VecDeque;
use std::time::{Duration, Instant};

use base64::Engine as _;
use bytes::Bytes;
use framelink_loop::{effective_frame_rate, RefreshThrottle, DEFAULT_REFRESH_INTERVAL};
use framelink_transport::{CategoryStats, ReceivedMessage, SendingMode, UnitReceiver};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::error::TrackerError;
use crate::meter::{buffer_meter, value_meter};
use crate::quality::{CumulativeStats, LinkQualityWindow, DEFAULT_WINDOW_WIDTH};

/// Nominal capture rate used when none (or a non-positive one) is configured.
pub const DEFAULT_DECODE_FRAME_RATE: u32 = 30;

const LINK_METER_WIDTH: usize = 10;
const BUFFER_METER_WIDTH: usize = 20;

/// Configuration for a [`FrameTracker`].
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Frames in the link quality window. Default: 30.
    pub window_width: usize,
    /// Minimum time between two emitted snapshots. Default: 500 ms.
    pub refresh_interval: Duration,
    /// Nominal capture rate; `<= 0` means 30.
    pub frame_rate: i32,
    /// Number of frames the session is expected to contain, if known.
    pub expected_frames: Option<u64>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            window_width: DEFAULT_WINDOW_WIDTH,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            frame_rate: 0,
            expected_frames: None,
        }
    }
}

/// Whether a lake completion bitmap is non-empty and fully set.
pub fn is_complete(status: &[bool]) -> bool {
    !status.is_empty() && status.iter().all(|received| *received)
}

/// Point-in-time view of the decoder side statistics.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub mode: Option<SendingMode>,
    pub frames_seen: u64,
    pub frames_lost: u64,
    pub expected_frames: Option<u64>,
    pub nominal_fps: u32,
    /// Capture time the frames seen represent at the nominal rate.
    pub capture_secs: f64,
    pub window_good: usize,
    pub window_width: usize,
    pub window_quality_percent: u32,
    pub cumulative_quality_percent: u32,
    pub link_meter: String,
    pub messages_received: u64,
    pub messages_lost: u64,
    pub message_segments: CategoryStats,
    pub blob_segments: CategoryStats,
    pub raw_bits: u64,
    pub distinct_bits: u64,
    pub raw_bps: f64,
    pub distinct_bps: f64,
    /// Payload bits per second, framing overhead excluded.
    pub effective_bps: f64,
    pub processing_ms_per_frame: f64,
    pub processing_fps: f64,
    /// Lake units received over lake size.
    pub lake_progress: Option<f64>,
    pub buffer_meter: Option<String>,
    pub lake_complete: bool,
}

/// Link quality and statistics for one decoding session.
///
/// The tracker is the only writer of its window and counters. Each observed
/// frame must be reported exactly once, in arrival order, through
/// [`on_good_frame`](Self::on_good_frame), [`on_lost_frame`](Self::on_lost_frame)
/// or [`new_frame`](Self::new_frame).
#[derive(Debug)]
pub struct FrameTracker<R> {
    receiver: R,
    config: TrackerConfig,
    window: LinkQualityWindow,
    totals: CumulativeStats,
    messages: VecDeque<ReceivedMessage>,
    throttle: RefreshThrottle,
    started: Option<Instant>,
    lake_done: bool,
}

impl<R: UnitReceiver> FrameTracker<R> {
    /// Create a tracker with default configuration.
    pub fn new(receiver: R) -> Self {
        Self {
            receiver,
            config: TrackerConfig::default(),
            window: LinkQualityWindow::default(),
            totals: CumulativeStats::default(),
            messages: VecDeque::new(),
            throttle: RefreshThrottle::new(DEFAULT_REFRESH_INTERVAL),
            started: None,
            lake_done: false,
        }
    }

    /// Create a tracker with explicit configuration.
    pub fn with_config(receiver: R, config: TrackerConfig) -> Result<Self, TrackerError> {
        let window = LinkQualityWindow::new(config.window_width)?;
        let throttle = RefreshThrottle::new(config.refresh_interval);
        Ok(Self {
            window,
            throttle,
            config,
            ..Self::new(receiver)
        })
    }

    /// A frame was decoded: forward its unit to the receiver.
    ///
    /// A unit the receiver rejects is counted as a lost frame. Returns
    /// whether the unit was accepted.
    pub fn on_good_frame(&mut self, unit: &[u8]) -> bool {
        self.mark_started();
        match self.receiver.put_unit(unit) {
            Ok(()) => {
                self.record(true);
                self.drain_messages();
                true
            }
            Err(err) => {
                warn!(error = %err, len = unit.len(), "decoded frame rejected by receiver");
                self.record(false);
                false
            }
        }
    }

    /// A frame could not be decoded.
    pub fn on_lost_frame(&mut self) {
        self.mark_started();
        self.record(false);
    }

    /// Report a codec result: the decoded text (base64 of the unit) or `None`.
    pub fn new_frame(&mut self, decoded: Option<&str>) -> bool {
        let Some(text) = decoded else {
            self.on_lost_frame();
            return false;
        };
        match base64::engine::general_purpose::STANDARD.decode(text.trim()) {
            Ok(unit) => self.on_good_frame(&unit),
            Err(err) => {
                debug!(error = %err, "decoded text is not base64");
                self.on_lost_frame();
                false
            }
        }
    }

    /// Next message reassembled from the frames seen so far.
    pub fn poll_message(&mut self) -> Option<ReceivedMessage> {
        self.messages.pop_front()
    }

    /// Up to `limit` reassembled bytes of a binary transfer.
    pub fn poll_binary(&mut self, limit: usize) -> Bytes {
        self.receiver.poll_binary(limit)
    }

    /// Whether every unit of a lake transfer has been received.
    pub fn is_lake_transfer_complete(&self) -> bool {
        is_complete(&self.receiver.buffer_status())
    }

    pub fn window(&self) -> &LinkQualityWindow {
        &self.window
    }

    pub fn totals(&self) -> &CumulativeStats {
        &self.totals
    }

    pub fn receiver(&self) -> &R {
        &self.receiver
    }

    pub fn receiver_mut(&mut self) -> &mut R {
        &mut self.receiver
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Clear the quality window and session counters.
    pub fn reset(&mut self) {
        self.window.clear();
        self.totals = CumulativeStats::default();
        self.started = None;
        self.lake_done = false;
        self.throttle.reset();
        info!("link statistics reset");
    }

    /// Statistics as of now.
    pub fn snapshot(&self) -> StatsSnapshot {
        self.snapshot_at(Instant::now())
    }

    /// Statistics as of `now`, if the refresh interval has elapsed.
    ///
    /// Only controls how often snapshots are produced; frame accounting is
    /// never throttled.
    pub fn maybe_snapshot(&mut self) -> Option<StatsSnapshot> {
        self.maybe_snapshot_at(Instant::now())
    }

    pub fn maybe_snapshot_at(&mut self, now: Instant) -> Option<StatsSnapshot> {
        self.throttle
            .ready_at(now)
            .then(|| self.snapshot_at(now))
    }

    pub fn snapshot_at(&self, now: Instant) -> StatsSnapshot {
        let receiver = self.receiver.stats();
        let nominal_fps = effective_frame_rate(self.config.frame_rate, DEFAULT_DECODE_FRAME_RATE);
        let elapsed = self
            .started
            .map(|started| now.saturating_duration_since(started).as_secs_f64())
            .unwrap_or(0.0);
        let per_sec = |bits: u64| if elapsed > 0.0 { bits as f64 / elapsed } else { 0.0 };
        let frames = self.totals.frames_seen;

        let status = self.receiver.buffer_status();
        let lake = self.receiver.sending_mode() == Some(SendingMode::Lake) && !status.is_empty();
        let (lake_progress, meter) = if lake {
            let filled = status.iter().filter(|b| **b).count();
            let cursor = self.receiver.last_segment_seen().map(|seq| seq as usize);
            (
                Some(filled as f64 / status.len() as f64),
                Some(buffer_meter(&status, BUFFER_METER_WIDTH, cursor)),
            )
        } else {
            (None, None)
        };

        let window_quality_percent = self.window.quality_percent();
        StatsSnapshot {
            mode: self.receiver.sending_mode(),
            frames_seen: frames,
            frames_lost: self.totals.frames_lost,
            expected_frames: self.config.expected_frames,
            nominal_fps,
            capture_secs: frames as f64 / f64::from(nominal_fps),
            window_good: self.window.good(),
            window_width: self.window.width(),
            window_quality_percent,
            cumulative_quality_percent: self.totals.quality_percent(),
            link_meter: value_meter(i64::from(window_quality_percent), 0, 100, LINK_METER_WIDTH),
            messages_received: self.totals.messages_received,
            messages_lost: self.receiver.message_lost_count(),
            message_segments: receiver.messages,
            blob_segments: receiver.blobs,
            raw_bits: receiver.raw_bits,
            distinct_bits: receiver.distinct_bits,
            raw_bps: per_sec(receiver.raw_bits),
            distinct_bps: per_sec(receiver.distinct_bits),
            effective_bps: per_sec(receiver.messages.bits.saturating_add(receiver.blobs.bits)),
            processing_ms_per_frame: elapsed * 1000.0 / frames.max(1) as f64,
            processing_fps: if elapsed > 0.0 { frames as f64 / elapsed } else { 0.0 },
            lake_progress,
            buffer_meter: meter,
            lake_complete: lake && is_complete(&status),
        }
    }

    fn mark_started(&mut self) {
        self.started.get_or_insert_with(Instant::now);
    }

    fn record(&mut self, decoded: bool) {
        self.window.push(decoded);
        self.totals.record(decoded);
        trace!(
            decoded,
            window_good = self.window.good(),
            frames = self.totals.frames_seen,
            "frame observed"
        );
    }

    fn drain_messages(&mut self) {
        while let Some(message) = self.receiver.poll_message() {
            self.totals.messages_received = self.totals.messages_received.saturating_add(1);
            self.messages.push_back(message);
        }
        if !self.lake_done && self.is_lake_transfer_complete() {
            self.lake_done = true;
            info!(frames = self.totals.frames_seen, "lake transfer complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use framelink_transport::{SegmentReceiver, SegmentSender, SenderConfig, UnitSender};

    use super::*;

    fn encode(unit: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(unit)
    }

    /// Receiver stub with a settable completion bitmap.
    #[derive(Default)]
    struct BitmapReceiver {
        status: Vec<bool>,
    }

    impl UnitReceiver for BitmapReceiver {
        fn put_unit(&mut self, _unit: &[u8]) -> framelink_transport::Result<()> {
            Ok(())
        }
        fn poll_message(&mut self) -> Option<ReceivedMessage> {
            None
        }
        fn poll_binary(&mut self, _limit: usize) -> Bytes {
            Bytes::new()
        }
        fn buffer_status(&self) -> Vec<bool> {
            self.status.clone()
        }
        fn message_lost_count(&self) -> u64 {
            0
        }
        fn sending_mode(&self) -> Option<SendingMode> {
            Some(SendingMode::Lake)
        }
        fn last_segment_seen(&self) -> Option<u32> {
            None
        }
        fn stats(&self) -> framelink_transport::ReceiverStats {
            Default::default()
        }
        fn reset(&mut self) {
            self.status.clear();
        }
    }

    #[test]
    fn forty_frames_with_five_losses() {
        let mut tracker = FrameTracker::new(BitmapReceiver::default());
        for i in 0..40 {
            if [12, 18, 24, 30, 36].contains(&i) {
                tracker.on_lost_frame();
            } else {
                tracker.on_good_frame(b"unit");
            }
        }

        let snapshot = tracker.snapshot();
        assert_eq!((snapshot.window_good, snapshot.window_width), (25, 30));
        assert_eq!(snapshot.frames_seen - snapshot.frames_lost, 35);
        assert_eq!(snapshot.frames_seen, 40);
        assert_eq!(snapshot.window_quality_percent, 83);
        assert_eq!(snapshot.cumulative_quality_percent, 87);
    }

    #[test]
    fn lake_completion_follows_bitmap() {
        let mut tracker = FrameTracker::new(BitmapReceiver::default());
        assert!(!tracker.is_lake_transfer_complete());

        tracker.receiver_mut().status = vec![true, false, true];
        assert!(!tracker.is_lake_transfer_complete());

        tracker.receiver_mut().status[1] = true;
        assert!(tracker.is_lake_transfer_complete());
        assert!(tracker.snapshot().lake_complete);

        tracker.receiver_mut().status[0] = false;
        assert!(!tracker.is_lake_transfer_complete());
    }

    #[test]
    fn new_frame_decodes_base64_and_collects_messages() {
        let mut sender = SegmentSender::new();
        sender.add_message(3, "hello").unwrap();
        sender.add_message(4, "world").unwrap();
        let mut tracker = FrameTracker::new(SegmentReceiver::new());

        let first = encode(&sender.poll_unit().unwrap());
        assert!(tracker.new_frame(Some(&first)));
        assert!(!tracker.new_frame(None));
        assert!(!tracker.new_frame(Some("%%% not base64")));
        let second = encode(&sender.poll_unit().unwrap());
        assert!(tracker.new_frame(Some(&second)));

        let texts: Vec<String> = std::iter::from_fn(|| tracker.poll_message())
            .map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["hello", "world"]);
        assert_eq!(tracker.totals().frames_seen, 4);
        assert_eq!(tracker.totals().frames_lost, 2);
        assert_eq!(tracker.totals().messages_received, 2);
    }

    #[test]
    fn rejected_unit_counts_as_lost() {
        let mut tracker = FrameTracker::new(SegmentReceiver::new());
        assert!(!tracker.on_good_frame(b"definitely not a segment"));
        assert_eq!(tracker.totals().frames_lost, 1);
        assert_eq!(tracker.window().good(), 0);
    }

    #[test]
    fn lake_snapshot_reports_progress_and_meter() {
        let mut sender = SegmentSender::with_config(SenderConfig {
            mode: SendingMode::Lake,
            ..SenderConfig::default()
        });
        for chunk in [b"aa", b"bb", b"cc", b"dd"] {
            sender.add_blob(chunk).unwrap();
        }
        let units: Vec<Bytes> = (0..4).filter_map(|_| sender.poll_unit()).collect();
        let mut tracker = FrameTracker::new(SegmentReceiver::new());

        tracker.on_good_frame(&units[0]);
        tracker.on_good_frame(&units[2]);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.mode, Some(SendingMode::Lake));
        assert_eq!(snapshot.lake_progress, Some(0.5));
        assert!(snapshot.buffer_meter.unwrap().ends_with("50% (2/4)"));
        assert!(!snapshot.lake_complete);

        tracker.on_good_frame(&units[1]);
        tracker.on_good_frame(&units[3]);
        assert!(tracker.is_lake_transfer_complete());
        assert_eq!(tracker.poll_binary(usize::MAX).as_ref(), b"aabbccdd");
    }

    #[test]
    fn snapshots_are_throttled_but_counting_is_not() {
        let config = TrackerConfig {
            refresh_interval: Duration::from_millis(500),
            ..TrackerConfig::default()
        };
        let mut tracker = FrameTracker::with_config(BitmapReceiver::default(), config).unwrap();
        let t0 = Instant::now();

        tracker.on_lost_frame();
        assert!(tracker.maybe_snapshot_at(t0).is_some());
        tracker.on_lost_frame();
        assert!(tracker.maybe_snapshot_at(t0 + Duration::from_millis(100)).is_none());
        let later = tracker
            .maybe_snapshot_at(t0 + Duration::from_millis(600))
            .unwrap();
        assert_eq!(later.frames_seen, 2);
    }

    #[test]
    fn reset_clears_window_and_totals() {
        let mut tracker = FrameTracker::new(BitmapReceiver::default());
        tracker.on_good_frame(b"x");
        tracker.on_lost_frame();

        tracker.reset();
        assert_eq!(*tracker.totals(), CumulativeStats::default());
        assert!(tracker.window().is_empty());
    }

    #[test]
    fn invalid_config_rejected() {
        let config = TrackerConfig {
            window_width: 0,
            ..TrackerConfig::default()
        };
        assert!(matches!(
            FrameTracker::with_config(BitmapReceiver::default(), config),
            Err(TrackerError::ZeroWidth)
        ));
    }

    #[test]
    fn snapshot_serializes() {
        let tracker = FrameTracker::new(SegmentReceiver::new());
        let json = serde_json::to_value(tracker.snapshot()).unwrap();
        assert_eq!(json["frames_seen"], 0);
        assert_eq!(json["nominal_fps"], 30);
        assert!(json["mode"].is_null());
    }
}
