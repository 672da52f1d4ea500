//! Decoder side of framelink.
//!
//! Captured frames go through a [`CodeReader`] (the visual codec). When a
//! fixed binarization threshold stops working, the [`AdaptiveDecoder`]
//! searches nearby thresholds with [`guess_threshold`]. Every attempt,
//! decoded or not, is reported to a [`FrameTracker`], which keeps the
//! sliding link-quality window, forwards decoded units to the transport
//! receiver and produces throttled [`StatsSnapshot`]s.

pub mod adaptive;
pub mod codec;
pub mod error;
pub mod meter;
pub mod quality;
pub mod threshold;
pub mod tracker;

pub use adaptive::{AdaptiveDecoder, BinarizationMode};
pub use codec::{CodeReader, CodeWriter, LineCodec};
pub use error::{ThresholdError, TrackerError};
pub use meter::{buffer_meter, value_meter};
pub use quality::{CumulativeStats, LinkQualityWindow, DEFAULT_WINDOW_WIDTH};
pub use threshold::{
    count_decoded, guess_threshold, to_threshold, ThresholdRange, DEFAULT_THRESHOLD,
    THRESHOLD_MAX, THRESHOLD_MIN, THRESHOLD_STEP,
};
pub use tracker::{
    is_complete, FrameTracker, StatsSnapshot, TrackerConfig, DEFAULT_DECODE_FRAME_RATE,
};
