use tracing::{debug, trace};

use crate::codec::CodeReader;
use crate::error::ThresholdError;

/// Lower bound of the default search range.
pub const THRESHOLD_MIN: u8 = 60;
/// Upper bound of the default search range.
pub const THRESHOLD_MAX: u8 = 220;
/// Distance between two candidates of the default search.
pub const THRESHOLD_STEP: u8 = 10;
/// Binarization threshold used before any search has run.
pub const DEFAULT_THRESHOLD: u8 = 128;

/// Validated `[min, max]` search interval with a positive step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdRange {
    min: u8,
    max: u8,
    step: u8,
}

impl ThresholdRange {
    /// Validate a search interval. Bounds must lie in `[0, 255]`, `min` must
    /// not exceed `max` and `step` must be positive.
    pub fn new(min: i32, max: i32, step: i32) -> Result<Self, ThresholdError> {
        let min_u8 = to_threshold(min)?;
        let max_u8 = to_threshold(max)?;
        if min > max {
            return Err(ThresholdError::Inverted { min, max });
        }
        let step = u8::try_from(step)
            .ok()
            .filter(|s| *s > 0)
            .ok_or(ThresholdError::InvalidStep(step))?;
        Ok(Self {
            min: min_u8,
            max: max_u8,
            step,
        })
    }

    pub fn min(&self) -> u8 {
        self.min
    }

    pub fn max(&self) -> u8 {
        self.max
    }

    pub fn step(&self) -> u8 {
        self.step
    }

    /// Candidates in search order: `hint + k*step` then `hint - k*step` for
    /// k = 1, 2, ... while either side is still inside the interval.
    pub fn candidates(&self, hint: u8) -> impl Iterator<Item = u8> {
        let (min, max, step, hint) = (
            i32::from(self.min),
            i32::from(self.max),
            i32::from(self.step),
            i32::from(hint),
        );
        (1..)
            .map(move |k| k * step)
            .take_while(move |delta| hint - delta >= min || hint + delta <= max)
            .flat_map(move |delta| [hint + delta, hint - delta])
            .filter(move |t| (min..=max).contains(t))
            .map(|t| t as u8)
    }
}

impl Default for ThresholdRange {
    fn default() -> Self {
        Self {
            min: THRESHOLD_MIN,
            max: THRESHOLD_MAX,
            step: THRESHOLD_STEP,
        }
    }
}

/// Validate a single threshold value.
pub fn to_threshold(value: i32) -> Result<u8, ThresholdError> {
    u8::try_from(value).map_err(|_| ThresholdError::OutOfRange(value))
}

/// Number of `images` the codec decodes at `threshold`.
pub fn count_decoded<C: CodeReader>(codec: &C, images: &[C::Image], threshold: u8) -> usize {
    images
        .iter()
        .filter(|image| codec.decode(image, Some(threshold)).is_some())
        .count()
}

/// Search for a threshold that decodes more of `images` than any earlier
/// candidate, expanding outward from `hint`.
///
/// Stops at the first candidate that decodes every image. Ties keep the
/// earlier (closer to `hint`) candidate. Returns `None` when no candidate
/// decodes anything.
pub fn guess_threshold<C: CodeReader>(
    codec: &C,
    images: &[C::Image],
    range: ThresholdRange,
    hint: u8,
) -> Option<u8> {
    if images.is_empty() {
        return None;
    }

    let mut best: Option<(u8, usize)> = None;
    let mut tried = 0usize;
    for threshold in range.candidates(hint) {
        tried += 1;
        let decoded = count_decoded(codec, images, threshold);
        trace!(threshold, decoded, "threshold candidate");
        if decoded > best.map_or(0, |(_, n)| n) {
            best = Some((threshold, decoded));
        }
        if decoded == images.len() {
            break;
        }
    }

    debug!(hint, tried, best = ?best, "threshold search done");
    best.map(|(threshold, _)| threshold)
}
