use tracing::{debug, info};

use crate::codec::CodeReader;
use crate::threshold::{guess_threshold, ThresholdRange, DEFAULT_THRESHOLD};

/// How captured images are binarized before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinarizationMode {
    /// Let the codec pick a threshold from the image histogram.
    #[default]
    Histogram,
    /// Always use the same threshold.
    Fixed { threshold: u8 },
    /// Start from `threshold` and search `range` whenever a decode fails.
    Guess { threshold: u8, range: ThresholdRange },
}

impl BinarizationMode {
    /// Threshold search with the default range and starting threshold.
    pub fn guess() -> Self {
        Self::Guess {
            threshold: DEFAULT_THRESHOLD,
            range: ThresholdRange::default(),
        }
    }
}

/// Decodes captured images, re-tuning the binarization threshold on failure.
///
/// In guess mode a failed decode at the current threshold triggers one
/// threshold search on that image. If the search finds a better value it is
/// adopted for this and all later frames, so the cost is only paid when the
/// lighting actually drifts.
#[derive(Debug)]
pub struct AdaptiveDecoder<C> {
    codec: C,
    mode: BinarizationMode,
    searches: u64,
    adoptions: u64,
}

impl<C: CodeReader> AdaptiveDecoder<C> {
    pub fn new(codec: C) -> Self {
        Self::with_mode(codec, BinarizationMode::default())
    }

    pub fn with_mode(codec: C, mode: BinarizationMode) -> Self {
        Self {
            codec,
            mode,
            searches: 0,
            adoptions: 0,
        }
    }

    /// Decode one image under the current binarization policy.
    pub fn decode(&mut self, image: &C::Image) -> Option<String> {
        match self.mode {
            BinarizationMode::Histogram => self.codec.decode(image, None),
            BinarizationMode::Fixed { threshold } => self.codec.decode(image, Some(threshold)),
            BinarizationMode::Guess { threshold, range } => {
                if let Some(text) = self.codec.decode(image, Some(threshold)) {
                    return Some(text);
                }
                self.searches = self.searches.saturating_add(1);
                let suggested =
                    guess_threshold(&self.codec, std::slice::from_ref(image), range, threshold)?;
                if suggested != threshold {
                    info!(from = threshold, to = suggested, "binarization threshold adjusted");
                    self.adoptions = self.adoptions.saturating_add(1);
                }
                self.mode = BinarizationMode::Guess {
                    threshold: suggested,
                    range,
                };
                let decoded = self.codec.decode(image, Some(suggested));
                debug!(threshold = suggested, decoded = decoded.is_some(), "retried decode");
                decoded
            }
        }
    }

    pub fn mode(&self) -> BinarizationMode {
        self.mode
    }

    /// Threshold in use, or `None` in histogram mode.
    pub fn threshold(&self) -> Option<u8> {
        match self.mode {
            BinarizationMode::Histogram => None,
            BinarizationMode::Fixed { threshold } | BinarizationMode::Guess { threshold, .. } => {
                Some(threshold)
            }
        }
    }

    /// Number of threshold searches run so far.
    pub fn searches(&self) -> u64 {
        self.searches
    }

    /// Number of searches that changed the threshold.
    pub fn adoptions(&self) -> u64 {
        self.adoptions
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}
