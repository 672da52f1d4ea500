use std::collections::VecDeque;

use serde::Serialize;

use crate::error::TrackerError;

/// Default number of frames in the link quality window.
pub const DEFAULT_WINDOW_WIDTH: usize = 30;

/// Fixed-width history of per-frame decode outcomes.
///
/// Holds at most `width` entries; the number of successes is maintained on
/// every push instead of being recounted.
#[derive(Debug, Clone)]
pub struct LinkQualityWindow {
    entries: VecDeque<bool>,
    width: usize,
    good: usize,
}

impl LinkQualityWindow {
    pub fn new(width: usize) -> Result<Self, TrackerError> {
        if width == 0 {
            return Err(TrackerError::ZeroWidth);
        }
        Ok(Self {
            entries: VecDeque::with_capacity(width),
            width,
            good: 0,
        })
    }

    /// Record one frame outcome, evicting the oldest once full.
    pub fn push(&mut self, decoded: bool) {
        if self.entries.len() == self.width && self.entries.pop_front() == Some(true) {
            self.good -= 1;
        }
        self.entries.push_back(decoded);
        if decoded {
            self.good += 1;
        }
    }

    /// Successful frames currently in the window.
    pub fn good(&self) -> usize {
        self.good
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == self.width
    }

    /// Successes as a percentage of the window width.
    pub fn quality_percent(&self) -> u32 {
        (self.good * 100 / self.width) as u32
    }

    /// Outcomes from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.entries.iter().copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.good = 0;
    }
}

impl Default for LinkQualityWindow {
    fn default() -> Self {
        Self {
            entries: VecDeque::with_capacity(DEFAULT_WINDOW_WIDTH),
            width: DEFAULT_WINDOW_WIDTH,
            good: 0,
        }
    }
}

/// Session counters kept by the tracker. They only grow until reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CumulativeStats {
    pub frames_seen: u64,
    pub frames_lost: u64,
    pub messages_received: u64,
}

impl CumulativeStats {
    pub fn good_frames(&self) -> u64 {
        self.frames_seen - self.frames_lost
    }

    /// Decoded frames as a percentage of all frames seen.
    pub fn quality_percent(&self) -> u32 {
        (self.good_frames() * 100 / self.frames_seen.max(1)) as u32
    }

    pub(crate) fn record(&mut self, decoded: bool) {
        self.frames_seen = self.frames_seen.saturating_add(1);
        if !decoded {
            self.frames_lost = self.frames_lost.saturating_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn zero_width_rejected() {
        assert_eq!(LinkQualityWindow::new(0).unwrap_err(), TrackerError::ZeroWidth);
    }

    #[test]
    fn evicts_oldest_and_tracks_good() {
        let mut window = LinkQualityWindow::new(3).unwrap();
        for decoded in [true, false, true] {
            window.push(decoded);
        }
        assert_eq!((window.len(), window.good()), (3, 2));

        window.push(false);
        assert_eq!(window.iter().collect::<Vec<_>>(), vec![false, true, false]);
        assert_eq!(window.good(), 1);
        assert_eq!(window.quality_percent(), 33);

        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.good(), 0);
    }

    #[test]
    fn cumulative_quality() {
        let mut totals = CumulativeStats::default();
        assert_eq!(totals.quality_percent(), 0);
        for decoded in [true, true, true, false] {
            totals.record(decoded);
        }
        assert_eq!(totals.good_frames(), 3);
        assert_eq!(totals.quality_percent(), 75);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn window_bounded_and_count_exact(
            width in 1usize..50,
            outcomes in proptest::collection::vec(any::<bool>(), 0..200),
        ) {
            let mut window = LinkQualityWindow::new(width).unwrap();
            for decoded in outcomes {
                window.push(decoded);
                prop_assert!(window.len() <= width);
                prop_assert_eq!(window.good(), window.iter().filter(|d| *d).count());
            }
        }
    }
}
