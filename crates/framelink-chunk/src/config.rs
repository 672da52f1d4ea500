use std::time::Duration;

use framelink_loop::{effective_frame_rate, frame_interval};

/// Default number of input bytes read per poll.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 16 * 1024;

/// Frame rate used when none (or a non-positive one) is configured.
pub const DEFAULT_ENCODE_FRAME_RATE: u32 = 10;

/// Records are separated by a line holding only `---`.
pub const RECORD_DELIMITER: &str = "\n---\n";

/// Configuration for the chunkers.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Bytes read from the input per poll. Default: 16 KiB.
    pub read_chunk_size: usize,
    /// Zero-pad an under-sized final blob to the full unit size. Default: false.
    pub pad: bool,
    /// Target frames per second; `<= 0` means 10.
    pub frame_rate: i32,
    /// Delimiter opening a message record. Default: empty.
    pub record_begin: String,
    /// Delimiter closing a message record. Default: a `---` line.
    pub record_end: String,
}

impl ChunkerConfig {
    /// Frame rate after applying the default.
    pub fn effective_frame_rate(&self) -> u32 {
        effective_frame_rate(self.frame_rate, DEFAULT_ENCODE_FRAME_RATE)
    }

    /// Time between two frames at the effective rate.
    pub fn frame_interval(&self) -> Duration {
        frame_interval(self.frame_rate, DEFAULT_ENCODE_FRAME_RATE)
    }
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            pad: false,
            frame_rate: 0,
            record_begin: String::new(),
            record_end: RECORD_DELIMITER.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_positive_rate_means_ten_fps() {
        let mut config = ChunkerConfig::default();
        assert_eq!(config.effective_frame_rate(), 10);
        config.frame_rate = -3;
        assert_eq!(config.frame_interval(), Duration::from_millis(100));
        config.frame_rate = 25;
        assert_eq!(config.effective_frame_rate(), 25);
    }
}
