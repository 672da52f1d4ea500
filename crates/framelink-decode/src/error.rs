/// Invalid threshold search configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThresholdError {
    #[error("threshold {0} outside [0, 255]")]
    OutOfRange(i32),

    #[error("threshold range is inverted ({min} > {max})")]
    Inverted { min: i32, max: i32 },

    #[error("threshold step must be positive, got {0}")]
    InvalidStep(i32),
}

/// Invalid tracker configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    #[error("link quality window width must be at least 1")]
    ZeroWidth,
}
