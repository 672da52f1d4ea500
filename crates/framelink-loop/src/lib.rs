//! Suspendable, self-pacing control loops.
//!
//! This is the lowest layer of framelink. Both the encode side (poll the
//! chunker, hand the frame to the codec) and the decode side (capture an
//! image, decode it, feed the tracker) run inside a [`SuspendableLoop`]:
//! - [`LoopState`] is the three-state control model (active, suspended, finished)
//! - [`LoopHandle`] controls a running loop from any thread
//! - [`pacing`] holds frame-rate helpers and the presentation refresh throttle

pub mod pacing;
pub mod runner;
pub mod state;

pub use pacing::{
    effective_frame_rate, frame_interval, FrameClock, RefreshThrottle, DEFAULT_REFRESH_INTERVAL,
};
pub use runner::{resilient, LoopAction, LoopConfig, LoopHandle, SuspendableLoop, DEFAULT_IDLE_TICK};
pub use state::LoopState;
