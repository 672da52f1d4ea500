//! Chunking of outgoing data into frame-sized transport units.
//!
//! A [`FrameSource`] hands out one frame payload per poll. Two variants
//! exist: [`BinaryChunker`] cuts an undifferentiated byte stream into
//! fixed-size blobs, [`MessageChunker`] forwards `<schema-id> <payload>`
//! records one message at a time. Both follow the sender's
//! [`SendingMode`](framelink_transport::SendingMode):
//!
//! - **Stream**: input is read one bounded chunk at a time and every unit
//!   is emitted once.
//! - **Lake**: the whole input is drained on the first poll, split up
//!   front, and the sender replays the resulting unit set.
//!
//! Unit size is asked from the sender on every poll, so changing its frame
//! length takes effect immediately.

pub mod binary;
pub mod config;
pub mod error;
pub mod frame;
pub mod message;
pub mod raw;
pub mod stats;

pub use binary::BinaryChunker;
pub use config::{
    ChunkerConfig, DEFAULT_ENCODE_FRAME_RATE, DEFAULT_READ_CHUNK_SIZE, RECORD_DELIMITER,
};
pub use error::{ChunkError, RecordError, Result};
pub use frame::{Frame, FramePoll, FrameSource};
pub use message::{parse_record, MessageChunker};
pub use raw::RawBuffer;
pub use stats::EncoderStats;
