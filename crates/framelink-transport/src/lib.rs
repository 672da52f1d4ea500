//! Transport units for framelink.
//!
//! The chunker and the decoder only talk to a transport through the
//! [`UnitSender`] and [`UnitReceiver`] traits. A *unit* is the bounded byte
//! payload carried by one visual frame.
//!
//! This crate also ships a reference implementation of those traits, the
//! segment transport. Every unit is one segment:
//! - 2-byte magic ("FL") for sanity checking captured payloads
//! - 1-byte kind (message or blob), with flags marking a message split
//!   over consecutive segments
//! - 2-byte schema id, 4-byte sequence number, 4-byte lake total
//! - 2-byte payload length followed by the payload
//!
//! In lake mode the sequence number is the segment's slot in the replayed
//! set and the lake total is the size of that set, so a receiver joining at
//! any point can fill in a completion bitmap.

pub mod error;
pub mod receiver;
pub mod segment;
pub mod sender;
pub mod stats;
pub mod traits;

pub use error::{Result, TransportError};
pub use receiver::{
    ReceiverConfig, SegmentReceiver, DEFAULT_LAKE_CONFIRM_UNITS, DEFAULT_MAX_LAKE_UNITS,
};
pub use segment::{
    decode_segment, encode_segment, Segment, SegmentKind, HEADER_SIZE, MAGIC, MAX_SEGMENT_PAYLOAD,
};
pub use sender::{SegmentSender, SenderConfig, DEFAULT_FRAME_MAX_LENGTH, DEFAULT_MAX_MESSAGE_LEN};
pub use stats::{CategoryStats, ReceiverStats, SenderStats};
pub use traits::{ReceivedMessage, SendingMode, UnitReceiver, UnitSender};
