use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, TransportError};

/// Segment header: magic (2) + kind (1) + schema (2) + seq (4) + lake total (4) + length (2).
pub const HEADER_SIZE: usize = 15;

/// Magic bytes: "FL" (0x46 0x4C).
pub const MAGIC: [u8; 2] = [0x46, 0x4C];

/// Largest payload a single segment can describe.
pub const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize;

const KIND_MASK: u8 = 0x3F;
/// Kind flag: the payload continues the message of the previous segment.
const FLAG_CONTINUATION: u8 = 0x40;
/// Kind flag: the message goes on in the next segment.
const FLAG_MORE: u8 = 0x80;

/// What a segment's payload represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    /// UTF-8 message text tagged with a schema id.
    Message,
    /// A slice of an undifferentiated byte stream.
    Blob,
}

impl SegmentKind {
    fn to_wire(self) -> u8 {
        match self {
            Self::Message => 1,
            Self::Blob => 2,
        }
    }

    fn from_wire(byte: u8) -> Result<Self> {
        match byte {
            1 => Ok(Self::Message),
            2 => Ok(Self::Blob),
            other => Err(TransportError::UnknownKind(other)),
        }
    }
}

/// One transport unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub kind: SegmentKind,
    /// Schema id of a message segment; 0 for blobs.
    pub schema_id: u16,
    /// Stream: running counter. Lake: slot index in the replayed set.
    pub seq: u32,
    /// Size of the replayed set in lake mode, 0 in stream mode.
    pub lake_total: u32,
    /// This segment continues a message started in the previous one.
    pub continuation: bool,
    /// The message goes on in the next segment.
    pub more: bool,
    pub payload: Bytes,
}

impl Segment {
    /// The total wire size of this segment (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }

    /// Whether this segment belongs to a lake transfer.
    pub fn is_lake(&self) -> bool {
        self.lake_total > 0
    }
}

/// Encode a segment into the wire format.
///
/// ```text
/// ┌──────────┬──────┬──────────┬──────────┬────────────┬──────────┬──────────┐
/// │ Magic 2B │ Kind │ Schema   │ Seq      │ Lake total │ Length   │ Payload  │
/// │ "FL"     │ 1B   │ (2B LE)  │ (4B LE)  │ (4B LE)    │ (2B LE)  │          │
/// └──────────┴──────┴──────────┴──────────┴────────────┴──────────┴──────────┘
/// ```
///
/// The kind byte carries two flags for messages split over several
/// segments: `0x40` (continues the previous segment) and `0x80` (more
/// segments follow).
pub fn encode_segment(segment: &Segment, dst: &mut BytesMut) -> Result<()> {
    let len = segment.payload.len();
    if len > MAX_SEGMENT_PAYLOAD {
        return Err(TransportError::PayloadTooLarge {
            size: len,
            max: MAX_SEGMENT_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + len);
    dst.put_slice(&MAGIC);
    let mut kind = segment.kind.to_wire();
    if segment.continuation {
        kind |= FLAG_CONTINUATION;
    }
    if segment.more {
        kind |= FLAG_MORE;
    }
    dst.put_u8(kind);
    dst.put_u16_le(segment.schema_id);
    dst.put_u32_le(segment.seq);
    dst.put_u32_le(segment.lake_total);
    dst.put_u16_le(len as u16);
    dst.put_slice(&segment.payload);
    Ok(())
}

/// Decode one complete unit.
///
/// Units arrive whole (one per frame), so a short buffer is an error rather
/// than a request for more data. Trailing bytes after the payload, such as
/// zero padding, are ignored.
pub fn decode_segment(unit: &[u8]) -> Result<Segment> {
    if unit.len() < HEADER_SIZE {
        return Err(TransportError::Truncated {
            len: unit.len(),
            need: HEADER_SIZE,
        });
    }
    if unit[0..2] != MAGIC {
        return Err(TransportError::InvalidMagic);
    }

    let mut header = &unit[2..HEADER_SIZE];
    let kind_byte = header.get_u8();
    let kind = SegmentKind::from_wire(kind_byte & KIND_MASK)?;
    let schema_id = header.get_u16_le();
    let seq = header.get_u32_le();
    let lake_total = header.get_u32_le();
    let len = header.get_u16_le() as usize;

    let need = HEADER_SIZE + len;
    if unit.len() < need {
        return Err(TransportError::Truncated {
            len: unit.len(),
            need,
        });
    }

    Ok(Segment {
        kind,
        schema_id,
        seq,
        lake_total,
        continuation: kind_byte & FLAG_CONTINUATION != 0,
        more: kind_byte & FLAG_MORE != 0,
        payload: Bytes::copy_from_slice(&unit[HEADER_SIZE..need]),
    })
}
