use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

/// Unconsumed input bytes owned by one chunker.
///
/// Grows by appending at the back and shrinks by removing a prefix.
#[derive(Debug, Default, Clone)]
pub struct RawBuffer {
    buf: BytesMut,
}

impl RawBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Remove and return the first `n` bytes, or everything if shorter.
    pub fn truncate_prefix(&mut self, n: usize) -> Bytes {
        let n = n.min(self.buf.len());
        self.buf.split_to(n).freeze()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Result of one bounded read from an input source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadOutcome {
    Data(usize),
    /// The source has nothing right now but is not closed.
    Idle,
    Eof,
}

pub(crate) fn read_chunk<R: Read>(input: &mut R, buf: &mut [u8]) -> std::io::Result<ReadOutcome> {
    loop {
        return match input.read(buf) {
            Ok(0) => Ok(ReadOutcome::Eof),
            Ok(n) => Ok(ReadOutcome::Data(n)),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(ReadOutcome::Idle),
            Err(err) => Err(err),
        };
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn prefix_truncation() {
        let mut raw = RawBuffer::new();
        raw.append(b"hello ");
        raw.append(b"world");

        assert_eq!(raw.truncate_prefix(6).as_ref(), b"hello ");
        assert_eq!(raw.len(), 5);
        assert_eq!(raw.truncate_prefix(100).as_ref(), b"world");
        assert!(raw.is_empty());
    }

    #[test]
    fn read_chunk_retries_interrupted() {
        struct InterruptedThenData(bool);
        impl Read for InterruptedThenData {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if !self.0 {
                    self.0 = true;
                    return Err(ErrorKind::Interrupted.into());
                }
                buf[0] = 7;
                Ok(1)
            }
        }

        let mut buf = [0u8; 4];
        let outcome = read_chunk(&mut InterruptedThenData(false), &mut buf).unwrap();
        assert_eq!(outcome, ReadOutcome::Data(1));
        assert_eq!(
            read_chunk(&mut Cursor::new(Vec::new()), &mut buf).unwrap(),
            ReadOutcome::Eof
        );
    }
}
