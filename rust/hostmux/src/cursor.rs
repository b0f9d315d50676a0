//! Bounded scan buffer and bounds-checked field reader used by the sniffers.

use crate::error::SniffError;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Upper bound on bytes buffered while sniffing one connection.
pub const SCAN_BUFFER_CAPACITY: usize = 8192;

/// Append-only buffer with a fixed capacity.
///
/// Bytes are only ever appended. The backing storage is allocated once, so
/// the fill length can never exceed the capacity.
pub struct ScanBuffer {
    buf: Box<[u8]>,
    len: usize,
}

impl Default for ScanBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ScanBuffer {
    pub fn new() -> Self {
        Self::with_capacity(SCAN_BUFFER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Everything buffered so far.
    pub fn filled(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Performs one read into the free tail of the buffer.
    ///
    /// Returns the number of bytes appended. End-of-stream is a read failure:
    /// a sniffer that still wants bytes has no use for a closed client.
    pub async fn fill_from<R>(&mut self, reader: &mut R) -> Result<usize, SniffError>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        if self.is_full() {
            return Err(SniffError::BufferLimitExceeded(self.capacity()));
        }
        let n = reader
            .read(&mut self.buf[self.len..])
            .await
            .map_err(SniffError::ReadFailure)?;
        if n == 0 {
            return Err(SniffError::eof());
        }
        self.len += n;
        Ok(n)
    }

    /// Consumes the buffer, returning exactly the bytes read so far.
    pub fn into_captured(self) -> Vec<u8> {
        let mut v = self.buf.into_vec();
        v.truncate(self.len);
        v
    }
}

/// Forward-only reader over a byte slice.
///
/// Every read checks bounds first and fails with
/// [`SniffError::InsufficientData`] instead of indexing past the slice.
/// Offsets in errors are absolute: a child cursor created with
/// [`Cursor::sub`] keeps counting from its parent's position.
#[derive(Clone, Debug)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0, base: 0 }
    }

    /// Absolute offset of the next byte to be read.
    pub fn position(&self) -> usize {
        self.base + self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], SniffError> {
        let end = match self.pos.checked_add(n) {
            Some(end) if end <= self.data.len() => end,
            _ => {
                return Err(SniffError::InsufficientData {
                    offset: self.position(),
                    needed: n,
                    available: self.base + self.data.len(),
                })
            }
        };
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn skip(&mut self, n: usize) -> Result<(), SniffError> {
        self.read_bytes(n).map(|_| ())
    }

    pub fn read_u8(&mut self) -> Result<u8, SniffError> {
        Ok(self.read_bytes(1)?[0])
    }

    /// Big-endian u16. Both bytes are widened before the shift.
    pub fn read_u16_be(&mut self) -> Result<u16, SniffError> {
        let b = self.read_bytes(2)?;
        Ok((u16::from(b[0]) << 8) | u16::from(b[1]))
    }

    pub fn read_u24_be(&mut self) -> Result<u32, SniffError> {
        let b = self.read_bytes(3)?;
        Ok((u32::from(b[0]) << 16) | (u32::from(b[1]) << 8) | u32::from(b[2]))
    }

    /// Splits off the next `n` bytes as their own cursor.
    pub fn sub(&mut self, n: usize) -> Result<Cursor<'a>, SniffError> {
        let base = self.position();
        let data = self.read_bytes(n)?;
        Ok(Cursor { data, pos: 0, base })
    }

    /// Reads a u8 length prefix and skips that many bytes.
    pub fn skip_u8_prefixed(&mut self) -> Result<(), SniffError> {
        let n = self.read_u8()?;
        self.skip(usize::from(n))
    }

    /// Reads a u16 length prefix and skips that many bytes.
    pub fn skip_u16_prefixed(&mut self) -> Result<(), SniffError> {
        let n = self.read_u16_be()?;
        self.skip(usize::from(n))
    }
}
