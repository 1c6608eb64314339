//! Zero-copy read cursor over a single framed message payload.

use zerocopy::FromBytes;

use crate::error::{Error, Result};

use super::types::{I16BE, I32BE, U32BE};

/// Bounds-checked, forward-only reader over one message payload.
///
/// Every read that would run past the end of the payload fails with
/// [`Error::Framing`]; nothing is ever read from a neighbouring message.
#[derive(Debug, Clone, Copy)]
pub struct ReadView<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ReadView<'a> {
    /// Create a view over a message payload (type byte and length already stripped).
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Declared payload length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Check if every byte has been read.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read fixed-length bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::Framing(format!(
                "read_bytes: buffer too short: {} < {}",
                self.remaining(),
                len
            )));
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Read 1-byte unsigned integer.
    pub fn read_u8(&mut self) -> Result<u8> {
        let bytes = self.read_fixed::<1>("read_u8")?;
        Ok(bytes[0])
    }

    /// Read 2-byte big-endian signed integer.
    pub fn read_i16(&mut self) -> Result<i16> {
        let bytes = self.read_fixed::<2>("read_i16")?;
        Ok(I16BE::ref_from_bytes(bytes)?.get())
    }

    /// Read 4-byte big-endian signed integer.
    pub fn read_i32(&mut self) -> Result<i32> {
        let bytes = self.read_fixed::<4>("read_i32")?;
        Ok(I32BE::ref_from_bytes(bytes)?.get())
    }

    /// Read 4-byte big-endian unsigned integer.
    pub fn read_u32(&mut self) -> Result<u32> {
        let bytes = self.read_fixed::<4>("read_u32")?;
        Ok(U32BE::ref_from_bytes(bytes)?.get())
    }

    /// Read a null-terminated string (PostgreSQL String type) as `&str`.
    ///
    /// The terminator must lie inside the payload.
    pub fn read_cstr(&mut self) -> Result<&'a str> {
        let rest = &self.data[self.pos..];
        let Some(end) = memchr::memchr(0, rest) else {
            return Err(Error::Framing(
                "read_cstr: no null terminator found".into(),
            ));
        };
        let s = simdutf8::compat::from_utf8(&rest[..end])
            .map_err(|e| Error::Framing(format!("read_cstr: invalid UTF-8: {e}")))?;
        self.pos += end + 1;
        Ok(s)
    }

    /// Require that the payload has been consumed exactly.
    pub fn finish(&self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Framing(format!(
                "invalid message format: {} trailing bytes",
                self.remaining()
            )))
        }
    }

    fn read_fixed<const N: usize>(&mut self, op: &str) -> Result<&'a [u8]> {
        if self.remaining() < N {
            return Err(Error::Framing(format!(
                "{op}: buffer too short: {} < {N}",
                self.remaining()
            )));
        }
        self.read_bytes(N)
    }
}
