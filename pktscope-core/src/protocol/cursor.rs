//! Bounds-checked big-endian reader over a frame buffer.
//!
//! Positions are absolute offsets into the whole frame, which is what field
//! nodes record. Every read that would run past the end of the buffer yields
//! [`ProtocolError::PacketTooShort`] tagged with the protocol being parsed.

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
    protocol: &'static str,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8], pos: usize, protocol: &'static str) -> Self {
        Self {
            data,
            pos,
            protocol,
        }
    }

    #[inline]
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Fail unless `len` more bytes are available.
    pub fn ensure(&self, len: usize) -> Result<(), ProtocolError> {
        let end = self.end_of(len)?;
        if end > self.data.len() {
            return Err(ProtocolError::too_short(self.protocol, end, self.data.len()));
        }
        Ok(())
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ProtocolError> {
        self.ensure(len)?;
        self.pos += len;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        let b = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.end_of(len)?;
        let out = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| ProtocolError::too_short(self.protocol, end, self.data.len()))?;
        self.pos = end;
        Ok(out)
    }

    fn end_of(&self, len: usize) -> Result<usize, ProtocolError> {
        self.pos
            .checked_add(len)
            .ok_or_else(|| ProtocolError::too_short(self.protocol, usize::MAX, self.data.len()))
    }
}
