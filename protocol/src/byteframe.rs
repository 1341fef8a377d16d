// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! Cursor-style reader/writer for the fixed-layout records used by the
//! gateway protocol. The legacy client mixes big and little endian fields
//! within a single response, so the byte order is a runtime toggle rather
//! than a type parameter.

use crate::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    #[default]
    Big,
    Little,
}

/// Padding byte for fixed-width string fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pad {
    Nul,
    Space,
}

impl Pad {
    fn byte(self) -> u8 {
        match self {
            Pad::Nul => 0x00,
            Pad::Space => b' ',
        }
    }
}

/// Growable byte buffer with a read/write cursor.
///
/// Writes never fail; the buffer grows as needed. Reads return
/// [`ProtocolError::BufferUnderrun`] instead of panicking when the cursor
/// would pass the end of the buffer.
#[derive(Debug, Default)]
pub struct ByteFrame {
    buf: Vec<u8>,
    index: usize,
    order: ByteOrder,
}

impl ByteFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an owned buffer for reading, cursor at the start.
    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self {
            buf,
            index: 0,
            order: ByteOrder::Big,
        }
    }

    pub fn from_bytes(buf: &[u8]) -> Self {
        Self::from_vec(buf.to_vec())
    }

    pub fn set_le(&mut self) {
        self.order = ByteOrder::Little;
    }

    pub fn set_be(&mut self) {
        self.order = ByteOrder::Big;
    }

    pub fn position(&self) -> usize {
        self.index
    }

    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    /// Bytes between the cursor and the end of the buffer.
    pub fn remaining(&self) -> &[u8] {
        &self.buf[self.index..]
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf
    }

    /// Reserves `n` bytes at the cursor, growing the buffer if needed, and
    /// advances past them.
    fn wspace(&mut self, n: usize) -> &mut [u8] {
        let end = self.index + n;
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        let slice = &mut self.buf[self.index..end];
        self.index = end;
        slice
    }

    /// Takes `n` bytes at the cursor or fails with an underrun.
    fn rtake(&mut self, n: usize) -> Result<&[u8], ProtocolError> {
        let remaining = self.buf.len() - self.index;
        if n > remaining {
            return Err(ProtocolError::BufferUnderrun {
                needed: n,
                remaining,
            });
        }
        let slice = &self.buf[self.index..self.index + n];
        self.index += n;
        Ok(slice)
    }

    pub fn write_u8(&mut self, v: u8) {
        self.wspace(1)[0] = v;
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write_u8(v as u8);
    }

    pub fn write_u16(&mut self, v: u16) {
        let b = match self.order {
            ByteOrder::Big => v.to_be_bytes(),
            ByteOrder::Little => v.to_le_bytes(),
        };
        self.wspace(2).copy_from_slice(&b);
    }

    pub fn write_u32(&mut self, v: u32) {
        let b = match self.order {
            ByteOrder::Big => v.to_be_bytes(),
            ByteOrder::Little => v.to_le_bytes(),
        };
        self.wspace(4).copy_from_slice(&b);
    }

    pub fn write_u64(&mut self, v: u64) {
        let b = match self.order {
            ByteOrder::Big => v.to_be_bytes(),
            ByteOrder::Little => v.to_le_bytes(),
        };
        self.wspace(8).copy_from_slice(&b);
    }

    pub fn write_bytes(&mut self, v: &[u8]) {
        self.wspace(v.len()).copy_from_slice(v);
    }

    /// Writes `v` followed by a single NUL.
    pub fn write_nt_bytes(&mut self, v: &[u8]) {
        self.write_bytes(v);
        self.write_u8(0);
    }

    /// Writes exactly `width` bytes: `v` truncated to `width`, the rest
    /// filled with the pad byte. Truncation of long input is intentional
    /// legacy behavior, not an error.
    pub fn write_fixed(&mut self, v: &[u8], width: usize, pad: Pad) {
        let n = v.len().min(width);
        let slice = self.wspace(width);
        slice[..n].copy_from_slice(&v[..n]);
        slice[n..].fill(pad.byte());
    }

    /// Length-prefixed string with a u8 prefix. Longer input is truncated
    /// to 255 bytes.
    pub fn write_pstr8(&mut self, v: &[u8]) {
        let n = v.len().min(u8::MAX as usize);
        self.write_u8(n as u8);
        self.write_bytes(&v[..n]);
    }

    /// Length-prefixed string with a u16 prefix in the current byte order.
    pub fn write_pstr16(&mut self, v: &[u8]) {
        let n = v.len().min(u16::MAX as usize);
        self.write_u16(n as u16);
        self.write_bytes(&v[..n]);
    }

    /// Length-prefixed string with a u32 prefix in the current byte order.
    pub fn write_pstr32(&mut self, v: &[u8]) {
        self.write_u32(v.len() as u32);
        self.write_bytes(v);
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.rtake(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        Ok(self.read_u8()? > 0)
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        let order = self.order;
        let b = self.rtake(2)?;
        Ok(match order {
            ByteOrder::Big => u16::from_be_bytes([b[0], b[1]]),
            ByteOrder::Little => u16::from_le_bytes([b[0], b[1]]),
        })
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let order = self.order;
        let b = self.rtake(4)?;
        Ok(match order {
            ByteOrder::Big => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
            ByteOrder::Little => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
        })
    }

    pub fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        let order = self.order;
        let b = self.rtake(8)?;
        let mut a = [0u8; 8];
        a.copy_from_slice(b);
        Ok(match order {
            ByteOrder::Big => u64::from_be_bytes(a),
            ByteOrder::Little => u64::from_le_bytes(a),
        })
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, ProtocolError> {
        Ok(self.rtake(n)?.to_vec())
    }

    /// Reads bytes up to (and consumes) the next NUL.
    pub fn read_nt_bytes(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let remaining = self.remaining();
        let Some(nul) = remaining.iter().position(|b| *b == 0) else {
            return Err(ProtocolError::MissingTerminator {
                remaining: remaining.len(),
            });
        };
        let out = remaining[..nul].to_vec();
        self.index += nul + 1;
        Ok(out)
    }

    /// Reads a fixed-width field and strips trailing pad bytes.
    pub fn read_fixed(&mut self, width: usize, pad: Pad) -> Result<Vec<u8>, ProtocolError> {
        let raw = self.rtake(width)?;
        let end = raw
            .iter()
            .rposition(|b| *b != pad.byte())
            .map_or(0, |i| i + 1);
        Ok(raw[..end].to_vec())
    }

    pub fn read_pstr8(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let n = self.read_u8()? as usize;
        self.read_bytes(n)
    }

    pub fn read_pstr16(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let n = self.read_u16()? as usize;
        self.read_bytes(n)
    }

    pub fn read_pstr32(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let n = self.read_u32()? as usize;
        self.read_bytes(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_roundtrip_be() {
        let mut bf = ByteFrame::new();
        bf.write_u8(0x12);
        bf.write_u16(0x3456);
        bf.write_u32(0x789abcde);
        bf.write_u64(0x0123456789abcdef);
        bf.write_bool(true);

        let mut bf = ByteFrame::from_vec(bf.into_vec());
        assert_eq!(bf.read_u8().unwrap(), 0x12);
        assert_eq!(bf.read_u16().unwrap(), 0x3456);
        assert_eq!(bf.read_u32().unwrap(), 0x789abcde);
        assert_eq!(bf.read_u64().unwrap(), 0x0123456789abcdef);
        assert!(bf.read_bool().unwrap());
    }

    #[test]
    fn primitive_roundtrip_le() {
        let mut bf = ByteFrame::new();
        bf.set_le();
        bf.write_u16(0x3456);
        bf.write_u32(0x789abcde);
        bf.write_u64(0x0123456789abcdef);
        assert_eq!(&bf.data()[..2], &[0x56, 0x34]);

        let mut bf = ByteFrame::from_vec(bf.into_vec());
        bf.set_le();
        assert_eq!(bf.read_u16().unwrap(), 0x3456);
        assert_eq!(bf.read_u32().unwrap(), 0x789abcde);
        assert_eq!(bf.read_u64().unwrap(), 0x0123456789abcdef);
    }

    #[test]
    fn mixed_order_within_one_buffer() {
        let mut bf = ByteFrame::new();
        bf.write_u32(0x11223344);
        bf.set_le();
        bf.write_u32(0x11223344);
        assert_eq!(
            bf.data(),
            &[0x11, 0x22, 0x33, 0x44, 0x44, 0x33, 0x22, 0x11]
        );
    }

    #[test]
    fn underrun_is_an_error_not_a_panic() {
        let mut bf = ByteFrame::from_bytes(&[1, 2, 3]);
        assert_eq!(bf.read_u16().unwrap(), 0x0102);
        assert_eq!(
            bf.read_u32(),
            Err(ProtocolError::BufferUnderrun {
                needed: 4,
                remaining: 1
            })
        );
        // the failed read must not move the cursor
        assert_eq!(bf.read_u8().unwrap(), 3);
    }

    #[test]
    fn fixed_width_pads_and_strips() {
        let mut bf = ByteFrame::new();
        bf.write_fixed(b"hunter", 16, Pad::Nul);
        assert_eq!(bf.data().len(), 16);

        let mut bf = ByteFrame::from_vec(bf.into_vec());
        assert_eq!(bf.read_fixed(16, Pad::Nul).unwrap(), b"hunter");
    }

    #[test]
    fn fixed_width_space_padding() {
        let mut bf = ByteFrame::new();
        bf.write_fixed(b"abc", 8, Pad::Space);
        assert_eq!(bf.data(), b"abc     ");

        let mut bf = ByteFrame::from_vec(bf.into_vec());
        assert_eq!(bf.read_fixed(8, Pad::Space).unwrap(), b"abc");
    }

    #[test]
    fn fixed_width_truncates_long_input() {
        let mut bf = ByteFrame::new();
        bf.write_fixed(b"0123456789", 4, Pad::Nul);
        assert_eq!(bf.data(), b"0123");

        let mut bf = ByteFrame::from_vec(bf.into_vec());
        assert_eq!(bf.read_fixed(4, Pad::Nul).unwrap(), b"0123");
    }

    #[test]
    fn fixed_width_exact_fit_survives_roundtrip() {
        let mut bf = ByteFrame::new();
        bf.write_fixed(b"12345678", 8, Pad::Nul);
        let mut bf = ByteFrame::from_vec(bf.into_vec());
        assert_eq!(bf.read_fixed(8, Pad::Nul).unwrap(), b"12345678");
    }

    #[test]
    fn pascal_strings_roundtrip() {
        let mut bf = ByteFrame::new();
        bf.write_pstr8(b"short");
        bf.write_pstr16(b"medium string");
        bf.write_pstr32(b"");

        let mut bf = ByteFrame::from_vec(bf.into_vec());
        assert_eq!(bf.read_pstr8().unwrap(), b"short");
        assert_eq!(bf.read_pstr16().unwrap(), b"medium string");
        assert_eq!(bf.read_pstr32().unwrap(), b"");
    }

    #[test]
    fn pascal_prefix_past_end_is_underrun() {
        // prefix claims 200 bytes, only 2 present
        let mut bf = ByteFrame::from_bytes(&[200, b'a', b'b']);
        assert_eq!(
            bf.read_pstr8(),
            Err(ProtocolError::BufferUnderrun {
                needed: 200,
                remaining: 2
            })
        );
    }

    #[test]
    fn null_terminated_roundtrip_and_missing_terminator() {
        let mut bf = ByteFrame::new();
        bf.write_nt_bytes(b"SIGN:100");
        bf.write_bytes(b"xx");

        let mut bf = ByteFrame::from_vec(bf.into_vec());
        assert_eq!(bf.read_nt_bytes().unwrap(), b"SIGN:100");
        assert_eq!(
            bf.read_nt_bytes(),
            Err(ProtocolError::MissingTerminator { remaining: 2 })
        );
    }
}
