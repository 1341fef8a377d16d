// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! Gateway frame layout:
//!
//! ```text
//! [tag: 3-4 ascii][u16 entries][u16 length]
//! [u32 checksum, present iff length > 0][u8 key][ciphertext: length bytes]
//! ```
//!
//! The tag and entry count are transport metadata; receivers only hand the
//! decrypted payload to the session layer. A frame is accepted whole or
//! rejected whole, there is no partial recovery.

use crate::byteframe::ByteFrame;
use crate::{crypto, ProtocolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTag {
    /// Sign-in request.
    Lgn,
    /// Sign-in response.
    Sgn,
    /// World list response, pre-G5 eras.
    Svr,
    /// World list response, later eras.
    Sv2,
    /// Per-character world assignment response.
    Usr,
    /// World assignment sub-request.
    All,
}

impl FrameTag {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            FrameTag::Lgn => b"LGN",
            FrameTag::Sgn => b"SGN",
            FrameTag::Svr => b"SVR",
            FrameTag::Sv2 => b"SV2",
            FrameTag::Usr => b"USR",
            FrameTag::All => b"ALL+",
        }
    }

    /// Matches the first three tag bytes. `Ok(None)` means the tag is four
    /// bytes long and the caller must supply the fourth via
    /// [`FrameTag::from_prefix4`].
    pub fn from_prefix3(prefix: [u8; 3]) -> Result<Option<FrameTag>, ProtocolError> {
        match &prefix {
            b"LGN" => Ok(Some(FrameTag::Lgn)),
            b"SGN" => Ok(Some(FrameTag::Sgn)),
            b"SVR" => Ok(Some(FrameTag::Svr)),
            b"SV2" => Ok(Some(FrameTag::Sv2)),
            b"USR" => Ok(Some(FrameTag::Usr)),
            b"ALL" => Ok(None),
            _ => Err(ProtocolError::UnknownTag([
                prefix[0], prefix[1], prefix[2], 0,
            ])),
        }
    }

    pub fn from_prefix4(prefix: [u8; 3], fourth: u8) -> Result<FrameTag, ProtocolError> {
        if &prefix == b"ALL" && fourth == b'+' {
            Ok(FrameTag::All)
        } else {
            Err(ProtocolError::UnknownTag([
                prefix[0], prefix[1], prefix[2], fourth,
            ]))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub tag: FrameTag,
    pub entries: u16,
    pub len: u16,
    /// sum32 of the plaintext payload; 0 when `len == 0` (absent on the wire).
    pub checksum: u32,
}

/// Assembles one complete frame ready for a single write.
pub fn encode(
    tag: FrameTag,
    entries: u16,
    payload: &[u8],
    key: u8,
) -> Result<Vec<u8>, ProtocolError> {
    if payload.len() > u16::MAX as usize {
        return Err(ProtocolError::OversizedPayload(payload.len()));
    }
    let mut bf = ByteFrame::new();
    bf.write_bytes(tag.as_bytes());
    bf.write_u16(entries);
    bf.write_u16(payload.len() as u16);
    if !payload.is_empty() {
        bf.write_u32(crypto::sum32(payload));
    }
    bf.write_u8(key);
    bf.write_bytes(&crypto::encrypt(payload, key));
    Ok(bf.into_vec())
}

/// Decrypts a frame body and verifies it against the header checksum.
pub fn open_payload(
    hdr: &FrameHeader,
    key: u8,
    ciphertext: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let payload = crypto::decrypt(ciphertext, key);
    if !payload.is_empty() {
        let actual = crypto::sum32(&payload);
        if actual != hdr.checksum {
            return Err(ProtocolError::ChecksumMismatch {
                expected: hdr.checksum,
                actual,
            });
        }
    }
    Ok(payload)
}

/// Parses a whole frame from a byte buffer. The streaming path in the server
/// reads the header fields incrementally off the socket instead; this is the
/// buffer-level equivalent used by tests and tooling.
pub fn decode(bf: &mut ByteFrame) -> Result<(FrameHeader, Vec<u8>), ProtocolError> {
    let prefix = bf.read_bytes(3)?;
    let prefix = [prefix[0], prefix[1], prefix[2]];
    let tag = match FrameTag::from_prefix3(prefix)? {
        Some(tag) => tag,
        None => FrameTag::from_prefix4(prefix, bf.read_u8()?)?,
    };
    let entries = bf.read_u16()?;
    let len = bf.read_u16()?;
    let checksum = if len > 0 { bf.read_u32()? } else { 0 };
    let hdr = FrameHeader {
        tag,
        entries,
        len,
        checksum,
    };
    let key = bf.read_u8()?;
    let ciphertext = bf.read_bytes(len as usize)?;
    let payload = open_payload(&hdr, key, &ciphertext)?;
    Ok((hdr, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_with_payload() {
        let payload = b"SIGN:100\0user\0pass\0\0";
        let raw = encode(FrameTag::Lgn, 0, payload, 0x2a).unwrap();

        let mut bf = ByteFrame::from_vec(raw);
        let (hdr, decoded) = decode(&mut bf).unwrap();
        assert_eq!(hdr.tag, FrameTag::Lgn);
        assert_eq!(hdr.len as usize, payload.len());
        assert_eq!(decoded, payload);
        assert!(bf.remaining().is_empty());
    }

    #[test]
    fn empty_payload_has_no_checksum_field() {
        let raw = encode(FrameTag::Usr, 0, &[], 0x00).unwrap();
        // tag + entries + length + key
        assert_eq!(raw.len(), 3 + 2 + 2 + 1);

        let mut bf = ByteFrame::from_vec(raw);
        let (hdr, decoded) = decode(&mut bf).unwrap();
        assert_eq!(hdr.len, 0);
        assert!(decoded.is_empty());
    }

    #[test]
    fn four_byte_tag() {
        let raw = encode(FrameTag::All, 2, b"x", 0x01).unwrap();
        assert_eq!(&raw[..4], b"ALL+");

        let mut bf = ByteFrame::from_vec(raw);
        let (hdr, _) = decode(&mut bf).unwrap();
        assert_eq!(hdr.tag, FrameTag::All);
        assert_eq!(hdr.entries, 2);
    }

    #[test]
    fn corrupted_body_fails_the_checksum() {
        let mut raw = encode(FrameTag::Sgn, 1, b"status and characters", 0x07).unwrap();
        // flip one bit in the first ciphertext byte (after tag/entries/len/
        // checksum/key = 3+2+2+4+1)
        raw[12] ^= 0x80;
        let mut bf = ByteFrame::from_vec(raw);
        assert!(matches!(
            decode(&mut bf),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut bf = ByteFrame::from_bytes(b"XYZ\x00\x00\x00\x00\x00");
        assert!(matches!(
            decode(&mut bf),
            Err(ProtocolError::UnknownTag(_))
        ));
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let payload = vec![0u8; u16::MAX as usize + 1];
        assert_eq!(
            encode(FrameTag::Sv2, 0, &payload, 0x00),
            Err(ProtocolError::OversizedPayload(payload.len()))
        );
    }

    #[test]
    fn truncated_header_is_an_underrun() {
        let raw = encode(FrameTag::Sgn, 0, b"abc", 0x00).unwrap();
        let mut bf = ByteFrame::from_bytes(&raw[..6]);
        assert!(matches!(
            decode(&mut bf),
            Err(ProtocolError::BufferUnderrun { .. })
        ));
    }
}
