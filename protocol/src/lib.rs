// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

pub mod byteframe;
pub mod crypto;
pub mod frame;
pub mod respid;

pub use byteframe::{ByteFrame, ByteOrder, Pad};
pub use frame::{FrameHeader, FrameTag};
pub use respid::SignCode;

use thiserror::Error;

/// Errors raised by the wire layer. Every one of these is fatal for the
/// connection it occurred on; none of them is recoverable mid-stream since
/// the protocol has no resynchronization points.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("buffer underrun: needed {needed} bytes, {remaining} remaining")]
    BufferUnderrun { needed: usize, remaining: usize },
    #[error("missing null terminator in {remaining} remaining bytes")]
    MissingTerminator { remaining: usize },
    #[error("unknown frame tag {0:02x?}")]
    UnknownTag([u8; 4]),
    #[error("payload of {0} bytes does not fit in a frame")]
    OversizedPayload(usize),
    #[error("checksum mismatch (expected {expected:#010x}, got {actual:#010x})")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("bad connection init (expected 8 zero bytes)")]
    BadInit,
}
