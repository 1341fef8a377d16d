// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! A wrapper that reads / writes complete encrypted gateway frames to the
//! underlying reader / writer. Only the decrypted payload crosses this
//! boundary; tag, entry count and checksum are transport metadata.

use futures::{AsyncRead, AsyncWrite};
use log::trace;
use protocol::frame::{self, FrameHeader, FrameTag};
use protocol::{ByteFrame, ProtocolError};
use smol::io::{AsyncReadExt, AsyncWriteExt};
use std::io::ErrorKind;
use thiserror::Error;

/// Cipher key byte the retail launcher expects on plain gateway traffic.
pub const GATEWAY_KEY: u8 = 0x00;

#[derive(Error, Debug)]
pub enum NetError {
    /// Peer closed the connection between frames. Logged at debug only.
    #[error("connection closed by peer")]
    ConnClosed,
    /// EOF inside a frame: the declared length exceeds what the peer sent.
    #[error("truncated frame")]
    Truncated,
    #[error("protocol violation: {0}")]
    Malformed(#[from] ProtocolError),
    #[error("i/o error: {0}")]
    Io(std::io::Error),
}

impl NetError {
    /// Errors that are ordinary peer behavior rather than violations.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, NetError::ConnClosed)
    }
}

#[derive(Debug)]
pub struct CryptStream<T: Unpin> {
    pub stream: T,
    key: u8,
}

impl<T: Unpin> CryptStream<T> {
    /// Stream sending with the fixed gateway sentinel key.
    pub fn new(stream: T) -> Self {
        Self::with_key(stream, GATEWAY_KEY)
    }

    pub fn with_key(stream: T, key: u8) -> Self {
        Self { stream, key }
    }

    pub fn into_inner(self) -> T {
        self.stream
    }
}

impl<T: Unpin + AsyncRead> CryptStream<T> {
    /// Consumes the 8-zero-byte sentinel a client sends on a fresh
    /// connection. It is not a frame; anything else is a violation and the
    /// caller must drop the connection without responding.
    pub async fn read_init(&mut self) -> Result<(), NetError> {
        let mut init = [0u8; 8];
        self.stream
            .read_exact(&mut init)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => NetError::ConnClosed,
                _ => NetError::Io(e),
            })?;
        if init != [0u8; 8] {
            return Err(ProtocolError::BadInit.into());
        }
        Ok(())
    }

    /// Blocks until a whole frame arrived and returns its decrypted
    /// payload. There is no resynchronization: any error here is fatal for
    /// the connection.
    pub async fn recv(&mut self) -> Result<Vec<u8>, NetError> {
        let mut prefix = [0u8; 3];
        self.stream
            .read_exact(&mut prefix)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => NetError::ConnClosed,
                _ => NetError::Io(e),
            })?;
        let tag = match FrameTag::from_prefix3(prefix)? {
            Some(tag) => tag,
            None => {
                let mut fourth = [0u8; 1];
                self.read_body(&mut fourth).await?;
                FrameTag::from_prefix4(prefix, fourth[0])?
            }
        };

        let mut fields = [0u8; 4];
        self.read_body(&mut fields).await?;
        let mut bf = ByteFrame::from_bytes(&fields);
        let entries = bf.read_u16()?;
        let len = bf.read_u16()?;

        let checksum = if len > 0 {
            let mut sum = [0u8; 4];
            self.read_body(&mut sum).await?;
            u32::from_be_bytes(sum)
        } else {
            0
        };

        let mut key = [0u8; 1];
        self.read_body(&mut key).await?;
        let mut ciphertext = vec![0u8; len as usize];
        self.read_body(&mut ciphertext).await?;

        let hdr = FrameHeader {
            tag,
            entries,
            len,
            checksum,
        };
        let payload = frame::open_payload(&hdr, key[0], &ciphertext)?;
        trace!("recv {tag:?} frame: {entries} entries, {len} byte payload");
        Ok(payload)
    }

    /// EOF mid-frame means the peer lied about the length.
    async fn read_body(&mut self, buf: &mut [u8]) -> Result<(), NetError> {
        self.stream
            .read_exact(buf)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::UnexpectedEof => NetError::Truncated,
                _ => NetError::Io(e),
            })
    }
}

impl<T: Unpin + AsyncWrite> CryptStream<T> {
    /// Encrypts and sends one frame. The frame is assembled in memory and
    /// written in a single logical write; the peer never observes a partial
    /// frame.
    pub async fn send(
        &mut self,
        tag: FrameTag,
        entries: u16,
        payload: &[u8],
    ) -> Result<(), NetError> {
        let raw = frame::encode(tag, entries, payload, self.key)?;
        self.stream.write_all(&raw).await.map_err(NetError::Io)?;
        self.stream.flush().await.map_err(NetError::Io)?;
        trace!("sent {tag:?} frame: {entries} entries, {} byte payload", payload.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smol::io::Cursor;

    fn roundtrip(payload: &[u8], key: u8) -> Vec<u8> {
        smol::block_on(async {
            let mut tx = CryptStream::with_key(Cursor::new(Vec::new()), key);
            tx.send(FrameTag::Sgn, 3, payload).await.unwrap();
            let raw = tx.into_inner().into_inner();

            let mut rx = CryptStream::new(Cursor::new(raw));
            rx.recv().await.unwrap()
        })
    }

    #[test]
    fn frame_roundtrip_small() {
        assert_eq!(roundtrip(b"hello gateway", 0x00), b"hello gateway");
    }

    #[test]
    fn frame_roundtrip_empty() {
        assert_eq!(roundtrip(&[], 0x42), Vec::<u8>::new());
    }

    #[test]
    fn frame_roundtrip_multi_kilobyte() {
        let payload: Vec<u8> = (0..8000u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(roundtrip(&payload, 0xAB), payload);
    }

    #[test]
    fn eof_between_frames_is_conn_closed() {
        smol::block_on(async {
            let mut rx = CryptStream::new(Cursor::new(Vec::new()));
            assert!(matches!(rx.recv().await, Err(NetError::ConnClosed)));
        });
    }

    #[test]
    fn eof_inside_a_frame_is_truncated() {
        smol::block_on(async {
            let mut tx = CryptStream::new(Cursor::new(Vec::new()));
            tx.send(FrameTag::Svr, 1, b"world list").await.unwrap();
            let mut raw = tx.into_inner().into_inner();
            // keep the header but lose most of the ciphertext
            raw.truncate(raw.len() - 6);

            let mut rx = CryptStream::new(Cursor::new(raw));
            assert!(matches!(rx.recv().await, Err(NetError::Truncated)));
        });
    }

    #[test]
    fn length_mismatch_is_detected() {
        smol::block_on(async {
            let mut tx = CryptStream::new(Cursor::new(Vec::new()));
            tx.send(FrameTag::Svr, 1, b"abcdef").await.unwrap();
            let mut raw = tx.into_inner().into_inner();
            // inflate the declared length past the supplied bytes
            raw[5] = 0xFF;

            let mut rx = CryptStream::new(Cursor::new(raw));
            assert!(matches!(
                rx.recv().await,
                Err(NetError::Truncated) | Err(NetError::Malformed(_))
            ));
        });
    }

    #[test]
    fn init_sentinel_accepted_and_rejected() {
        smol::block_on(async {
            let mut ok = CryptStream::new(Cursor::new(vec![0u8; 8]));
            ok.read_init().await.unwrap();

            let mut bad = CryptStream::new(Cursor::new(vec![1, 0, 0, 0, 0, 0, 0, 0]));
            assert!(matches!(
                bad.read_init().await,
                Err(NetError::Malformed(ProtocolError::BadInit))
            ));
        });
    }
}
