// SPDX-License-Identifier: MIT
// Copyright(c) 2024 Darek Stojaczyk

//! The legacy "bin8" byte cipher and "sum32" checksum, reverse-engineered
//! from the retail client. These are wire-compatibility constants: the bit
//! manipulation below must not be altered, the retail client performs the
//! exact inverse.

const BIN8_KEY: [u8; 8] = [0x01, 0x23, 0x34, 0x45, 0x56, 0xAB, 0xCD, 0xEF];
const SUM32_TABLE0: [u8; 7] = [0x35, 0x7A, 0xAA, 0x97, 0x53, 0x66, 0x12];
const SUM32_TABLE1: [u8; 9] = [0x7A, 0xAA, 0x97, 0x53, 0x66, 0x12, 0xDE, 0xDE, 0x35];

fn rotate(k: &mut u32) {
    *k = k.wrapping_mul(54323).wrapping_add(1);
}

fn keystream_byte(k: &mut u32) -> u8 {
    rotate(k);
    (*k >> 13) as u8
}

/// Encrypts `data` under the single-byte `key`. Output length always equals
/// input length.
pub fn encrypt(data: &[u8], key: u8) -> Vec<u8> {
    let mut k = key as u32;
    data.iter()
        .enumerate()
        .map(|(i, b)| b ^ BIN8_KEY[i & 7] ^ keystream_byte(&mut k))
        .collect()
}

/// Inverse of [`encrypt`] under the same key. The transform is a pure XOR
/// stream, so this only differs from `encrypt` in the order the two masks
/// are applied; the retail client ships them as separate routines.
pub fn decrypt(data: &[u8], key: u8) -> Vec<u8> {
    let mut k = key as u32;
    data.iter()
        .enumerate()
        .map(|(i, b)| (b ^ keystream_byte(&mut k)) ^ BIN8_KEY[i & 7])
        .collect()
}

/// The custom 32-bit checksum carried in frame headers. Deterministic and
/// order-sensitive. Empty input sums to 0; the framing layer never checksums
/// an empty payload.
pub fn sum32(data: &[u8]) -> u32 {
    if data.is_empty() {
        return 0;
    }
    let idx0 = (data.len() + 1) & 0xFF;
    let idx1 = (data[data.len() >> 1].wrapping_add(1)) as usize;
    let mut out = [0u8; 4];
    for (i, b) in data.iter().enumerate() {
        let key = b ^ SUM32_TABLE0[(idx0 + i) % 7] ^ SUM32_TABLE1[(idx1 + i) % 9];
        out[i & 3] = out[i & 3].wrapping_add(key);
    }
    u32::from_be_bytes(out)
}
