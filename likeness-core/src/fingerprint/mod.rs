//! Perceptual fingerprints for near-duplicate pre-filtering.
//!
//! A fingerprint is a fixed-length bit string derived from coarse horizontal
//! luminance gradients. Two images that differ only by recompression or
//! resizing produce fingerprints a small Hamming distance apart, which makes
//! the fingerprint a cheap first signal before embeddings or deep
//! verification are consulted.
//!
//! # Components
//!
//! - [`Fingerprint`]: the packed bit string and its comparison helpers.
//! - [`FingerprintEngine`]: computes fingerprints from image bytes.

mod engine;

pub use engine::*;

use serde::{Deserialize, Serialize};

use crate::error::{LikenessError, Result};

/// Default fingerprint length in bits (8 x 8 grid).
pub const DEFAULT_FINGERPRINT_BITS: usize = 64;

/// A fixed-length perceptual fingerprint.
///
/// Bits are packed most-significant-first into bytes, in row-major order of
/// the comparison grid. Unused trailing bits in the last byte are zero.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "PackedBits")]
pub struct Fingerprint {
    bytes: Vec<u8>,
    bit_len: usize,
}

/// Unchecked wire form of a [`Fingerprint`].
#[derive(Deserialize)]
struct PackedBits {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl TryFrom<PackedBits> for Fingerprint {
    type Error = LikenessError;

    fn try_from(packed: PackedBits) -> Result<Self> {
        let PackedBits { bytes, bit_len } = packed;
        if bytes.len() != bit_len.div_ceil(8) {
            return Err(LikenessError::DecodeError(format!(
                "{bit_len} bits do not fit {} bytes",
                bytes.len()
            )));
        }
        let used = bit_len % 8;
        if used != 0 && bytes.last().is_some_and(|last| last & (0xFF >> used) != 0) {
            return Err(LikenessError::DecodeError(
                "fingerprint padding bits must be zero".into(),
            ));
        }
        Ok(Self { bytes, bit_len })
    }
}

impl Fingerprint {
    /// Build a fingerprint from individual bits.
    pub fn from_bits<I>(bits: I) -> Self
    where
        I: IntoIterator<Item = bool>,
    {
        let mut bytes = Vec::new();
        let mut bit_len = 0;

        for bit in bits {
            if bit_len % 8 == 0 {
                bytes.push(0u8);
            }
            if bit {
                let last = bytes.len() - 1;
                bytes[last] |= 0x80 >> (bit_len % 8);
            }
            bit_len += 1;
        }

        Self { bytes, bit_len }
    }

    /// Create a fingerprint from packed bytes; every bit of every byte counts.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let bit_len = bytes.len() * 8;
        Self { bytes, bit_len }
    }

    /// Number of bits in the fingerprint.
    pub fn len(&self) -> usize {
        self.bit_len
    }

    pub fn is_empty(&self) -> bool {
        self.bit_len == 0
    }

    /// Value of the bit at `index`, or `None` past the end.
    pub fn bit(&self, index: usize) -> Option<bool> {
        if index >= self.bit_len {
            return None;
        }
        Some(self.bytes[index / 8] & (0x80 >> (index % 8)) != 0)
    }

    /// Packed bytes backing this fingerprint.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Compute the Hamming distance to another fingerprint.
    ///
    /// Fails with [`LikenessError::LengthMismatch`] when the two fingerprints
    /// were computed on different grids.
    pub fn hamming_distance(&self, other: &Self) -> Result<u32> {
        crate::metrics::hamming_distance(self, other)
    }

    /// Check whether two fingerprints are within `threshold` differing bits.
    pub fn is_similar(&self, other: &Self, threshold: u32) -> Result<bool> {
        Ok(self.hamming_distance(other)? <= threshold)
    }

    /// Get the fingerprint as a hexadecimal string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Parse a fingerprint from a hexadecimal string.
    ///
    /// The bit length is taken as eight bits per decoded byte.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| LikenessError::DecodeError(format!("Invalid hex string: {e}")))?;
        Ok(Self::from_bytes(bytes))
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
