//! Gradient fingerprint computation.
//!
//! # Algorithm
//!
//! 1. Resize the decoded image to `(width + 1) x height` with a triangle
//!    filter (deterministic for identical input within a build).
//! 2. Take each pixel's luminance as the mean of its R, G and B channels;
//!    alpha is ignored.
//! 3. For every row and every adjacent horizontal pair, emit `1` when the
//!    left pixel is strictly brighter than the right one, else `0`.
//!
//! The default 8 x 8 grid yields a 64-bit fingerprint.
//!
//! # Usage
//!
//! ```no_run
//! use likeness_core::fingerprint::FingerprintEngine;
//!
//! let engine = FingerprintEngine::default();
//! let a = engine.fingerprint_bytes(&std::fs::read("a.jpg").unwrap()).unwrap();
//! let b = engine.fingerprint_bytes(&std::fs::read("b.jpg").unwrap()).unwrap();
//! let near_duplicate = a.hamming_distance(&b).unwrap() <= 8;
//! ```

use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Fingerprint;
use crate::error::{LikenessError, Result};

/// Comparison grid: `width` gradient pairs per row, `height` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintGrid {
    pub width: u32,
    pub height: u32,
}

impl FingerprintGrid {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of bits a fingerprint on this grid carries.
    pub fn bit_len(&self) -> usize {
        (self.width * self.height) as usize
    }
}

impl Default for FingerprintGrid {
    fn default() -> Self {
        Self::new(8, 8)
    }
}

/// Computes perceptual fingerprints on a fixed grid.
#[derive(Debug, Clone, Default)]
pub struct FingerprintEngine {
    grid: FingerprintGrid,
}

impl FingerprintEngine {
    /// Create an engine for the given grid.
    pub fn new(grid: FingerprintGrid) -> Self {
        Self { grid }
    }

    /// Decode raw image bytes and fingerprint them.
    ///
    /// Supports JPEG, PNG, GIF, and WebP formats.
    pub fn fingerprint_bytes(&self, image_data: &[u8]) -> Result<Fingerprint> {
        let image = image::load_from_memory(image_data)
            .map_err(|e| LikenessError::DecodeError(format!("Failed to decode image: {e}")))?;

        Ok(self.fingerprint_image(&image))
    }

    /// Fingerprint an already decoded image.
    pub fn fingerprint_image(&self, image: &DynamicImage) -> Fingerprint {
        let FingerprintGrid { width, height } = self.grid;
        // Alpha is dropped before resampling so it cannot leak into luminance.
        let resized = imageops::resize(&image.to_rgb8(), width + 1, height, FilterType::Triangle);

        let bits = (0..height).flat_map(|y| {
            let resized = &resized;
            (0..width).map(move |x| {
                luminance(resized.get_pixel(x, y)) > luminance(resized.get_pixel(x + 1, y))
            })
        });
        let fingerprint = Fingerprint::from_bits(bits);

        debug!(
            bits = fingerprint.len(),
            fingerprint = %fingerprint,
            "Computed fingerprint"
        );
        fingerprint
    }

    /// Check if the provided bytes appear to be a supported image format.
    pub fn is_supported_format(data: &[u8]) -> bool {
        image::guess_format(data).is_ok()
    }

    /// Get the grid used by this engine.
    pub fn grid(&self) -> FingerprintGrid {
        self.grid
    }
}

/// Channel sum of a pixel. Comparing sums orders pixels exactly as comparing
/// their three-channel means would, without rounding.
fn luminance(pixel: &Rgb<u8>) -> u16 {
    pixel.0.iter().map(|&c| u16::from(c)).sum()
}

/// Fingerprint image bytes with the default 8 x 8 grid.
///
/// Returns `None` when the data cannot be decoded, which callers treat as
/// "pre-filter unavailable".
pub fn compute_fingerprint(image_data: &[u8]) -> Option<Fingerprint> {
    FingerprintEngine::default().fingerprint_bytes(image_data).ok()
}
