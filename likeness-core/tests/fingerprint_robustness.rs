//! Robustness tests for gradient fingerprints.
//!
//! Fingerprints must survive recompression and rescaling of the same image
//! while staying far apart for structurally different images.

use image::{DynamicImage, GenericImageView, ImageBuffer, Rgb, RgbImage};
use likeness_core::fingerprint::{Fingerprint, FingerprintEngine, FingerprintGrid};
use likeness_core::metrics::hamming_distance;
use std::io::Cursor;

/// Default match threshold used by candidate selection.
const MATCH_THRESHOLD: u32 = 8;

/// Column brightness levels. Adjacent levels differ by at least 50, so the
/// left/right ordering survives resampling and lossy compression.
const LEVELS: [u8; 9] = [20, 80, 140, 200, 250, 60, 120, 180, 240];

/// Vertical bands over the top half, inverted bands over the bottom half.
fn create_test_image(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        let column = ((x * 9) / width) as usize;
        let level = if y < height / 2 {
            LEVELS[column]
        } else {
            255 - LEVELS[column]
        };
        Rgb([level, level, level])
    })
}

fn compress_jpeg(img: &DynamicImage, quality: u8) -> DynamicImage {
    let mut buffer = Cursor::new(Vec::new());

    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality);
    img.write_with_encoder(encoder)
        .expect("JPEG encoding failed");

    buffer.set_position(0);
    image::load_from_memory(&buffer.into_inner()).expect("JPEG decoding failed")
}

fn resize_image(img: &DynamicImage, percentage: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    let new_width = (width * percentage) / 100;
    let new_height = (height * percentage) / 100;
    img.resize_exact(new_width, new_height, image::imageops::FilterType::Lanczos3)
}

fn fingerprint(img: &DynamicImage) -> Fingerprint {
    FingerprintEngine::default().fingerprint_image(img)
}

fn distance(a: &DynamicImage, b: &DynamicImage) -> u32 {
    hamming_distance(&fingerprint(a), &fingerprint(b)).expect("Distance calculation failed")
}

#[test]
fn test_expected_bit_pattern() {
    let original = DynamicImage::ImageRgb8(create_test_image(288, 256));
    let fp = fingerprint(&original);

    // 0,0,0,0,1,0,0,0 on the top rows; inverted ordering below.
    assert_eq!(fp.to_hex(), "08080808f7f7f7f7");
}

#[test]
fn test_png_roundtrip_is_exact() {
    let original = DynamicImage::ImageRgb8(create_test_image(288, 256));
    let mut buffer = Cursor::new(Vec::new());
    original
        .write_to(&mut buffer, image::ImageFormat::Png)
        .expect("PNG encoding failed");

    let from_bytes = FingerprintEngine::default()
        .fingerprint_bytes(&buffer.into_inner())
        .expect("Failed to fingerprint PNG");

    assert_eq!(from_bytes, fingerprint(&original));
}

#[test]
fn test_jpeg_compression_90() {
    let original = DynamicImage::ImageRgb8(create_test_image(288, 256));
    let compressed = compress_jpeg(&original, 90);

    let d = distance(&original, &compressed);
    println!("JPEG 90% quality - Hamming distance: {d}");
    assert!(d <= MATCH_THRESHOLD, "distance {d} exceeds {MATCH_THRESHOLD}");
}

#[test]
fn test_jpeg_compression_70() {
    let original = DynamicImage::ImageRgb8(create_test_image(288, 256));
    let compressed = compress_jpeg(&original, 70);

    let d = distance(&original, &compressed);
    println!("JPEG 70% quality - Hamming distance: {d}");
    assert!(d <= MATCH_THRESHOLD, "distance {d} exceeds {MATCH_THRESHOLD}");
}

#[test]
fn test_resize_50_percent() {
    let original = DynamicImage::ImageRgb8(create_test_image(288, 256));
    let resized = resize_image(&original, 50);

    let d = distance(&original, &resized);
    println!("Resize 50% - Hamming distance: {d}");
    assert!(d <= MATCH_THRESHOLD, "distance {d} exceeds {MATCH_THRESHOLD}");
}

#[test]
fn test_resize_then_compress() {
    let original = DynamicImage::ImageRgb8(create_test_image(288, 256));
    let transformed = compress_jpeg(&resize_image(&original, 75), 80);

    let d = distance(&original, &transformed);
    println!("Resize 75% + JPEG 80% - Hamming distance: {d}");
    assert!(d <= MATCH_THRESHOLD, "distance {d} exceeds {MATCH_THRESHOLD}");
}

#[test]
fn test_mirror_is_not_a_match() {
    let original = DynamicImage::ImageRgb8(create_test_image(288, 256));
    let mirrored = original.fliph();

    let d = distance(&original, &mirrored);
    println!("Horizontal mirror - Hamming distance: {d}");
    assert!(d > MATCH_THRESHOLD, "mirror should not match (distance {d})");
}

#[test]
fn test_larger_grid_is_longer() {
    let original = DynamicImage::ImageRgb8(create_test_image(288, 256));
    let engine = FingerprintEngine::new(FingerprintGrid::new(16, 16));

    let fp = engine.fingerprint_image(&original);
    assert_eq!(fp.len(), 256);

    let default_fp = fingerprint(&original);
    assert!(hamming_distance(&fp, &default_fp).is_err());
}
