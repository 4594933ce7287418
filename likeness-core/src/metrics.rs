//! Distance metrics over fingerprints and embeddings.

use crate::error::{LikenessError, Result};
use crate::fingerprint::Fingerprint;

/// Count the bit positions at which two fingerprints differ.
///
/// # Errors
///
/// [`LikenessError::LengthMismatch`] if the fingerprints have different bit
/// lengths. Callers treat this as "distance unknown".
pub fn hamming_distance(a: &Fingerprint, b: &Fingerprint) -> Result<u32> {
    if a.len() != b.len() {
        return Err(LikenessError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    // Padding bits are zero on both sides, so whole-byte XOR is exact.
    Ok(a.as_bytes()
        .iter()
        .zip(b.as_bytes())
        .map(|(x, y)| (x ^ y).count_ones())
        .sum())
}

/// Cosine similarity between two embedding vectors, in `[-1, 1]`.
///
/// Degenerate inputs (different lengths, an empty vector, a zero-norm vector,
/// or non-finite components) yield `0.0` rather than an error.
pub fn cosine_similarity(u: &[f32], v: &[f32]) -> f32 {
    if u.len() != v.len() || u.is_empty() {
        return 0.0;
    }

    // Accumulate in f64: squares of any finite f32 neither overflow nor
    // underflow there.
    let dot: f64 = u
        .iter()
        .zip(v)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum();
    let norm_u = l2_norm(u);
    let norm_v = l2_norm(v);

    if norm_u == 0.0 || norm_v == 0.0 {
        return 0.0;
    }

    let similarity = dot / (norm_u * norm_v);
    if !similarity.is_finite() {
        return 0.0;
    }
    similarity.clamp(-1.0, 1.0) as f32
}

#[inline]
fn l2_norm(v: &[f32]) -> f64 {
    v.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_hamming_distance_identical() {
        let a = Fingerprint::from_bytes(vec![0x00, 0xFF, 0xAA, 0x55, 0x00, 0xFF, 0xAA, 0x55]);
        assert_eq!(hamming_distance(&a, &a).unwrap(), 0);
    }

    #[test]
    fn test_hamming_distance_opposite() {
        let a = Fingerprint::from_bytes(vec![0x00; 8]);
        let b = Fingerprint::from_bytes(vec![0xFF; 8]);
        assert_eq!(hamming_distance(&a, &b).unwrap(), 64);
    }

    #[test]
    fn test_hamming_distance_symmetric_and_bounded() {
        let a = Fingerprint::from_bytes(vec![0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0]);
        let b = Fingerprint::from_bytes(vec![0xF0, 0xDE, 0xBC, 0x9A, 0x78, 0x56, 0x34, 0x12]);

        let ab = hamming_distance(&a, &b).unwrap();
        let ba = hamming_distance(&b, &a).unwrap();
        assert_eq!(ab, ba);
        assert!(ab as usize <= a.len());
    }

    #[test]
    fn test_hamming_distance_partial_byte() {
        let a = Fingerprint::from_bits([true, false, true]);
        let b = Fingerprint::from_bits([false, false, true]);
        assert_eq!(hamming_distance(&a, &b).unwrap(), 1);
    }

    #[test]
    fn test_hamming_distance_length_mismatch() {
        let a = Fingerprint::from_bytes(vec![0x00; 5]);
        let b = Fingerprint::from_bytes(vec![0x00; 8]);

        match hamming_distance(&a, &b) {
            Err(LikenessError::LengthMismatch { left, right }) => {
                assert_eq!(left, 40);
                assert_eq!(right, 64);
            }
            other => panic!("expected LengthMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_cosine_self_similarity() {
        let v = [0.3, -1.2, 4.5, 0.0, 2.2];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_cosine_symmetric() {
        let u = [1.0, 2.0, 3.0];
        let v = [-2.0, 0.5, 1.0];
        assert_eq!(cosine_similarity(&u, &v), cosine_similarity(&v, &u));
    }

    #[test]
    fn test_cosine_orthogonal_and_opposite() {
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < EPSILON);
        assert!((cosine_similarity(&[1.0, 2.0], &[-1.0, -2.0]) + 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_cosine_large_magnitudes() {
        let v = [1e20, 1e20];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < EPSILON);

        let opposite = [-1e20, -1e20];
        assert!((cosine_similarity(&v, &opposite) + 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_cosine_tiny_magnitudes() {
        let v = [1e-23, 1e-23];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_cosine_non_finite_is_zero() {
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[f32::INFINITY, 1.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_cosine_ignores_magnitude() {
        let u = [1.0, 2.0, 3.0];
        let v = [10.0, 20.0, 30.0];
        assert!((cosine_similarity(&u, &v) - 1.0).abs() < EPSILON);
    }
}
