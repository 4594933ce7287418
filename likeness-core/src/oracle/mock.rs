//! Mock oracles for testing and offline runs.

use async_trait::async_trait;
use sha3::{Digest, Sha3_256};

use super::{EmbeddingOracle, ImageEmbedding, OracleSource, VerificationOracle, VerificationRequest};
use crate::error::Result;
use crate::record::{
    AssessmentResult, Evidence, ImageBytes, RiskScores, ScoreBreakdown, VerificationOutcome,
};

/// Default embedding dimensionality for the mock.
pub const MOCK_EMBEDDING_DIMENSIONS: usize = 32;

/// Mock embedding oracle.
/// WARNING: Do not use in production - vectors are a hash of the raw bytes,
/// so only byte-identical images are "semantically" similar.
pub struct MockEmbeddingOracle {
    dimensions: usize,
}

impl MockEmbeddingOracle {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Derive a deterministic vector from the image bytes using SHA3.
    pub fn embed_sync(&self, image: &ImageBytes) -> ImageEmbedding {
        let mut vector = Vec::with_capacity(self.dimensions);
        let mut block = 0u32;

        while vector.len() < self.dimensions {
            let mut hasher = Sha3_256::new();
            hasher.update(block.to_le_bytes());
            hasher.update(b"likeness-mock-embedding");
            hasher.update(&image.data);
            let digest = hasher.finalize();

            vector.extend(
                digest
                    .iter()
                    .take(self.dimensions - vector.len())
                    .map(|&b| f32::from(b) / 127.5 - 1.0),
            );
            block += 1;
        }

        ImageEmbedding {
            description: format!("mock description of {} bytes ({})", image.data.len(), image.mime),
            vector,
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl Default for MockEmbeddingOracle {
    fn default() -> Self {
        Self::new(MOCK_EMBEDDING_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingOracle for MockEmbeddingOracle {
    async fn index(&self, image: &ImageBytes) -> Result<ImageEmbedding> {
        Ok(self.embed_sync(image))
    }

    fn source_id(&self) -> OracleSource {
        OracleSource::Mock
    }
}

/// Mock verification oracle.
/// WARNING: Do not use in production - scores are derived from a hash of
/// the pair, not from any visual judgment.
///
/// Byte-identical pairs always score the maximum; pairs flagged by the
/// fingerprint pre-filter get at least 32 structure points.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockVerificationOracle;

impl MockVerificationOracle {
    pub fn new() -> Self {
        Self
    }

    pub fn assess_sync(&self, request: &VerificationRequest<'_>) -> AssessmentResult {
        let identical = request.target.data == request.reference.data;

        let (semantic, mut structure, compliance) = if identical {
            (40.0, 40.0, 20.0)
        } else {
            let mut hasher = Sha3_256::new();
            hasher.update(b"likeness-mock-verification");
            hasher.update(&request.target.data);
            hasher.update(&request.reference.data);
            let digest = hasher.finalize();
            (
                f32::from(digest[0] % 41),
                f32::from(digest[1] % 41),
                f32::from(digest[2] % 21),
            )
        };
        if request.fingerprint_match {
            structure = structure.max(32.0);
        }

        let mut evidence = Evidence::default();
        if identical {
            evidence.similarities.push("Byte-identical image data".into());
        } else {
            evidence.differences.push("Image data differs".into());
        }
        if request.fingerprint_match {
            evidence
                .similarities
                .push("Perceptual fingerprints are within the match threshold".into());
        }

        AssessmentResult {
            reference_id: request.reference_id,
            fingerprint_match: request.fingerprint_match,
            vector_similarity: 0.0,
            scores: RiskScores::new(
                semantic,
                structure,
                compliance,
                semantic + structure + compliance,
            ),
            evidence,
            analysis: "Mock assessment (not a real judgment)".into(),
            breakdown: ScoreBreakdown {
                semantic: format!("{semantic}/40 (mock)"),
                structure: format!("{structure}/40 (mock)"),
                compliance: format!("{compliance}/20 (mock)"),
            },
            modification_suggestion: None,
        }
    }
}

#[async_trait]
impl VerificationOracle for MockVerificationOracle {
    async fn assess(&self, request: VerificationRequest<'_>) -> VerificationOutcome {
        VerificationOutcome::Success(self.assess_sync(&request))
    }

    fn source_id(&self) -> OracleSource {
        OracleSource::Mock
    }
}
