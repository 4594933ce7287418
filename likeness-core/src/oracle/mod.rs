//! External oracles consumed by the core.
//!
//! Two collaborators live outside this crate and are reached through traits:
//!
//! - **Embedding oracle**: turns image bytes into a semantic description and a
//!   fixed-length float vector.
//! - **Verification oracle**: compares a target image with a reference image
//!   and reports structured risk scores with evidence.
//!
//! ## Implementations
//!
//! - **HTTP** - JSON-over-HTTP adapters with retry and backoff (`network` feature)
//! - **Mock** - Deterministic adapters for tests and offline runs
//!
//! ## Quick Start
//!
//! ```no_run
//! use likeness_core::oracle::{OracleProviderFactory, OracleProviderConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let oracles = OracleProviderFactory::create(OracleProviderConfig::Mock { dimensions: 32 })?;
//! println!("embedding via {}", oracles.embedder.source_id());
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "network")]
mod http;
#[cfg(feature = "network")]
mod http_client;
mod mock;
mod provider;

#[cfg(feature = "network")]
pub use http::{HttpEmbeddingOracle, HttpVerificationOracle};
#[cfg(feature = "network")]
pub use http_client::{HttpOracleConfig, OracleHttpClient};
pub use mock::{MockEmbeddingOracle, MockVerificationOracle};
pub use provider::{OracleHealthStatus, OracleProviderConfig, OracleProviderFactory, OracleSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::record::{ImageBytes, ImageId, VerificationOutcome};

/// Semantic description and embedding vector for one image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageEmbedding {
    pub description: String,
    pub vector: Vec<f32>,
}

impl ImageEmbedding {
    /// The vector, or `None` if the oracle returned an empty one.
    pub fn usable_vector(&self) -> Option<&[f32]> {
        (!self.vector.is_empty()).then_some(self.vector.as_slice())
    }
}

/// Everything the verification oracle needs for one comparison.
#[derive(Debug, Clone, Copy)]
pub struct VerificationRequest<'a> {
    pub target: &'a ImageBytes,
    pub reference: &'a ImageBytes,
    pub reference_id: ImageId,
    /// Advisory context: the fingerprint pre-filter flagged this pair.
    pub fingerprint_match: bool,
}

/// Source of image embeddings.
///
/// An `Err` and an empty vector are treated identically by the core: the
/// image simply has no embedding yet.
#[async_trait]
pub trait EmbeddingOracle: Send + Sync {
    /// Describe and embed one image.
    async fn index(&self, image: &ImageBytes) -> Result<ImageEmbedding>;

    /// Returns the source identifier for logging and reports.
    fn source_id(&self) -> OracleSource;
}

/// Deep pairwise comparison service.
///
/// Never fails past its own boundary: transport or parsing problems are
/// reported as [`VerificationOutcome::Failed`] carrying the reference id and
/// hint from the request.
#[async_trait]
pub trait VerificationOracle: Send + Sync {
    async fn assess(&self, request: VerificationRequest<'_>) -> VerificationOutcome;

    /// Returns the source identifier for logging and reports.
    fn source_id(&self) -> OracleSource;
}

/// Identifies which oracle backend produced a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleSource {
    /// Remote JSON-over-HTTP service
    Http { endpoint: String },
    /// Deterministic mock (NOT a real judgment)
    Mock,
}

impl std::fmt::Display for OracleSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http { endpoint } => write!(f, "HTTP: {endpoint}"),
            Self::Mock => write!(f, "Mock (NOT A REAL ASSESSMENT)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_vector() {
        let empty = ImageEmbedding::default();
        assert!(empty.usable_vector().is_none());

        let embedding = ImageEmbedding {
            description: "a cat".into(),
            vector: vec![1.0, 0.0],
        };
        assert_eq!(embedding.usable_vector(), Some(&[1.0, 0.0][..]));
    }

    #[test]
    fn test_source_display() {
        assert_eq!(
            OracleSource::Http {
                endpoint: "https://oracle.test".into()
            }
            .to_string(),
            "HTTP: https://oracle.test"
        );
        assert!(OracleSource::Mock.to_string().starts_with("Mock"));
    }
}
