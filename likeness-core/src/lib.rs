//! Likeness Core - image similarity screening library
//!
//! This crate screens a target image against a collection of reference images
//! and reports which references it may be copying, with risk scores and
//! evidence from a verification oracle.
//!
//! # Features
//!
//! - 64-bit gradient fingerprints for cheap near-duplicate detection
//! - Hamming and cosine metrics over fingerprints and embeddings
//! - Deterministic candidate selection (fingerprint match first, then similarity)
//! - A staged assessment orchestrator with bounded oracle concurrency and
//!   stale-run cancellation
//! - A background collection indexer that fills in missing signals
//! - HTTP and mock oracles behind async traits
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use likeness_core::{
//!     AssessmentConfig, AssessmentOrchestrator, CollectionIndex, ImageBytes, ImageRecord,
//!     MemoryImageStore, OracleProviderFactory, TargetImage,
//! };
//!
//! # async fn example() -> likeness_core::Result<()> {
//! let index = Arc::new(CollectionIndex::new());
//! let store = Arc::new(MemoryImageStore::new());
//!
//! let reference = ImageRecord::new("reference.png", "image/png");
//! store.insert(reference.id, ImageBytes::new(std::fs::read("reference.png").unwrap(), "image/png"));
//! index.insert(reference).await?;
//!
//! let orchestrator = AssessmentOrchestrator::new(
//!     AssessmentConfig::default(),
//!     index,
//!     store,
//!     OracleProviderFactory::create_mock(),
//! )?;
//!
//! let target = TargetImage::new(
//!     "upload.jpg",
//!     ImageBytes::new(std::fs::read("upload.jpg").unwrap(), "image/jpeg"),
//! );
//! let report = orchestrator.assess(target).await?;
//! println!("risk: {}", report.risk_level());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod metrics;
pub mod oracle;
pub mod orchestrator;
pub mod record;
pub mod selector;

// Re-export main types for convenience
pub use config::AssessmentConfig;
pub use error::{LikenessError, Result};
pub use fingerprint::{
    compute_fingerprint, Fingerprint, FingerprintEngine, FingerprintGrid, DEFAULT_FINGERPRINT_BITS,
};
pub use index::{
    CollectionIndex, CollectionIndexer, ImageStore, IndexPassSummary, IndexerHandle,
    MemoryImageStore,
};
pub use metrics::{cosine_similarity, hamming_distance};
pub use oracle::{
    EmbeddingOracle, ImageEmbedding, OracleHealthStatus, OracleProviderConfig,
    OracleProviderFactory, OracleSet, OracleSource, VerificationOracle, VerificationRequest,
};
pub use orchestrator::{
    rank_results, AssessmentOrchestrator, AssessmentReport, AssessmentRun, Progress, RunStatus,
    TargetImage,
};
pub use record::{
    AssessmentResult, Evidence, ImageBytes, ImageId, ImageRecord, RiskLevel, RiskScores,
    ScoreBreakdown, VerificationOutcome,
};
pub use selector::{Candidate, CandidateSelector};
