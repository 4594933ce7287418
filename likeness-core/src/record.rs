//! Collection records and assessment result types.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::fingerprint::Fingerprint;

/// Opaque identity of an image in the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(Uuid);

impl ImageId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ImageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ImageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Raw image bytes together with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBytes {
    pub data: Arc<[u8]>,
    pub mime: String,
}

impl ImageBytes {
    pub fn new(data: impl Into<Arc<[u8]>>, mime: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime: mime.into(),
        }
    }
}

/// An image in the protected collection (or a submitted target).
///
/// Records are created with identity, name, MIME type and timestamp only.
/// The fingerprint, embedding and description are filled in exactly once by
/// the collection indexer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    pub id: ImageId,
    pub name: String,
    pub mime: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<Fingerprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Set while the indexer is working on this record.
    #[serde(skip)]
    pub indexing: bool,
}

impl ImageRecord {
    /// Create a fresh, unindexed record.
    pub fn new(name: impl Into<String>, mime: impl Into<String>) -> Self {
        Self::with_id(ImageId::new(), name, mime)
    }

    pub fn with_id(id: ImageId, name: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            mime: mime.into(),
            uploaded_at: Utc::now(),
            fingerprint: None,
            embedding: None,
            description: None,
            indexing: false,
        }
    }

    /// Embedding usable for similarity, treating an empty vector as absent.
    pub fn usable_embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref().filter(|e| !e.is_empty())
    }

    /// Whether the indexer still has work to do on this record.
    pub fn needs_indexing(&self) -> bool {
        !self.indexing && (self.fingerprint.is_none() || self.usable_embedding().is_none())
    }

    pub fn is_fully_indexed(&self) -> bool {
        self.fingerprint.is_some() && self.usable_embedding().is_some()
    }
}

/// Risk scores reported by the verification oracle.
///
/// `total` is passed through exactly as reported and is authoritative for
/// ranking, even if it disagrees with the sum of the components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskScores {
    /// Semantic similarity risk, 0-40.
    pub semantic: f32,
    /// Structural/compositional risk, 0-40.
    pub structure: f32,
    /// Compliance risk, 0-20.
    pub compliance: f32,
    /// Overall risk, 0-100.
    pub total: f32,
}

impl RiskScores {
    pub fn new(semantic: f32, structure: f32, compliance: f32, total: f32) -> Self {
        Self {
            semantic,
            structure,
            compliance,
            total,
        }
    }
}

/// Ordered evidence statements supporting an assessment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub similarities: Vec<String>,
    pub differences: Vec<String>,
}

/// Per-dimension explanation of the risk scores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub semantic: String,
    pub structure: String,
    pub compliance: String,
}

/// Coarse banding of a total risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// Band a total score: below 40 is low, below 70 is medium.
    pub fn from_total(total: f32) -> Self {
        if total >= 70.0 {
            Self::High
        } else if total >= 40.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Deep verification result for one reference image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentResult {
    pub reference_id: ImageId,
    pub fingerprint_match: bool,
    pub vector_similarity: f32,
    pub scores: RiskScores,
    #[serde(default)]
    pub evidence: Evidence,
    #[serde(default)]
    pub analysis: String,
    #[serde(default)]
    pub breakdown: ScoreBreakdown,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_suggestion: Option<String>,
}

impl AssessmentResult {
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_total(self.scores.total)
    }
}

/// Outcome of a single verification oracle call.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Success(AssessmentResult),
    Failed {
        reference_id: ImageId,
        fingerprint_match: bool,
        reason: String,
    },
}

impl VerificationOutcome {
    pub fn reference_id(&self) -> ImageId {
        match self {
            Self::Success(result) => result.reference_id,
            Self::Failed { reference_id, .. } => *reference_id,
        }
    }

    /// The result, if the call succeeded.
    pub fn into_result(self) -> Option<AssessmentResult> {
        match self {
            Self::Success(result) => Some(result),
            Self::Failed { .. } => None,
        }
    }
}
