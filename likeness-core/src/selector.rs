//! Candidate selection: merge fingerprint and embedding signals into a
//! ranked, size-bounded short-list.
//!
//! A fingerprint match is near-certain physical evidence and dominates the
//! ranking regardless of embedding noise. Embedding similarity is the
//! fallback for near-duplicates that survived re-encoding, cropping or style
//! transfer well enough to defeat the fingerprint.

use serde::Serialize;
use tracing::debug;

use crate::config::AssessmentConfig;
use crate::fingerprint::Fingerprint;
use crate::metrics::cosine_similarity;
use crate::record::ImageRecord;

/// A collection record selected for deep verification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub record: ImageRecord,
    pub fingerprint_match: bool,
    /// `None` when either side lacks a fingerprint or lengths differ.
    pub fingerprint_distance: Option<u32>,
    pub vector_similarity: f32,
}

/// Ranks a collection against a target's signals.
#[derive(Debug, Clone, Copy)]
pub struct CandidateSelector {
    fingerprint_threshold: u32,
    cap: usize,
}

impl CandidateSelector {
    pub fn new(fingerprint_threshold: u32, cap: usize) -> Self {
        Self {
            fingerprint_threshold,
            cap,
        }
    }

    pub fn from_config(config: &AssessmentConfig) -> Self {
        Self::new(config.fingerprint_threshold, config.candidate_cap)
    }

    /// Score a single record against the target signals.
    pub fn score(
        &self,
        target_fingerprint: Option<&Fingerprint>,
        target_embedding: Option<&[f32]>,
        record: &ImageRecord,
    ) -> Candidate {
        let fingerprint_distance = match (target_fingerprint, record.fingerprint.as_ref()) {
            (Some(target), Some(reference)) => target.hamming_distance(reference).ok(),
            _ => None,
        };
        let fingerprint_match =
            fingerprint_distance.is_some_and(|d| d <= self.fingerprint_threshold);

        let vector_similarity = match (target_embedding, record.usable_embedding()) {
            (Some(target), Some(reference)) => cosine_similarity(target, reference),
            _ => 0.0,
        };

        Candidate {
            record: record.clone(),
            fingerprint_match,
            fingerprint_distance,
            vector_similarity,
        }
    }

    /// Rank `collection` and keep at most `cap` candidates.
    ///
    /// Order: fingerprint matches first, then vector similarity descending.
    /// The sort is stable, so ties keep collection order. The target's own
    /// record, if present in the collection, is skipped.
    pub fn select(&self, target: &ImageRecord, collection: &[ImageRecord]) -> Vec<Candidate> {
        let target_fingerprint = target.fingerprint.as_ref();
        let target_embedding = target.usable_embedding();

        let mut candidates: Vec<Candidate> = collection
            .iter()
            .filter(|record| record.id != target.id)
            .map(|record| self.score(target_fingerprint, target_embedding, record))
            .collect();

        candidates.sort_by(|a, b| {
            b.fingerprint_match
                .cmp(&a.fingerprint_match)
                .then_with(|| b.vector_similarity.total_cmp(&a.vector_similarity))
        });
        candidates.truncate(self.cap);

        debug!(
            scanned = collection.len(),
            selected = candidates.len(),
            matches = candidates.iter().filter(|c| c.fingerprint_match).count(),
            "Selected candidates"
        );
        candidates
    }
}

impl Default for CandidateSelector {
    fn default() -> Self {
        Self::from_config(&AssessmentConfig::default())
    }
}
