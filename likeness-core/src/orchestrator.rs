//! Assessment orchestration.
//!
//! One run walks a fixed state machine:
//!
//! ```text
//! Idle -> Indexing -> Retrieving -> Analyzing -> Complete
//! ```
//!
//! - **Indexing**: fill in the target's fingerprint and embedding. A failed
//!   embedding degrades to fingerprint-only retrieval.
//! - **Retrieving**: rank the collection with the [`CandidateSelector`].
//! - **Analyzing**: verify candidates in batches of `batch_size` concurrent
//!   oracle calls, waiting for each batch to finish before the next starts.
//! - **Complete**: drop failed and zero-score outcomes, then sort by
//!   fingerprint match and total score.
//!
//! There is no error state. Per-candidate failures are absorbed and every
//! run that is not superseded reaches `Complete`.
//!
//! Each run is tagged with a generation id. Submitting a new target or
//! calling [`AssessmentOrchestrator::reset`] bumps the generation; work
//! belonging to an older generation is dropped when it tries to commit.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, instrument, warn};

use crate::config::AssessmentConfig;
use crate::error::{LikenessError, Result};
use crate::fingerprint::FingerprintEngine;
use crate::index::{CollectionIndex, ImageStore};
use crate::oracle::{OracleSet, VerificationRequest};
use crate::record::{AssessmentResult, ImageBytes, ImageRecord, RiskLevel, VerificationOutcome};
use crate::selector::{Candidate, CandidateSelector};

const PROGRESS_INDEXING: u8 = 10;
const PROGRESS_RETRIEVING: u8 = 25;
const PROGRESS_ANALYZING_START: u8 = 30;
const PROGRESS_ANALYZING_END: u8 = 95;
const PROGRESS_COMPLETE: u8 = 100;

/// Phase of an assessment run. Only ever advances within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Indexing,
    Retrieving,
    Analyzing,
    Complete,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Indexing => "indexing",
            Self::Retrieving => "retrieving",
            Self::Analyzing => "analyzing",
            Self::Complete => "complete",
        };
        f.pad(name)
    }
}

/// Progress snapshot published to observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub generation: u64,
    pub status: RunStatus,
    pub percent: u8,
    pub step: Option<String>,
}

/// State of the current assessment session.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentRun {
    pub generation: u64,
    pub target: Option<ImageRecord>,
    pub candidates: Vec<Candidate>,
    pub results: Vec<AssessmentResult>,
    pub status: RunStatus,
    pub progress: u8,
    pub step: Option<String>,
}

impl AssessmentRun {
    fn new(generation: u64, target: Option<ImageRecord>) -> Self {
        Self {
            generation,
            target,
            candidates: Vec::new(),
            results: Vec::new(),
            status: RunStatus::Idle,
            progress: 0,
            step: None,
        }
    }

    fn advance(&mut self, status: RunStatus, percent: u8, step: Option<String>) {
        self.status = self.status.max(status);
        self.progress = self.progress.max(percent.min(PROGRESS_COMPLETE));
        self.step = step;
    }

    fn progress_snapshot(&self) -> Progress {
        Progress {
            generation: self.generation,
            status: self.status,
            percent: self.progress,
            step: self.step.clone(),
        }
    }
}

/// An image submitted for assessment.
#[derive(Debug, Clone)]
pub struct TargetImage {
    pub record: ImageRecord,
    pub image: ImageBytes,
}

impl TargetImage {
    /// Wrap fresh bytes in a new, unindexed record.
    pub fn new(name: impl Into<String>, image: ImageBytes) -> Self {
        let record = ImageRecord::new(name, image.mime.clone());
        Self { record, image }
    }

    /// Assess an existing record, reusing any fields it already carries.
    pub fn from_record(record: ImageRecord, image: ImageBytes) -> Self {
        Self { record, image }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentReport {
    pub generation: u64,
    pub target: ImageRecord,
    pub candidates: Vec<Candidate>,
    pub results: Vec<AssessmentResult>,
    /// Candidates whose bytes could not be fetched.
    pub skipped: usize,
    /// Candidates whose oracle call failed.
    pub failed: usize,
}

impl AssessmentReport {
    /// Result with the highest total score, if any.
    pub fn highest_risk(&self) -> Option<&AssessmentResult> {
        self.results
            .iter()
            .max_by(|a, b| a.scores.total.total_cmp(&b.scores.total))
    }

    /// Risk band of the highest-scoring result; `Low` when nothing surfaced.
    pub fn risk_level(&self) -> RiskLevel {
        self.highest_risk()
            .map(AssessmentResult::risk_level)
            .unwrap_or(RiskLevel::Low)
    }
}

/// Filter and order verification outcomes for presentation.
///
/// Failed outcomes and results with a zero total are dropped. The rest are
/// sorted by fingerprint match (matches first), then total score descending.
/// The sort is stable, so equal results keep candidate order.
pub fn rank_results(outcomes: Vec<VerificationOutcome>) -> Vec<AssessmentResult> {
    let mut results: Vec<AssessmentResult> = outcomes
        .into_iter()
        .filter_map(VerificationOutcome::into_result)
        .filter(|result| result.scores.total != 0.0)
        .collect();

    results.sort_by(|a, b| {
        b.fingerprint_match
            .cmp(&a.fingerprint_match)
            .then_with(|| b.scores.total.total_cmp(&a.scores.total))
    });
    results
}

/// Drives assessment runs against a collection.
pub struct AssessmentOrchestrator {
    config: AssessmentConfig,
    index: Arc<CollectionIndex>,
    store: Arc<dyn ImageStore>,
    oracles: OracleSet,
    engine: FingerprintEngine,
    generation: AtomicU64,
    run: RwLock<AssessmentRun>,
    progress: watch::Sender<Progress>,
}

impl AssessmentOrchestrator {
    pub fn new(
        config: AssessmentConfig,
        index: Arc<CollectionIndex>,
        store: Arc<dyn ImageStore>,
        oracles: OracleSet,
    ) -> Result<Self> {
        config.validate()?;

        let run = AssessmentRun::new(0, None);
        let (progress, _) = watch::channel(run.progress_snapshot());

        Ok(Self {
            engine: FingerprintEngine::new(config.grid()),
            config,
            index,
            store,
            oracles,
            generation: AtomicU64::new(0),
            run: RwLock::new(run),
            progress,
        })
    }

    pub fn config(&self) -> &AssessmentConfig {
        &self.config
    }

    /// Generation id of the most recently started (or reset) run.
    pub fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Observe progress updates.
    pub fn subscribe(&self) -> watch::Receiver<Progress> {
        self.progress.subscribe()
    }

    /// Copy of the current run state.
    pub async fn snapshot(&self) -> AssessmentRun {
        self.run.read().await.clone()
    }

    /// Discard the current run. In-flight work from it is ignored on arrival.
    pub async fn reset(&self) {
        let generation = self.begin(None).await;
        info!(generation, "Assessment reset");
    }

    /// Run a full assessment for `target`.
    ///
    /// # Errors
    ///
    /// Only [`LikenessError::Superseded`], when another run started (or the
    /// orchestrator was reset) before this one finished. Candidate-level
    /// failures never surface as errors.
    #[instrument(level = "info", skip_all, fields(target = %target.record.name))]
    pub async fn assess(&self, target: TargetImage) -> Result<AssessmentReport> {
        let generation = self.begin(Some(target.record.clone())).await;
        info!(generation, "Assessment started");

        // Indexing
        self.advance(generation, RunStatus::Indexing, PROGRESS_INDEXING, "Indexing target image")
            .await?;
        let target_record = self.index_target(&target).await;
        let committed = target_record.clone();
        self.commit(generation, move |run| run.target = Some(committed))
            .await?;

        // Retrieving
        self.advance(generation, RunStatus::Retrieving, PROGRESS_RETRIEVING, "Retrieving candidates")
            .await?;
        let collection = self.index.records().await;
        let candidates = CandidateSelector::from_config(&self.config).select(&target_record, &collection);
        info!(
            generation,
            collection = collection.len(),
            candidates = candidates.len(),
            "Candidates selected"
        );
        let committed = candidates.clone();
        self.commit(generation, move |run| run.candidates = committed)
            .await?;

        // Analyzing
        let mut outcomes = Vec::with_capacity(candidates.len());
        let mut skipped = 0;
        if !candidates.is_empty() {
            self.advance(
                generation,
                RunStatus::Analyzing,
                PROGRESS_ANALYZING_START,
                format!("Analyzing {} candidates", candidates.len()),
            )
            .await?;

            let mut done = 0;
            for batch in candidates.chunks(self.config.batch_size) {
                let calls = batch
                    .iter()
                    .map(|candidate| self.verify_candidate(&target.image, candidate));
                let batch_outcomes = join_all(calls).await;

                done += batch.len();
                let percent = analyzing_percent(done, candidates.len());
                self.advance(
                    generation,
                    RunStatus::Analyzing,
                    percent,
                    format!("Analyzed {done} of {} candidates", candidates.len()),
                )
                .await?;

                for outcome in batch_outcomes {
                    match outcome {
                        Some(outcome) => outcomes.push(outcome),
                        None => skipped += 1,
                    }
                }
            }
        }

        // Complete
        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, VerificationOutcome::Failed { .. }))
            .count();
        let results = rank_results(outcomes);
        let committed = results.clone();
        self.commit(generation, move |run| {
            run.results = committed;
            run.advance(RunStatus::Complete, PROGRESS_COMPLETE, None);
        })
        .await?;

        info!(
            generation,
            results = results.len(),
            skipped,
            failed,
            "Assessment complete"
        );
        Ok(AssessmentReport {
            generation,
            target: target_record,
            candidates,
            results,
            skipped,
            failed,
        })
    }

    /// Replace the run state wholesale and return the new generation id.
    async fn begin(&self, target: Option<ImageRecord>) -> u64 {
        let mut run = self.run.write().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *run = AssessmentRun::new(generation, target);
        self.progress.send_replace(run.progress_snapshot());
        generation
    }

    /// Apply `update` to the run if `generation` is still current.
    async fn commit<F>(&self, generation: u64, update: F) -> Result<()>
    where
        F: FnOnce(&mut AssessmentRun),
    {
        let mut run = self.run.write().await;
        if run.generation != generation {
            debug!(generation, current = run.generation, "Dropping stale update");
            return Err(LikenessError::Superseded {
                generation,
                current: run.generation,
            });
        }
        update(&mut run);
        self.progress.send_replace(run.progress_snapshot());
        Ok(())
    }

    async fn advance(
        &self,
        generation: u64,
        status: RunStatus,
        percent: u8,
        step: impl Into<String>,
    ) -> Result<()> {
        let step = step.into();
        debug!(generation, %status, percent, step = %step, "Progress");
        self.commit(generation, move |run| run.advance(status, percent, Some(step)))
            .await
    }

    /// Obtain or compute the target's fingerprint and embedding.
    async fn index_target(&self, target: &TargetImage) -> ImageRecord {
        let mut record = target.record.clone();

        if let Some(indexed) = self.index.get(record.id).await {
            if record.usable_embedding().is_none() && indexed.usable_embedding().is_some() {
                record.embedding = indexed.embedding.clone();
                record.description = indexed.description.clone();
            }
            if record.fingerprint.is_none() {
                record.fingerprint = indexed.fingerprint;
            }
        }

        if record.fingerprint.is_none() {
            match self.engine.fingerprint_bytes(&target.image.data) {
                Ok(fp) => record.fingerprint = Some(fp),
                Err(e) => warn!(error = %e, "Target fingerprint unavailable"),
            }
        }

        if record.usable_embedding().is_none() {
            match self.oracles.embedder.index(&target.image).await {
                Ok(embedding) if embedding.usable_vector().is_some() => {
                    record.embedding = Some(embedding.vector);
                    record.description = Some(embedding.description);
                }
                Ok(_) => warn!("Target embedding empty, continuing without it"),
                Err(e) => warn!(error = %e, "Target embedding failed, continuing without it"),
            }
        }

        record
    }

    /// Verify one candidate. `None` means its bytes could not be fetched.
    async fn verify_candidate(
        &self,
        target: &ImageBytes,
        candidate: &Candidate,
    ) -> Option<VerificationOutcome> {
        let reference_id = candidate.record.id;
        let reference = match self.store.fetch(reference_id).await {
            Ok(image) => image,
            Err(e) => {
                warn!(reference_id = %reference_id, error = %e, "Candidate skipped");
                return None;
            }
        };

        let outcome = self
            .oracles
            .verifier
            .assess(VerificationRequest {
                target,
                reference: &reference,
                reference_id,
                fingerprint_match: candidate.fingerprint_match,
            })
            .await;

        Some(match outcome {
            VerificationOutcome::Success(mut result) => {
                result.reference_id = reference_id;
                result.fingerprint_match = candidate.fingerprint_match;
                result.vector_similarity = candidate.vector_similarity;
                debug!(reference_id = %reference_id, total = result.scores.total, "Candidate verified");
                VerificationOutcome::Success(result)
            }
            failed @ VerificationOutcome::Failed { .. } => {
                warn!(reference_id = %reference_id, "Verification failed");
                failed
            }
        })
    }
}

fn analyzing_percent(done: usize, total: usize) -> u8 {
    let span = usize::from(PROGRESS_ANALYZING_END - PROGRESS_ANALYZING_START);
    let interpolated = span * done / total.max(1);
    PROGRESS_ANALYZING_START + interpolated.min(span) as u8
}
