//! JSON-over-HTTP oracle adapters.
//!
//! Both adapters share one [`OracleHttpClient`] configuration shape:
//!
//! - `POST {api_url}/embed` with `{ "image": { "data", "mime" } }` returns
//!   `{ "description", "embedding" }`.
//! - `POST {api_url}/assess` with `{ "target", "reference", "referenceId",
//!   "fingerprintMatch" }` returns scores, evidence and analysis.
//!
//! Image data travels base64-encoded.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::http_client::{HttpOracleConfig, OracleHttpClient};
use super::{
    EmbeddingOracle, ImageEmbedding, OracleHealthStatus, OracleSource, VerificationOracle,
    VerificationRequest,
};
use crate::error::Result;
use crate::record::{
    AssessmentResult, Evidence, ImageBytes, ImageId, RiskScores, ScoreBreakdown,
    VerificationOutcome,
};

#[derive(Debug, Serialize)]
struct WireImage {
    data: String,
    mime: String,
}

impl From<&ImageBytes> for WireImage {
    fn from(image: &ImageBytes) -> Self {
        Self {
            data: BASE64.encode(&image.data),
            mime: image.mime.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    image: WireImage,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    description: String,
    #[serde(default)]
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssessRequest {
    target: WireImage,
    reference: WireImage,
    reference_id: ImageId,
    fingerprint_match: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssessResponse {
    scores: RiskScores,
    #[serde(default)]
    evidence: Evidence,
    #[serde(default)]
    analysis: String,
    #[serde(default)]
    breakdown: ScoreBreakdown,
    #[serde(default)]
    modification_suggestion: Option<String>,
}

/// Embedding oracle backed by a remote service.
pub struct HttpEmbeddingOracle {
    http: OracleHttpClient,
}

impl HttpEmbeddingOracle {
    #[instrument(level = "debug", skip_all, fields(api_url = %config.api_url))]
    pub fn new(config: HttpOracleConfig) -> Result<Self> {
        debug!("Creating HTTP embedding oracle");
        let http = OracleHttpClient::new(config)?;
        info!("HTTP embedding oracle created");
        Ok(Self { http })
    }

    pub async fn health(&self) -> OracleHealthStatus {
        self.http.health().await
    }
}

#[async_trait]
impl EmbeddingOracle for HttpEmbeddingOracle {
    #[instrument(level = "info", skip_all, fields(bytes = image.data.len(), mime = %image.mime))]
    async fn index(&self, image: &ImageBytes) -> Result<ImageEmbedding> {
        let start = Instant::now();
        let request = EmbedRequest {
            image: WireImage::from(image),
        };

        let response: EmbedResponse = self.http.post_json("embed", &request).await?;

        info!(
            dimensions = response.embedding.len(),
            total_latency_ms = start.elapsed().as_millis() as u64,
            "Embedding received"
        );
        Ok(ImageEmbedding {
            description: response.description,
            vector: response.embedding,
        })
    }

    fn source_id(&self) -> OracleSource {
        OracleSource::Http {
            endpoint: self.http.config().endpoint("embed"),
        }
    }
}

/// Verification oracle backed by a remote service.
pub struct HttpVerificationOracle {
    http: OracleHttpClient,
}

impl HttpVerificationOracle {
    #[instrument(level = "debug", skip_all, fields(api_url = %config.api_url))]
    pub fn new(config: HttpOracleConfig) -> Result<Self> {
        debug!("Creating HTTP verification oracle");
        let http = OracleHttpClient::new(config)?;
        info!("HTTP verification oracle created");
        Ok(Self { http })
    }

    pub async fn health(&self) -> OracleHealthStatus {
        self.http.health().await
    }
}

#[async_trait]
impl VerificationOracle for HttpVerificationOracle {
    #[instrument(
        level = "info",
        skip_all,
        fields(reference_id = %request.reference_id, fingerprint_match = request.fingerprint_match)
    )]
    async fn assess(&self, request: VerificationRequest<'_>) -> VerificationOutcome {
        let start = Instant::now();
        let body = AssessRequest {
            target: WireImage::from(request.target),
            reference: WireImage::from(request.reference),
            reference_id: request.reference_id,
            fingerprint_match: request.fingerprint_match,
        };

        match self.http.post_json::<_, AssessResponse>("assess", &body).await {
            Ok(response) => {
                info!(
                    total = response.scores.total,
                    total_latency_ms = start.elapsed().as_millis() as u64,
                    "Assessment received"
                );
                VerificationOutcome::Success(AssessmentResult {
                    reference_id: request.reference_id,
                    fingerprint_match: request.fingerprint_match,
                    vector_similarity: 0.0,
                    scores: response.scores,
                    evidence: response.evidence,
                    analysis: response.analysis,
                    breakdown: response.breakdown,
                    modification_suggestion: response.modification_suggestion,
                })
            }
            Err(e) => {
                warn!(
                    error = %e,
                    total_latency_ms = start.elapsed().as_millis() as u64,
                    "Assessment failed after all retries"
                );
                VerificationOutcome::Failed {
                    reference_id: request.reference_id,
                    fingerprint_match: request.fingerprint_match,
                    reason: e.to_string(),
                }
            }
        }
    }

    fn source_id(&self) -> OracleSource {
        OracleSource::Http {
            endpoint: self.http.config().endpoint("assess"),
        }
    }
}
