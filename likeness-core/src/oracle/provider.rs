//! Oracle provider selection.
//!
//! ## Supported Providers
//!
//! - `Http` - remote embedding and verification services (`network` feature)
//! - `Mock` - deterministic mocks (testing only)
//! - `Auto` - HTTP when `LIKENESS_ORACLE_URL` is set

use std::sync::Arc;

use super::{EmbeddingOracle, MockEmbeddingOracle, MockVerificationOracle, VerificationOracle};
#[cfg(feature = "network")]
use super::{HttpEmbeddingOracle, HttpOracleConfig, HttpVerificationOracle};
use crate::error::{LikenessError, Result};

/// Configuration for creating oracle providers.
#[derive(Debug, Clone, Default)]
pub enum OracleProviderConfig {
    /// Remote HTTP oracles
    #[cfg(feature = "network")]
    Http(HttpOracleConfig),

    /// Mock oracles (testing only)
    Mock { dimensions: usize },

    /// Select from the environment
    #[default]
    Auto,
}

/// Health status of an oracle provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleHealthStatus {
    /// Provider is healthy and operational
    Healthy,
    /// Provider is degraded but functional
    Degraded { reason: String },
    /// Provider is unavailable
    Unavailable { reason: String },
}

/// The pair of oracles an assessment needs.
#[derive(Clone)]
pub struct OracleSet {
    pub embedder: Arc<dyn EmbeddingOracle>,
    pub verifier: Arc<dyn VerificationOracle>,
}

/// Factory for creating oracle providers.
pub struct OracleProviderFactory;

impl OracleProviderFactory {
    /// Create both oracles from configuration.
    pub fn create(config: OracleProviderConfig) -> Result<OracleSet> {
        match config {
            #[cfg(feature = "network")]
            OracleProviderConfig::Http(http_config) => Ok(OracleSet {
                embedder: Arc::new(HttpEmbeddingOracle::new(http_config.clone())?),
                verifier: Arc::new(HttpVerificationOracle::new(http_config)?),
            }),
            OracleProviderConfig::Mock { dimensions } => {
                if dimensions == 0 {
                    return Err(LikenessError::ConfigError(
                        "mock embedding dimensions must be at least 1".into(),
                    ));
                }
                Ok(OracleSet {
                    embedder: Arc::new(MockEmbeddingOracle::new(dimensions)),
                    verifier: Arc::new(MockVerificationOracle::new()),
                })
            }
            OracleProviderConfig::Auto => Self::create_auto(),
        }
    }

    /// Select HTTP oracles from the environment.
    ///
    /// Mocks are never auto-selected: they produce scores with no visual
    /// meaning and must be requested explicitly.
    fn create_auto() -> Result<OracleSet> {
        #[cfg(feature = "network")]
        {
            let http_config = HttpOracleConfig::from_env()?;
            tracing::info!(api_url = %http_config.api_url, "Auto-selected HTTP oracles");
            Self::create(OracleProviderConfig::Http(http_config))
        }

        #[cfg(not(feature = "network"))]
        Err(LikenessError::ConfigError(
            "no oracle available: built without the `network` feature".into(),
        ))
    }

    /// Create mock oracles for testing.
    pub fn create_mock() -> OracleSet {
        OracleSet {
            embedder: Arc::new(MockEmbeddingOracle::default()),
            verifier: Arc::new(MockVerificationOracle::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::OracleSource;

    #[test]
    fn test_provider_config_default() {
        let config = OracleProviderConfig::default();
        assert!(matches!(config, OracleProviderConfig::Auto));
    }

    #[test]
    fn test_create_mock_provider() {
        let oracles = OracleProviderFactory::create_mock();
        assert_eq!(oracles.embedder.source_id(), OracleSource::Mock);
        assert_eq!(oracles.verifier.source_id(), OracleSource::Mock);
    }

    #[test]
    fn test_create_mock_rejects_zero_dimensions() {
        let result = OracleProviderFactory::create(OracleProviderConfig::Mock { dimensions: 0 });
        assert!(matches!(result, Err(LikenessError::ConfigError(_))));
    }

    #[cfg(feature = "network")]
    #[test]
    fn test_create_http_provider() {
        let config = OracleProviderConfig::Http(HttpOracleConfig::new("https://oracle.test"));
        let oracles = OracleProviderFactory::create(config).unwrap();
        assert_eq!(
            oracles.embedder.source_id(),
            OracleSource::Http {
                endpoint: "https://oracle.test/embed".into()
            }
        );
    }

    #[test]
    fn test_health_status_variants() {
        let healthy = OracleHealthStatus::Healthy;
        let degraded = OracleHealthStatus::Degraded {
            reason: "test".into(),
        };

        assert_eq!(healthy, OracleHealthStatus::Healthy);
        assert!(matches!(degraded, OracleHealthStatus::Degraded { .. }));
    }
}
