//! Assessment policy configuration.
//!
//! Handles loading policy constants from environment variables with the
//! reference defaults. Larger collections likely need an approximate
//! nearest-neighbour retrieval structure instead of the linear scan these
//! settings tune.

use serde::{Deserialize, Serialize};

use crate::error::{LikenessError, Result};

/// Largest accepted grid side.
pub const MAX_GRID_SIDE: u32 = 64;

/// Policy constants for retrieval and verification fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssessmentConfig {
    /// Maximum Hamming distance counted as a fingerprint match (default: 8)
    pub fingerprint_threshold: u32,
    /// Maximum number of candidates sent to deep verification (default: 5)
    pub candidate_cap: usize,
    /// Concurrent verification calls per batch (default: 3)
    pub batch_size: usize,
    /// Gradient pairs per fingerprint row (default: 8)
    pub grid_width: u32,
    /// Fingerprint rows (default: 8)
    pub grid_height: u32,
}

impl Default for AssessmentConfig {
    fn default() -> Self {
        Self {
            fingerprint_threshold: 8,
            candidate_cap: 5,
            batch_size: 3,
            grid_width: 8,
            grid_height: 8,
        }
    }
}

impl AssessmentConfig {
    /// Load configuration from `LIKENESS_*` environment variables.
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            fingerprint_threshold: env_or("LIKENESS_FINGERPRINT_THRESHOLD", defaults.fingerprint_threshold),
            candidate_cap: env_or("LIKENESS_CANDIDATE_CAP", defaults.candidate_cap),
            batch_size: env_or("LIKENESS_BATCH_SIZE", defaults.batch_size),
            grid_width: env_or("LIKENESS_GRID_WIDTH", defaults.grid_width),
            grid_height: env_or("LIKENESS_GRID_HEIGHT", defaults.grid_height),
        }
    }

    /// Reject settings that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.candidate_cap == 0 {
            return Err(LikenessError::ConfigError(
                "candidate_cap must be at least 1".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(LikenessError::ConfigError(
                "batch_size must be at least 1".into(),
            ));
        }
        if self.grid_width == 0 || self.grid_height == 0 {
            return Err(LikenessError::ConfigError(format!(
                "fingerprint grid must be non-empty, got {}x{}",
                self.grid_width, self.grid_height
            )));
        }
        if self.grid_width > MAX_GRID_SIDE || self.grid_height > MAX_GRID_SIDE {
            return Err(LikenessError::ConfigError(format!(
                "fingerprint grid {}x{} exceeds {MAX_GRID_SIDE}x{MAX_GRID_SIDE}",
                self.grid_width, self.grid_height
            )));
        }
        let bits = self
            .grid_width
            .checked_mul(self.grid_height)
            .ok_or_else(|| LikenessError::ConfigError("fingerprint grid too large".into()))?;
        if self.fingerprint_threshold > bits {
            return Err(LikenessError::ConfigError(format!(
                "fingerprint_threshold {} exceeds fingerprint length {bits}",
                self.fingerprint_threshold
            )));
        }
        Ok(())
    }

    /// Fingerprint grid described by this configuration.
    pub fn grid(&self) -> crate::fingerprint::FingerprintGrid {
        crate::fingerprint::FingerprintGrid::new(self.grid_width, self.grid_height)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AssessmentConfig::default();
        assert_eq!(config.fingerprint_threshold, 8);
        assert_eq!(config.candidate_cap, 5);
        assert_eq!(config.batch_size, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_cap() {
        let config = AssessmentConfig {
            candidate_cap: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LikenessError::ConfigError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = AssessmentConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_threshold_beyond_length() {
        let config = AssessmentConfig {
            grid_width: 2,
            grid_height: 2,
            fingerprint_threshold: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_oversized_grid() {
        let config = AssessmentConfig {
            grid_width: 100_000,
            grid_height: 100_000,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LikenessError::ConfigError(_))
        ));

        let config = AssessmentConfig {
            grid_width: MAX_GRID_SIDE + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AssessmentConfig {
            grid_width: MAX_GRID_SIDE,
            grid_height: MAX_GRID_SIDE,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AssessmentConfig =
            serde_json::from_str(r#"{"candidate_cap": 10}"#).unwrap();
        assert_eq!(config.candidate_cap, 10);
        assert_eq!(config.batch_size, 3);
    }
}
