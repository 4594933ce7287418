use thiserror::Error;

use crate::record::ImageId;

#[derive(Error, Debug)]
pub enum LikenessError {
    #[error("Decode error: {0}")]
    DecodeError(String),

    #[error("Length mismatch: left={left}, right={right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Fetch error for {id}: {reason}")]
    FetchError { id: ImageId, reason: String },

    #[error("Oracle error: {0}")]
    OracleError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Record already exists: {0}")]
    DuplicateRecord(ImageId),

    #[error("Assessment run {generation} was superseded by run {current}")]
    Superseded { generation: u64, current: u64 },

    #[cfg(feature = "network")]
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, LikenessError>;
