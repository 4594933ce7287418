//! Exit codes following sysexits.h conventions.
//!
//! These codes provide semantic meaning for different failure modes,
//! enabling scripts and CI systems to handle errors appropriately.

use likeness_core::LikenessError;

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage error (invalid arguments or settings).
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// Data format error (image could not be decoded).
/// Maps to EX_DATAERR from sysexits.h.
pub const DATA_ERROR: i32 = 65;

/// Cannot open input file or directory.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Service unavailable (oracle not configured or unreachable).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const ORACLE_UNAVAILABLE: i32 = 69;

/// I/O error (cannot write output).
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Help text appended to `--help`.
pub const HELP: &str = "\
Exit codes:
  0   Success
  64  Invalid arguments or settings
  65  Image could not be decoded
  66  Input file or directory missing
  69  Oracle unavailable
  74  Failed to write output";

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let typed = err
            .chain()
            .find_map(|cause| cause.downcast_ref::<LikenessError>())
            .and_then(|e| match e {
                LikenessError::DecodeError(_) => Some(DATA_ERROR),
                LikenessError::ConfigError(_) if !message.contains("Oracle unavailable") => {
                    Some(USAGE_ERROR)
                }
                _ => None,
            });

        // Classify by context message when no typed error decides it
        let code = typed.unwrap_or_else(|| {
            if message.contains("Failed to read") {
                INPUT_ERROR
            } else if message.contains("Oracle unavailable") {
                ORACLE_UNAVAILABLE
            } else if message.contains("Failed to write") || message.contains("serialize") {
                IO_ERROR
            } else {
                GENERAL_ERROR
            }
        });

        Self {
            code,
            message: Some(message),
        }
    }

    /// Report the message (if any) on stderr and convert for `main`.
    pub fn report(self) -> std::process::ExitCode {
        if let Some(message) = &self.message {
            eprintln!("Error: {message}");
        }
        std::process::ExitCode::from(u8::try_from(self.code).unwrap_or(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_missing_input_is_noinput() {
        let err = std::fs::read("/definitely/not/here.png")
            .context("Failed to read file: /definitely/not/here.png")
            .unwrap_err();
        assert_eq!(ExitCode::from_anyhow(&err).code, INPUT_ERROR);
    }

    #[test]
    fn test_decode_error_is_dataerr() {
        let err = anyhow::Error::new(LikenessError::DecodeError("bad".into()))
            .context("Failed to fingerprint image.png");
        assert_eq!(ExitCode::from_anyhow(&err).code, DATA_ERROR);
    }

    #[test]
    fn test_config_error_is_usage() {
        let err = anyhow::Error::new(LikenessError::ConfigError("batch_size".into()))
            .context("Invalid assessment settings");
        assert_eq!(ExitCode::from_anyhow(&err).code, USAGE_ERROR);
    }

    #[test]
    fn test_missing_oracle_is_unavailable() {
        let err = anyhow::Error::new(LikenessError::ConfigError("url not set".into()))
            .context("Oracle unavailable (pass --mock for offline runs)");
        assert_eq!(ExitCode::from_anyhow(&err).code, ORACLE_UNAVAILABLE);
    }

    #[test]
    fn test_success_has_no_message() {
        let code = ExitCode::success();
        assert_eq!(code.code, SUCCESS);
        assert!(code.message.is_none());
    }
}
