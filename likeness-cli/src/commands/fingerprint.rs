//! Fingerprint command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;
use likeness_core::{AssessmentConfig, FingerprintEngine};

use crate::utils::read_image;
use crate::OutputFormat;

/// Execute the fingerprint command.
pub fn execute(file: PathBuf, format: OutputFormat, quiet: bool) -> Result<()> {
    let config = AssessmentConfig::from_env();
    config.validate().context("Invalid assessment settings")?;
    let image = read_image(&file)?;

    let engine = FingerprintEngine::new(config.grid());
    let fingerprint = engine
        .fingerprint_bytes(&image.data)
        .with_context(|| format!("Failed to fingerprint {}", file.display()))?;

    info!(path = %file.display(), fingerprint = %fingerprint, "Fingerprint computed");

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "file": file.display().to_string(),
                "fingerprint": fingerprint.to_hex(),
                "bits": fingerprint.len(),
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).context("Failed to serialize fingerprint")?
            );
        }
        OutputFormat::Text if quiet => println!("{fingerprint}"),
        OutputFormat::Text => {
            println!();
            println!("   {} {}", "File:".dimmed(), file.display());
            println!("   {} {}", "Fingerprint:".dimmed(), fingerprint.to_string().bold());
            println!("   {} {}", "Bits:".dimmed(), fingerprint.len());
        }
    }

    Ok(())
}
