//! Compare command implementation.

use std::path::PathBuf;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;
use likeness_core::{hamming_distance, AssessmentConfig, FingerprintEngine};

use crate::utils::read_image;
use crate::OutputFormat;

/// Execute the compare command.
pub fn execute(
    a: PathBuf,
    b: PathBuf,
    threshold: Option<u32>,
    format: OutputFormat,
    quiet: bool,
) -> Result<()> {
    let config = AssessmentConfig::from_env();
    config.validate().context("Invalid assessment settings")?;
    let threshold = threshold.unwrap_or(config.fingerprint_threshold);
    let engine = FingerprintEngine::new(config.grid());

    let fp_a = engine
        .fingerprint_bytes(&read_image(&a)?.data)
        .with_context(|| format!("Failed to fingerprint {}", a.display()))?;
    let fp_b = engine
        .fingerprint_bytes(&read_image(&b)?.data)
        .with_context(|| format!("Failed to fingerprint {}", b.display()))?;

    let distance = hamming_distance(&fp_a, &fp_b)?;
    let is_match = distance <= threshold;

    info!(distance, threshold, is_match, "Compared fingerprints");

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "a": { "file": a.display().to_string(), "fingerprint": fp_a.to_hex() },
                "b": { "file": b.display().to_string(), "fingerprint": fp_b.to_hex() },
                "distance": distance,
                "threshold": threshold,
                "match": is_match,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).context("Failed to serialize comparison")?
            );
        }
        OutputFormat::Text if quiet => println!("{distance}"),
        OutputFormat::Text => {
            println!();
            if is_match {
                println!("{}", "NEAR-DUPLICATE".yellow().bold());
            } else {
                println!("{}", "DISTINCT".green().bold());
            }
            println!();
            println!("   {} {}", "A:".dimmed(), fp_a);
            println!("   {} {}", "B:".dimmed(), fp_b);
            println!(
                "   {} {} (threshold {})",
                "Distance:".dimmed(),
                distance,
                threshold
            );
        }
    }

    Ok(())
}
