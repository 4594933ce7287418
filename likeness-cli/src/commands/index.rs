//! Index command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::info;
use likeness_core::{AssessmentConfig, CollectionIndexer, FingerprintEngine};

use crate::utils::{build_oracles, format_timestamp, load_collection};
use crate::OutputFormat;

/// Execute the index command.
pub async fn execute(dir: PathBuf, use_mock: bool, format: OutputFormat, quiet: bool) -> Result<()> {
    let config = AssessmentConfig::from_env();
    config.validate().context("Invalid assessment settings")?;

    let collection = load_collection(&dir).await?;
    let oracles = build_oracles(use_mock)?;

    let indexer = CollectionIndexer::new(
        Arc::clone(&collection.index),
        collection.store.clone(),
        oracles.embedder,
        FingerprintEngine::new(config.grid()),
    );
    let summary = indexer.run_pass().await;
    let records = collection.index.records().await;

    info!(
        records = records.len(),
        incomplete = summary.incomplete,
        "Collection indexed"
    );

    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "directory": dir.display().to_string(),
                "processed": summary.processed,
                "fingerprinted": summary.fingerprinted,
                "embedded": summary.embedded,
                "incomplete": summary.incomplete,
                "records": records,
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&json).context("Failed to serialize index")?
            );
        }
        OutputFormat::Text if quiet => {}
        OutputFormat::Text => {
            println!();
            println!(
                "{}",
                format!("Indexed {} images from {}", records.len(), dir.display())
                    .green()
                    .bold()
            );
            println!();
            for record in &records {
                let fingerprint = record
                    .fingerprint
                    .as_ref()
                    .map(|fp| fp.to_hex())
                    .unwrap_or_else(|| "-".repeat(16));
                let embedding = match record.usable_embedding() {
                    Some(vector) => format!("{} dims", vector.len()),
                    None => "no embedding".red().to_string(),
                };
                println!(
                    "   {}  {}  {}  {}",
                    fingerprint,
                    embedding,
                    record.name,
                    format_timestamp(&record.uploaded_at).dimmed()
                );
            }
            if summary.incomplete > 0 {
                println!();
                println!(
                    "   {}",
                    format!("{} images incomplete (see logs)", summary.incomplete).yellow()
                );
            }
        }
    }

    Ok(())
}
