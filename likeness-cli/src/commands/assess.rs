//! Assess command implementation.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use likeness_core::{
    AssessmentConfig, AssessmentOrchestrator, AssessmentReport, CollectionIndexer,
    FingerprintEngine, RiskLevel, RunStatus, TargetImage,
};

use crate::utils::{build_oracles, display_name, load_collection, read_image};
use crate::{AssessArgs, OutputFormat};

fn settings(args: &AssessArgs) -> Result<AssessmentConfig> {
    let mut config = AssessmentConfig::from_env();
    if let Some(cap) = args.cap {
        config.candidate_cap = cap;
    }
    if let Some(threshold) = args.threshold {
        config.fingerprint_threshold = threshold;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    config.validate().context("Invalid assessment settings")?;
    Ok(config)
}

/// Execute the assess command.
pub async fn execute(args: AssessArgs, quiet: bool) -> Result<()> {
    let config = settings(&args)?;
    let target_bytes = read_image(&args.target)?;

    let collection = load_collection(&args.collection).await?;
    let oracles = build_oracles(args.mock)?;

    // Collection signals are needed before candidates can be ranked
    let indexer = CollectionIndexer::new(
        Arc::clone(&collection.index),
        collection.store.clone(),
        oracles.embedder.clone(),
        FingerprintEngine::new(config.grid()),
    );
    let summary = indexer.run_pass().await;
    debug!(processed = summary.processed, "Collection indexed");

    let orchestrator =
        AssessmentOrchestrator::new(config, collection.index, collection.store, oracles)?;

    let show_progress = !quiet && args.format == OutputFormat::Text;
    let mut progress = orchestrator.subscribe();
    let progress_task = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let update = progress.borrow_and_update().clone();
            if show_progress {
                eprintln!(
                    "{} {:<10} {}",
                    format!("[{:>3}%]", update.percent).dimmed(),
                    update.status,
                    update.step.unwrap_or_default()
                );
            }
            if update.status == RunStatus::Complete {
                break;
            }
        }
    });

    let target = TargetImage::new(display_name(&args.target), target_bytes);
    let report = orchestrator
        .assess(target)
        .await
        .context("Assessment did not complete")?;
    finish_progress(progress_task).await;

    info!(
        results = report.results.len(),
        risk = %report.risk_level(),
        "Assessment finished"
    );

    match args.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to serialize report")?
            );
        }
        OutputFormat::Text if quiet => println!("{}", report.risk_level()),
        OutputFormat::Text => print_report(&report),
    }

    Ok(())
}

/// Wait for the progress printer to drain.
async fn finish_progress(task: JoinHandle<()>) {
    if let Err(e) = task.await {
        warn!(error = %e, "Progress printer task failed");
    }
}

fn colored_level(level: RiskLevel) -> ColoredString {
    let label = level.to_string().to_uppercase();
    match level {
        RiskLevel::Low => label.green().bold(),
        RiskLevel::Medium => label.yellow().bold(),
        RiskLevel::High => label.red().bold(),
    }
}

fn print_report(report: &AssessmentReport) {
    let names: HashMap<_, _> = report
        .candidates
        .iter()
        .map(|c| (c.record.id, c.record.name.as_str()))
        .collect();

    println!();
    println!("{} {}", "Overall risk:".bold(), colored_level(report.risk_level()));
    println!(
        "   {} {} candidates, {} scored, {} skipped, {} failed",
        "Screened:".dimmed(),
        report.candidates.len(),
        report.results.len(),
        report.skipped,
        report.failed
    );
    println!();

    if report.results.is_empty() {
        println!("   {}", "No similar images found".green());
        return;
    }

    for (rank, result) in report.results.iter().enumerate() {
        let name = names.get(&result.reference_id).copied().unwrap_or("?");
        let marker = if result.fingerprint_match {
            "fingerprint match".yellow().to_string()
        } else {
            String::new()
        };
        println!(
            "   {}. {}  {} total={:.0} (semantic {:.0}, structure {:.0}, compliance {:.0}) similarity={:.2} {}",
            rank + 1,
            colored_level(result.risk_level()),
            name.bold(),
            result.scores.total,
            result.scores.semantic,
            result.scores.structure,
            result.scores.compliance,
            result.vector_similarity,
            marker
        );
        if !result.analysis.is_empty() {
            println!("      {}", result.analysis.dimmed());
        }
        if let Some(suggestion) = &result.modification_suggestion {
            println!("      {} {}", "Suggestion:".dimmed(), suggestion);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_finish_progress_absorbs_failed_printer() {
        let task = tokio::spawn(async { panic!("printer crashed") });
        finish_progress(task).await;
    }

    #[tokio::test]
    async fn test_finish_progress_waits_for_printer() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let task = tokio::spawn(async move {
            let _ = tx.send(());
        });
        finish_progress(task).await;
        assert!(rx.await.is_ok());
    }
}
