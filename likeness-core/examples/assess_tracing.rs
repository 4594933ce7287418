//! Example demonstrating assessment tracing instrumentation.
//!
//! Run with: cargo run -p likeness-core --example assess_tracing -- <target> <reference>...

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};
use likeness_core::{
    AssessmentConfig, AssessmentOrchestrator, CollectionIndex, ImageBytes, ImageRecord,
    MemoryImageStore, OracleProviderFactory, TargetImage,
};

fn mime_for(path: &str) -> &'static str {
    match path.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/png",
    }
}

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::new("likeness_core=debug,info"))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(target_path) = args.next() else {
        eprintln!("usage: assess_tracing <target> <reference>...");
        return;
    };

    println!("=== Likeness Assessment Tracing Demo ===\n");

    let index = Arc::new(CollectionIndex::new());
    let store = Arc::new(MemoryImageStore::new());
    for path in args {
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) => {
                eprintln!("Skipping {path}: {e}");
                continue;
            }
        };
        let record = ImageRecord::new(path.clone(), mime_for(&path));
        store.insert(record.id, ImageBytes::new(data, mime_for(&path)));
        if let Err(e) = index.insert(record).await {
            eprintln!("Skipping {path}: {e}");
        }
    }

    let target_bytes = match std::fs::read(&target_path) {
        Ok(data) => ImageBytes::new(data, mime_for(&target_path)),
        Err(e) => {
            eprintln!("Failed to read target: {e}");
            return;
        }
    };

    let orchestrator = match AssessmentOrchestrator::new(
        AssessmentConfig::default(),
        index,
        store,
        OracleProviderFactory::create_mock(),
    ) {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Failed to create orchestrator: {e}");
            return;
        }
    };

    match orchestrator
        .assess(TargetImage::new(target_path, target_bytes))
        .await
    {
        Ok(report) => {
            println!("\nRisk level: {}", report.risk_level());
            for result in &report.results {
                println!(
                    "   {} total={:.1} match={}",
                    result.reference_id, result.scores.total, result.fingerprint_match
                );
            }
        }
        Err(e) => println!("\nFailed: {e}"),
    }
}
