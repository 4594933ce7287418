//! Common utility functions shared across CLI commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use likeness_core::{
    CollectionIndex, ImageBytes, ImageRecord, MemoryImageStore, OracleProviderConfig,
    OracleProviderFactory, OracleSet,
};

/// Detect an image MIME type from the file extension.
pub fn detect_mime(path: &Path) -> Option<&'static str> {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .as_deref()
    {
        Some("jpg" | "jpeg") => Some("image/jpeg"),
        Some("png") => Some("image/png"),
        Some("gif") => Some("image/gif"),
        Some("webp") => Some("image/webp"),
        _ => None,
    }
}

/// Read an image file into memory.
pub fn read_image(path: &Path) -> Result<ImageBytes> {
    let data =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let mime = detect_mime(path).unwrap_or("application/octet-stream");

    debug!(path = %path.display(), bytes = data.len(), mime, "Read image");
    Ok(ImageBytes::new(data, mime))
}

/// A directory of images loaded as an in-memory collection.
pub struct LoadedCollection {
    pub index: Arc<CollectionIndex>,
    pub store: Arc<MemoryImageStore>,
}

/// Load every supported image in `dir` (non-recursive, sorted by file name).
pub async fn load_collection(dir: &Path) -> Result<LoadedCollection> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && detect_mime(path).is_some())
        .collect();
    paths.sort();

    let index = Arc::new(CollectionIndex::new());
    let store = Arc::new(MemoryImageStore::new());
    let mut loaded = 0;

    for path in paths {
        let image = match read_image(&path) {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable collection file");
                continue;
            }
        };
        let record = ImageRecord::new(display_name(&path), image.mime.clone());
        store.insert(record.id, image);
        index.insert(record).await?;
        loaded += 1;
    }

    info!(dir = %dir.display(), images = loaded, "Loaded collection");
    Ok(LoadedCollection { index, store })
}

/// Select oracles: mocks when requested, otherwise auto-detected HTTP oracles.
pub fn build_oracles(use_mock: bool) -> Result<OracleSet> {
    if use_mock {
        warn!("Using MOCK oracles (scores carry no visual meaning)");
        return Ok(OracleProviderFactory::create_mock());
    }
    OracleProviderFactory::create(OracleProviderConfig::Auto)
        .context("Oracle unavailable (pass --mock for offline runs)")
}

/// File name of `path`, falling back to the full path.
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Format a timestamp as a human-readable UTC string.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_detect_mime() {
        assert_eq!(detect_mime(Path::new("a.JPG")), Some("image/jpeg"));
        assert_eq!(detect_mime(Path::new("b.png")), Some("image/png"));
        assert_eq!(detect_mime(Path::new("c.webp")), Some("image/webp"));
        assert_eq!(detect_mime(Path::new("notes.txt")), None);
        assert_eq!(detect_mime(Path::new("noext")), None);
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("/tmp/dir/cat.png")), "cat.png");
    }

    #[test]
    fn test_format_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 45).unwrap();
        let formatted = format_timestamp(&ts);
        assert_eq!(formatted, "2024-01-15 12:30:45 UTC");
    }

    #[test]
    fn test_build_mock_oracles() {
        assert!(build_oracles(true).is_ok());
    }
}
