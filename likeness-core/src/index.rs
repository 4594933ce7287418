//! In-memory collection index with background population.
//!
//! Records enter the index with identity only. A single background worker
//! fills in the missing fingerprint, embedding and description one record at
//! a time, so background work holds at most one embedding-oracle call next to
//! any foreground assessment. A failed field is left unset and the record
//! becomes eligible again on the next pass.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::error::{LikenessError, Result};
use crate::fingerprint::{Fingerprint, FingerprintEngine};
use crate::oracle::{EmbeddingOracle, ImageEmbedding};
use crate::record::{ImageBytes, ImageId, ImageRecord};

/// Source of raw image bytes for collection records.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Fetch the bytes for `id`, failing with [`LikenessError::FetchError`].
    async fn fetch(&self, id: ImageId) -> Result<ImageBytes>;
}

/// In-memory image store for tests and small collections.
#[derive(Default)]
pub struct MemoryImageStore {
    images: DashMap<ImageId, ImageBytes>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: ImageId, image: ImageBytes) {
        self.images.insert(id, image);
    }

    pub fn remove(&self, id: ImageId) -> Option<ImageBytes> {
        self.images.remove(&id).map(|(_, image)| image)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn fetch(&self, id: ImageId) -> Result<ImageBytes> {
        self.images
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LikenessError::FetchError {
                id,
                reason: "not in store".into(),
            })
    }
}

/// Fields computed for one record during an indexing attempt.
#[derive(Debug, Clone, Default)]
pub struct IndexUpdate {
    pub fingerprint: Option<Fingerprint>,
    pub embedding: Option<ImageEmbedding>,
}

/// Ordered, in-memory set of collection records.
///
/// Record fields are written only by [`CollectionIndexer`]; everything else
/// reads snapshots.
#[derive(Default)]
pub struct CollectionIndex {
    records: RwLock<Vec<ImageRecord>>,
    changed: Notify,
}

impl CollectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record. Existing records are never replaced.
    pub async fn insert(&self, record: ImageRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.iter().any(|r| r.id == record.id) {
            return Err(LikenessError::DuplicateRecord(record.id));
        }
        debug!(id = %record.id, name = %record.name, "Record added to collection");
        records.push(record);
        drop(records);

        self.changed.notify_one();
        Ok(())
    }

    /// Snapshot of all records in insertion order.
    pub async fn records(&self) -> Vec<ImageRecord> {
        self.records.read().await.clone()
    }

    pub async fn get(&self, id: ImageId) -> Option<ImageRecord> {
        self.records.read().await.iter().find(|r| r.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Number of records the indexer still has work for.
    pub async fn pending(&self) -> usize {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.needs_indexing())
            .count()
    }

    /// Wake the background indexer, e.g. to retry failed records.
    pub fn request_pass(&self) {
        self.changed.notify_one();
    }

    /// Mark the first eligible record not in `skip` as in progress.
    async fn claim_next(&self, skip: &HashSet<ImageId>) -> Option<ImageRecord> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.needs_indexing() && !skip.contains(&r.id))?;
        record.indexing = true;
        Some(record.clone())
    }

    /// Store computed fields and clear the in-progress flag.
    ///
    /// Fields already populated are left untouched, so each is written at
    /// most once.
    async fn commit(&self, id: ImageId, update: IndexUpdate) {
        let mut records = self.records.write().await;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return;
        };

        if record.fingerprint.is_none() {
            record.fingerprint = update.fingerprint;
        }
        if record.usable_embedding().is_none() {
            if let Some(embedding) = update.embedding.filter(|e| e.usable_vector().is_some()) {
                record.embedding = Some(embedding.vector);
                record.description = Some(embedding.description);
            }
        }
        record.indexing = false;
    }
}

/// Summary of one indexing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexPassSummary {
    pub processed: usize,
    pub fingerprinted: usize,
    pub embedded: usize,
    /// Records left with at least one field still missing.
    pub incomplete: usize,
}

/// Populates missing record fields, one record at a time.
pub struct CollectionIndexer {
    index: Arc<CollectionIndex>,
    store: Arc<dyn ImageStore>,
    embedder: Arc<dyn EmbeddingOracle>,
    engine: FingerprintEngine,
}

impl CollectionIndexer {
    pub fn new(
        index: Arc<CollectionIndex>,
        store: Arc<dyn ImageStore>,
        embedder: Arc<dyn EmbeddingOracle>,
        engine: FingerprintEngine,
    ) -> Self {
        Self {
            index,
            store,
            embedder,
            engine,
        }
    }

    /// Compute whatever `record` is missing. Never fails: problems leave the
    /// corresponding field unset.
    #[instrument(level = "debug", skip_all, fields(id = %record.id, name = %record.name))]
    pub async fn compute(&self, record: &ImageRecord) -> IndexUpdate {
        let image = match self.store.fetch(record.id).await {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, "Image bytes unavailable, skipping");
                return IndexUpdate::default();
            }
        };

        let fingerprint = if record.fingerprint.is_none() {
            match self.engine.fingerprint_bytes(&image.data) {
                Ok(fp) => Some(fp),
                Err(e) => {
                    warn!(error = %e, "Fingerprinting failed");
                    None
                }
            }
        } else {
            None
        };

        let embedding = if record.usable_embedding().is_none() {
            match self.embedder.index(&image).await {
                Ok(embedding) if embedding.usable_vector().is_some() => Some(embedding),
                Ok(_) => {
                    warn!("Embedding oracle returned an empty vector");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "Embedding failed");
                    None
                }
            }
        } else {
            None
        };

        IndexUpdate {
            fingerprint,
            embedding,
        }
    }

    /// Visit every eligible record once, sequentially.
    pub async fn run_pass(&self) -> IndexPassSummary {
        let mut summary = IndexPassSummary::default();
        let mut attempted = HashSet::new();

        while let Some(record) = self.index.claim_next(&attempted).await {
            attempted.insert(record.id);

            let update = self.compute(&record).await;
            let fingerprinted = update.fingerprint.is_some();
            let embedded = update.embedding.is_some();
            self.index.commit(record.id, update).await;

            summary.processed += 1;
            summary.fingerprinted += usize::from(fingerprinted);
            summary.embedded += usize::from(embedded);
            let complete = (record.fingerprint.is_some() || fingerprinted)
                && (record.usable_embedding().is_some() || embedded);
            summary.incomplete += usize::from(!complete);
        }

        if summary.processed > 0 {
            info!(
                processed = summary.processed,
                fingerprinted = summary.fingerprinted,
                embedded = summary.embedded,
                incomplete = summary.incomplete,
                "Indexing pass finished"
            );
        }
        summary
    }

    /// Run passes in a background task whenever the collection changes.
    pub fn spawn(self: Arc<Self>) -> IndexerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            info!("Background indexer started");
            loop {
                self.run_pass().await;

                tokio::select! {
                    _ = self.index.changed.notified() => {}
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("Background indexer stopped");
        });

        IndexerHandle { shutdown_tx, task }
    }
}

/// Handle to the background indexer task.
pub struct IndexerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl IndexerHandle {
    /// Stop the worker after its current pass and wait for it to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Background indexer task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::{MockEmbeddingOracle, OracleSource};
    use image::{DynamicImage, ImageBuffer, Rgb};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn png_bytes(seed: u8) -> Vec<u8> {
        let img = ImageBuffer::from_fn(32, 32, |x, y| {
            Rgb([(x as u8).wrapping_mul(seed), (y as u8).wrapping_add(seed), seed])
        });
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();
        buffer.into_inner()
    }

    /// Fails the first `failures` calls, then delegates to the mock.
    struct FlakyEmbedder {
        failures: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingOracle for FlakyEmbedder {
        async fn index(&self, image: &ImageBytes) -> Result<ImageEmbedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(LikenessError::OracleError("unavailable".into()));
            }
            MockEmbeddingOracle::new(4).index(image).await
        }

        fn source_id(&self) -> OracleSource {
            OracleSource::Mock
        }
    }

    async fn setup(
        embedder: Arc<dyn EmbeddingOracle>,
        images: Vec<Vec<u8>>,
    ) -> (Arc<CollectionIndex>, Arc<MemoryImageStore>, CollectionIndexer) {
        let index = Arc::new(CollectionIndex::new());
        let store = Arc::new(MemoryImageStore::new());
        for (i, data) in images.into_iter().enumerate() {
            let record = ImageRecord::new(format!("img{i}.png"), "image/png");
            store.insert(record.id, ImageBytes::new(data, "image/png"));
            index.insert(record).await.unwrap();
        }
        let indexer = CollectionIndexer::new(
            index.clone(),
            store.clone(),
            embedder,
            FingerprintEngine::default(),
        );
        (index, store, indexer)
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let index = CollectionIndex::new();
        let record = ImageRecord::new("a.png", "image/png");
        index.insert(record.clone()).await.unwrap();

        let result = index.insert(record).await;
        assert!(matches!(result, Err(LikenessError::DuplicateRecord(_))));
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn test_pass_populates_all_fields() {
        let (index, _store, indexer) =
            setup(Arc::new(MockEmbeddingOracle::new(4)), vec![png_bytes(1), png_bytes(2)]).await;

        let summary = indexer.run_pass().await;

        assert_eq!(summary.processed, 2);
        assert_eq!(summary.fingerprinted, 2);
        assert_eq!(summary.embedded, 2);
        assert_eq!(summary.incomplete, 0);
        assert_eq!(index.pending().await, 0);
        for record in index.records().await {
            assert!(record.is_fully_indexed());
            assert!(record.description.is_some());
            assert!(!record.indexing);
            assert_eq!(record.fingerprint.unwrap().len(), 64);
        }
    }

    #[tokio::test]
    async fn test_failed_embedding_is_retried_next_pass() {
        let embedder = Arc::new(FlakyEmbedder {
            failures: AtomicUsize::new(1),
            calls: AtomicUsize::new(0),
        });
        let (index, _store, indexer) = setup(embedder.clone(), vec![png_bytes(3)]).await;

        let first = indexer.run_pass().await;
        assert_eq!(first.processed, 1);
        assert_eq!(first.embedded, 0);
        assert_eq!(first.incomplete, 1);

        let record = &index.records().await[0];
        assert!(record.fingerprint.is_some(), "fingerprint committed despite embedding failure");
        assert!(record.embedding.is_none());
        assert!(!record.indexing, "in-progress flag cleared on failure");

        let second = indexer.run_pass().await;
        assert_eq!(second.processed, 1);
        assert_eq!(second.fingerprinted, 0, "fingerprint is not recomputed");
        assert_eq!(second.embedded, 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
        assert!(index.records().await[0].is_fully_indexed());
    }

    #[tokio::test]
    async fn test_pass_visits_each_record_once() {
        let embedder = Arc::new(FlakyEmbedder {
            failures: AtomicUsize::new(usize::MAX),
            calls: AtomicUsize::new(0),
        });
        let (_index, _store, indexer) =
            setup(embedder.clone(), vec![png_bytes(4), png_bytes(5)]).await;

        let summary = indexer.run_pass().await;
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.incomplete, 2);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_bytes_leave_record_eligible() {
        let (index, store, indexer) =
            setup(Arc::new(MockEmbeddingOracle::new(4)), vec![png_bytes(6)]).await;
        let id = index.records().await[0].id;
        store.remove(id);

        let summary = indexer.run_pass().await;
        assert_eq!(summary.incomplete, 1);
        assert!(index.get(id).await.unwrap().needs_indexing());
    }

    #[tokio::test]
    async fn test_undecodable_image_still_gets_embedding() {
        let (index, _store, indexer) =
            setup(Arc::new(MockEmbeddingOracle::new(4)), vec![b"not an image".to_vec()]).await;

        indexer.run_pass().await;

        let record = &index.records().await[0];
        assert!(record.fingerprint.is_none());
        assert!(record.usable_embedding().is_some());
    }

    #[tokio::test]
    async fn test_background_worker_indexes_new_records() {
        let (index, store, indexer) =
            setup(Arc::new(MockEmbeddingOracle::new(4)), vec![png_bytes(7)]).await;
        let handle = Arc::new(indexer).spawn();

        let record = ImageRecord::new("late.png", "image/png");
        store.insert(record.id, ImageBytes::new(png_bytes(8), "image/png"));
        index.insert(record).await.unwrap();

        let mut waited = Duration::ZERO;
        while !index.records().await.iter().all(|r| r.is_fully_indexed())
            && waited < Duration::from_secs(5)
        {
            tokio::time::sleep(Duration::from_millis(10)).await;
            waited += Duration::from_millis(10);
        }

        assert_eq!(index.len().await, 2);
        assert!(index.records().await.iter().all(|r| r.is_fully_indexed()));
        assert_eq!(index.pending().await, 0);
        handle.shutdown().await;
    }
}
