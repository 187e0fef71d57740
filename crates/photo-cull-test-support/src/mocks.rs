//! Mock implementations of core port traits.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use photo_cull_core::domain::{
    AiScore, BackendError, BoundingBox, FaceDetection, FaceQuality, ItemId, Phase, PhotoItem,
};
use photo_cull_core::orchestrator::BatchResults;
use photo_cull_core::ports::{
    keys, BlurMeasurement, Catalog, MetadataValue, ProgressCallback, ProgressUpdate,
    QualityAssessor, ResultOutput,
};

type QualityFn = dyn Fn(&Path) -> Result<AiScore, BackendError> + Send + Sync;

/// Mock implementation of `QualityAssessor` for testing.
///
/// Answers every capability with configurable values and counts calls. Can
/// be made to fail permanently, or to fail a number of times before
/// answering.
pub struct MockAssessor {
    quality: Arc<QualityFn>,
    faces: Vec<FaceQuality>,
    blur: f32,
    similarity: f32,
    error: Option<BackendError>,
    transient_failures: AtomicUsize,
    delay: Option<Duration>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl MockAssessor {
    /// Creates a mock answering quality 0.8, no faces, a sharp blur score
    /// and similarity 0.9.
    #[must_use]
    pub fn new() -> Self {
        Self {
            quality: Arc::new(|_: &Path| Ok(uniform_score(0.8))),
            faces: Vec::new(),
            blur: 250.0,
            similarity: 0.9,
            error: None,
            transient_failures: AtomicUsize::new(0),
            delay: None,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Answers every quality call with `overall`.
    #[must_use]
    pub fn with_quality(mut self, overall: f32) -> Self {
        self.quality = Arc::new(move |_: &Path| Ok(uniform_score(overall)));
        self
    }

    /// Answers quality calls from a function of the image path.
    #[must_use]
    pub fn with_quality_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(&Path) -> Result<AiScore, BackendError> + Send + Sync + 'static,
    {
        self.quality = Arc::new(f);
        self
    }

    /// Reports one face per entry.
    #[must_use]
    pub fn with_faces(mut self, faces: Vec<FaceQuality>) -> Self {
        self.faces = faces;
        self
    }

    /// Reports this blur variance.
    #[must_use]
    pub const fn with_blur(mut self, score: f32) -> Self {
        self.blur = score;
        self
    }

    /// Reports this similarity for every pair.
    #[must_use]
    pub const fn with_similarity(mut self, score: f32) -> Self {
        self.similarity = score;
        self
    }

    /// Fails every call with `error`.
    #[must_use]
    pub fn failing(mut self, error: BackendError) -> Self {
        self.error = Some(error);
        self
    }

    /// Fails the next `count` calls with a connection error.
    #[must_use]
    pub fn flaky(self, count: usize) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Sleeps before answering.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls made to one capability.
    #[must_use]
    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    /// Number of calls made to any capability.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .sum()
    }

    async fn enter(&self, operation: &'static str) -> Result<(), BackendError> {
        *self
            .calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(operation)
            .or_insert(0) += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        let failed = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(BackendError::Connection("mock connection reset".to_string()));
        }
        Ok(())
    }
}

impl Default for MockAssessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QualityAssessor for MockAssessor {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn assess_quality(&self, image: &Path) -> Result<AiScore, BackendError> {
        self.enter("assess_quality").await?;
        (self.quality)(image)
    }

    async fn detect_faces(&self, _image: &Path) -> Result<Vec<FaceDetection>, BackendError> {
        self.enter("detect_faces").await?;
        Ok(self
            .faces
            .iter()
            .map(|&quality| FaceDetection {
                bbox: BoundingBox {
                    x: 0.4,
                    y: 0.3,
                    width: 0.1,
                    height: 0.15,
                },
                confidence: 0.95,
                quality,
            })
            .collect())
    }

    async fn detect_blur(&self, _image: &Path) -> Result<BlurMeasurement, BackendError> {
        self.enter("detect_blur").await?;
        Ok(BlurMeasurement {
            score: self.blur,
            is_blurry: self.blur < 100.0,
        })
    }

    async fn compare_similarity(&self, _a: &Path, _b: &Path) -> Result<f32, BackendError> {
        self.enter("compare_similarity").await?;
        Ok(self.similarity)
    }
}

/// An `AiScore` with every component set to `value`.
#[must_use]
pub const fn uniform_score(value: f32) -> AiScore {
    AiScore {
        aesthetic: value,
        technical: value,
        overall: value,
    }
}

/// Mock implementation of `Catalog` for testing.
///
/// Stores metadata in memory and records every write.
#[derive(Default)]
pub struct MockCatalog {
    values: Mutex<HashMap<(ItemId, String), MetadataValue>>,
    writes: Mutex<Vec<(ItemId, String, MetadataValue)>>,
    fail_writes: AtomicBool,
}

impl MockCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding the metadata of `items`.
    #[must_use]
    pub fn with_items(items: &[PhotoItem]) -> Self {
        let catalog = Self::new();
        for item in items {
            catalog.insert_item(item);
        }
        catalog
    }

    /// Stores every known field of `item` under the catalog keys.
    pub fn insert_item(&self, item: &PhotoItem) {
        let id = &item.id;
        self.insert(id, keys::WIDTH, MetadataValue::Integer(item.width.into()));
        self.insert(id, keys::HEIGHT, MetadataValue::Integer(item.height.into()));
        self.insert(id, keys::FILE_FORMAT, MetadataValue::Text(item.file_format.clone()));
        self.insert(
            id,
            keys::FILE_SIZE,
            MetadataValue::Integer(i64::try_from(item.file_size).unwrap_or(i64::MAX)),
        );
        if let Some(t) = item.capture_time {
            self.insert(id, keys::CAPTURE_TIME, MetadataValue::Timestamp(t));
        }
        if let Some(iso) = item.iso {
            self.insert(id, keys::ISO, MetadataValue::Integer(iso.into()));
        }
        if let Some(aperture) = item.aperture {
            self.insert(id, keys::APERTURE, MetadataValue::Number(aperture.into()));
        }
        if let Some(focal) = item.focal_length {
            self.insert(id, keys::FOCAL_LENGTH, MetadataValue::Number(focal.into()));
        }
        if let Some(histogram) = &item.histogram {
            self.insert(id, keys::HISTOGRAM, MetadataValue::Buckets(histogram.clone()));
        }
        if let Some(path) = &item.source {
            self.insert(id, keys::PATH, MetadataValue::Text(path.display().to_string()));
        }
    }

    /// Stores one value.
    pub fn insert(&self, id: &ItemId, key: &str, value: MetadataValue) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((id.clone(), key.to_string()), value);
    }

    /// Makes every subsequent write fail.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// All writes made through `set_metadata`, in order.
    #[must_use]
    pub fn writes(&self) -> Vec<(ItemId, String, MetadataValue)> {
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Catalog for MockCatalog {
    fn get_metadata(&self, id: &ItemId, key: &str) -> Option<MetadataValue> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(id.clone(), key.to_string()))
            .cloned()
    }

    fn set_metadata(&self, id: &ItemId, key: &str, value: MetadataValue) -> anyhow::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            anyhow::bail!("catalog is read-only");
        }
        self.writes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id.clone(), key.to_string(), value.clone()));
        self.insert(id, key, value);
        Ok(())
    }
}

/// Mock implementation of `ProgressCallback` for testing.
///
/// Records updates; clones share the same record. Can ask the batch to stop
/// once a number of items have been processed.
#[derive(Clone, Default)]
pub struct MockProgress {
    updates: Arc<Mutex<Vec<ProgressUpdate>>>,
    stop_after: Option<usize>,
}

impl MockProgress {
    /// Creates a recorder that never stops the batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recorder that returns `false` once at least `count` items
    /// have been processed.
    #[must_use]
    pub fn stop_after_processed(count: usize) -> Self {
        Self {
            stop_after: Some(count),
            ..Self::default()
        }
    }

    /// All recorded updates.
    #[must_use]
    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Phases seen, in order, without repeats.
    #[must_use]
    pub fn phases(&self) -> Vec<Phase> {
        let mut phases: Vec<Phase> = Vec::new();
        for update in self.updates() {
            if phases.last() != Some(&update.phase) {
                phases.push(update.phase);
            }
        }
        phases
    }
}

impl ProgressCallback for MockProgress {
    fn on_progress(&self, update: &ProgressUpdate) -> bool {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(update.clone());
        match self.stop_after {
            Some(count) => update.phase != Phase::Processing || update.current < count,
            None => true,
        }
    }
}

/// Mock implementation of `ResultOutput` for testing.
///
/// Captures results for later assertions.
#[derive(Default)]
pub struct MockResultOutput {
    results: Mutex<Vec<BatchResults>>,
    flush_count: AtomicUsize,
}

impl MockResultOutput {
    /// Creates a new mock output.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all captured results.
    #[must_use]
    pub fn results(&self) -> Vec<BatchResults> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of times `flush()` was called.
    #[must_use]
    pub fn flush_count(&self) -> usize {
        self.flush_count.load(Ordering::SeqCst)
    }
}

impl ResultOutput for MockResultOutput {
    fn write(&self, results: &BatchResults) -> anyhow::Result<()> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(results.clone());
        Ok(())
    }

    fn flush(&self) -> anyhow::Result<()> {
        self.flush_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
