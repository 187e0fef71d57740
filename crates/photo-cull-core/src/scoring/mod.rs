//! Per-item scoring pipeline.
//!
//! [`Scorer`] runs the technical evaluator, calls the assessor (with retries
//! and a per-call timeout), aggregates the components and caches the result.

mod aggregator;
mod composition;
mod technical;

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub use aggregator::{aggregate, ScoreWeights, Verdict, FACE_PENALTY};
pub use composition::composition_score;
pub use technical::{TechnicalConfig, TechnicalEvaluator, MIN_DIMENSION};

use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::cache::ResultCache;
use crate::domain::{
    AiScore, BackendError, BatchOptions, CompositionScore, CullError, FaceSummary, PhotoItem,
    ScoreResult, TechnicalScore,
};
use crate::ports::QualityAssessor;
use crate::retry::RetryPolicy;

/// Default timeout applied to each assessor call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Scoring parameters that may change from batch to batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScorerConfig {
    /// Technical/aesthetic weights.
    pub weights: ScoreWeights,
    /// Pass threshold.
    pub threshold: f32,
    /// Blur variance at or above which an image counts as sharp.
    pub blur_threshold: f32,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self::from(&BatchOptions::default())
    }
}

impl From<&BatchOptions> for ScorerConfig {
    fn from(options: &BatchOptions) -> Self {
        Self {
            weights: ScoreWeights::new(options.technical_weight, options.aesthetic_weight),
            threshold: options.threshold,
            blur_threshold: options.blur_threshold,
        }
    }
}

/// Scores single items against an assessor, with a shared result cache.
pub struct Scorer {
    assessor: Arc<dyn QualityAssessor>,
    cache: Mutex<ResultCache>,
    retry: RetryPolicy,
    call_timeout: Duration,
    config: ScorerConfig,
}

impl Scorer {
    /// Creates a scorer with default cache size, retry policy and timeout.
    #[must_use]
    pub fn new(assessor: Arc<dyn QualityAssessor>) -> Self {
        Self {
            assessor,
            cache: Mutex::new(ResultCache::default()),
            retry: RetryPolicy::default(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
            config: ScorerConfig::default(),
        }
    }

    /// Replaces the cache with an empty one of the given size.
    #[must_use]
    pub fn with_cache_size(mut self, max_size: usize) -> Self {
        self.cache = Mutex::new(ResultCache::new(max_size));
        self
    }

    /// Sets the retry policy for assessor calls.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub const fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Sets the default scoring parameters used by [`Scorer::score`].
    #[must_use]
    pub const fn with_config(mut self, config: ScorerConfig) -> Self {
        self.config = config;
        self
    }

    /// Default scoring parameters.
    #[must_use]
    pub const fn config(&self) -> &ScorerConfig {
        &self.config
    }

    /// Name of the underlying assessor.
    #[must_use]
    pub fn assessor_name(&self) -> &'static str {
        self.assessor.name()
    }

    /// Number of cached results.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.with_cache(|cache| cache.len())
    }

    /// Empties the result cache.
    pub fn clear_cache(&self) {
        self.with_cache(ResultCache::clear);
    }

    /// Scores an item with the default parameters.
    pub async fn score(&self, item: &PhotoItem, force: bool) -> ScoreResult {
        let config = self.config;
        self.score_with(item, &config, force).await
    }

    /// Scores an item with explicit parameters.
    ///
    /// A cached result is returned unless `force` is set; with `force` the
    /// item is rescored and the cache entry overwritten. Backend failures
    /// degrade the result (see `ScoreResult::warnings`) except for rejected
    /// input, which fails the item.
    pub async fn score_with(
        &self,
        item: &PhotoItem,
        config: &ScorerConfig,
        force: bool,
    ) -> ScoreResult {
        if !force {
            if let Some(cached) = self.with_cache(|cache| cache.get(&item.id)) {
                debug!(item = %item.id, "Using cached result");
                return cached;
            }
        }

        let result = match self.compute(item, config).await {
            Ok(result) => result,
            Err(err) => {
                warn!(item = %item.id, error = %err, "Scoring failed");
                return ScoreResult::failed(item.id.clone(), err.to_string());
            }
        };

        self.with_cache(|cache| cache.put(item.id.clone(), result.clone()));
        result
    }

    /// Visual similarity of two images through the assessor.
    ///
    /// # Errors
    ///
    /// Returns the backend error after retries are exhausted.
    pub async fn compare(&self, a: &Path, b: &Path) -> Result<f32, BackendError> {
        self.call("compare_similarity", || self.assessor.compare_similarity(a, b))
            .await
            .map(|score| score.clamp(0.0, 1.0))
    }

    async fn compute(
        &self,
        item: &PhotoItem,
        config: &ScorerConfig,
    ) -> Result<ScoreResult, BackendError> {
        let evaluator = TechnicalEvaluator::with_blur_threshold(config.blur_threshold);
        let composition = composition_score(item.width, item.height);
        let mut warnings = Vec::new();

        if !TechnicalEvaluator::passes_gate(item) {
            debug!(item = %item.id, width = item.width, height = item.height, "Below minimum size");
            warnings.push(format!(
                "image smaller than {MIN_DIMENSION}x{MIN_DIMENSION}, technical score zeroed"
            ));
            let technical = evaluator.evaluate(item, None);
            let verdict = aggregate(
                &technical,
                None,
                &composition,
                None,
                config.weights,
                config.threshold,
            );
            return Ok(Self::build(
                item,
                technical,
                None,
                composition,
                None,
                verdict.overall,
                verdict.passed,
                warnings,
            ));
        }

        let (blur, ai, faces) = match item.source.as_deref() {
            Some(path) => {
                let blur = self.call("detect_blur", || self.assessor.detect_blur(path)).await;
                let blur = self.degrade(item, "blur measurement", blur, &mut warnings)?;

                let ai = self.call("assess_quality", || self.assessor.assess_quality(path)).await;
                let ai = self.degrade(item, "AI assessment", ai, &mut warnings)?;

                let faces = self.call("detect_faces", || self.assessor.detect_faces(path)).await;
                let faces = self
                    .degrade(item, "face detection", faces, &mut warnings)?
                    .map(|detections| FaceSummary::from_detections(&detections));

                (blur, ai, faces)
            }
            None => {
                warnings.push("no image source, AI assessment skipped".to_string());
                (None, None, None)
            }
        };

        let technical = evaluator.evaluate(item, blur.as_ref());
        let verdict = aggregate(
            &technical,
            ai.as_ref(),
            &composition,
            faces.as_ref(),
            config.weights,
            config.threshold,
        );

        debug!(
            item = %item.id,
            overall = verdict.overall,
            passed = verdict.passed,
            ai = ai.is_some(),
            "Scored item"
        );

        Ok(Self::build(
            item,
            technical,
            ai,
            composition,
            faces,
            verdict.overall,
            verdict.passed,
            warnings,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        item: &PhotoItem,
        technical: TechnicalScore,
        ai: Option<AiScore>,
        composition: CompositionScore,
        faces: Option<FaceSummary>,
        overall: f32,
        passed: bool,
        warnings: Vec<String>,
    ) -> ScoreResult {
        ScoreResult {
            item_id: item.id.clone(),
            valid: true,
            error: None,
            technical: Some(technical),
            ai,
            composition: Some(composition),
            faces,
            overall,
            passed,
            timestamp: OffsetDateTime::now_utc(),
            group_id: None,
            is_group_best: false,
            warnings,
        }
    }

    /// Turns a failed capability into `None` plus a warning. Rejected input
    /// is passed through as an error.
    fn degrade<T>(
        &self,
        item: &PhotoItem,
        what: &str,
        outcome: Result<T, BackendError>,
        warnings: &mut Vec<String>,
    ) -> Result<Option<T>, BackendError> {
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(err @ BackendError::InvalidInput(_)) => Err(err),
            Err(err) => {
                debug!(
                    item = %item.id,
                    assessor = self.assessor.name(),
                    error = %err,
                    "{what} unavailable"
                );
                warnings.push(format!("{what} unavailable: {err}"));
                Ok(None)
            }
        }
    }

    /// One assessor call with retries and a timeout per attempt.
    async fn call<T, F, Fut>(&self, operation: &'static str, call: F) -> Result<T, BackendError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let timeout = self.call_timeout;
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.retry
            .run(operation, || {
                let attempt = call();
                async move {
                    tokio::time::timeout(timeout, attempt)
                        .await
                        .unwrap_or(Err(BackendError::Timeout(timeout_ms)))
                }
            })
            .await
    }

    fn with_cache<R>(&self, f: impl FnOnce(&mut ResultCache) -> R) -> R {
        let mut guard = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                let err = CullError::Resource("result cache lock poisoned".to_string());
                warn!(error = %err, "Clearing result cache");
                self.cache.clear_poison();
                let mut guard = poisoned.into_inner();
                guard.clear();
                guard
            }
        };
        f(&mut guard)
    }
}

impl std::fmt::Debug for Scorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scorer")
            .field("assessor", &self.assessor.name())
            .field("retry", &self.retry)
            .field("call_timeout", &self.call_timeout)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
