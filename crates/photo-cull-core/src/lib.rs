//! Photo Cull Core - Scoring, grouping and batch orchestration
//!
//! This crate contains the domain types, the ports consumed from the outside
//! world (AI backend, host catalog, progress reporting), the scoring pipeline,
//! the bounded result cache, the similarity grouper and the batch
//! orchestrator that drives them.

pub mod cache;
pub mod domain;
pub mod grouping;
pub mod orchestrator;
pub mod ports;
pub mod retry;
pub mod scoring;

pub use cache::ResultCache;
pub use domain::{
    AiScore, BackendError, BatchOptions, BatchState, BatchSummary, CompositionScore, CullError,
    FaceDetection, FaceQuality, FaceSummary, Group, ItemId, Phase, PhotoItem, PreconditionError,
    ScoreResult, TechnicalScore, ValidationError,
};
pub use grouping::{GroupCandidate, GroupingOutcome, SimilarityGrouper};
pub use orchestrator::{BatchHandle, BatchOrchestrator, BatchResults, OrchestratorConfig};
pub use ports::{
    BlurMeasurement, Catalog, MetadataValue, ProgressCallback, ProgressUpdate, QualityAssessor,
    ResultOutput,
};
pub use retry::RetryPolicy;
pub use scoring::{ScoreWeights, Scorer, ScorerConfig, TechnicalEvaluator};
