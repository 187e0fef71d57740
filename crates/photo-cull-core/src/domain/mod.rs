//! Core domain types for photo culling.

mod batch;
mod error;
mod group;
mod item;
mod score;

pub use batch::{BatchOptions, BatchState, BatchSummary, Phase};
pub use error::{BackendError, CullError, PreconditionError, ValidationError};
pub use group::Group;
pub use item::{ItemId, PhotoItem, RAW_FORMATS, RASTER_FORMATS};
pub use score::{
    AiScore, BoundingBox, CompositionScore, FaceDetection, FaceQuality, FaceSummary, ScoreResult,
    TechnicalScore,
};
