//! Port definitions for hexagonal architecture.
//!
//! These traits define the boundaries between the domain core and external adapters.

mod assessor;
mod catalog;
mod progress;
mod result_output;

pub use assessor::{BlurMeasurement, QualityAssessor};
pub use catalog::{keys, Catalog, MetadataValue};
pub use progress::{ProgressCallback, ProgressUpdate};
pub use result_output::ResultOutput;
