//! Test support utilities for photo-cull.
//!
//! Provides mocks of the core ports, photo item fixtures and synthetic image
//! builders for testing the scoring pipeline.
//!
//! # Example
//!
//! ```
//! use photo_cull_test_support::{MockAssessor, PhotoItemBuilder};
//!
//! let item = PhotoItemBuilder::new("IMG_0001").format("NEF").build();
//! let assessor = MockAssessor::new().with_quality(0.9);
//! # let _ = (item, assessor);
//! ```

mod builders;
mod mocks;

pub use builders::{
    burst_series, flat_histogram, wedding_set, PhotoItemBuilder, SyntheticImageBuilder, SHOOT_START,
};
pub use mocks::{uniform_score, MockAssessor, MockCatalog, MockProgress, MockResultOutput};
