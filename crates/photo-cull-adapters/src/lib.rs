//! Photo Cull Adapters - External adapters for photo-cull.
//!
//! This crate provides adapters for:
//! - Filesystem catalog (scan, EXIF, histogram, sidecar write-back)
//! - HTTP scoring service client
//! - Local blur-only assessor
//! - CSV and JSON export

pub mod export;
pub mod fs;
pub mod http;
pub mod local;

pub use export::{CsvOutput, JsonOutput};
pub use fs::FsCatalog;
pub use http::HttpAssessor;
pub use local::LocalAssessor;
