//! Configuration file support for photo-cull.
//!
//! Supports TOML configuration from:
//! - XDG config: `~/.config/photo-cull/config.toml` (lowest priority)
//! - Project-local: `.photo-cull.toml` (searched up directory tree)
//! - CLI flags (highest priority, applied separately)

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info, warn};

/// File name of the project-local config.
pub const PROJECT_CONFIG: &str = ".photo-cull.toml";

/// Top-level configuration structure.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General options.
    pub general: GeneralConfig,
    /// Score blending and pass threshold.
    pub scoring: ScoringConfig,
    /// Similarity grouping.
    pub grouping: GroupingConfig,
    /// Batch execution.
    pub batch: BatchConfig,
    /// Remote scoring service.
    pub backend: BackendConfig,
    /// Catalog write-back.
    pub catalog: CatalogConfig,
    /// Output formatting settings.
    pub output: OutputConfig,
}

/// General configuration options.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Recurse into subdirectories by default.
    pub recursive: Option<bool>,
}

/// Scoring configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Pass threshold (0.0-1.0).
    pub threshold: Option<f32>,
    /// Weight of the technical component.
    pub technical_weight: Option<f32>,
    /// Weight of the aesthetic component.
    pub aesthetic_weight: Option<f32>,
    /// Laplacian variance at which an image counts as sharp.
    pub blur_threshold: Option<f32>,
}

/// Grouping configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct GroupingConfig {
    /// Enable/disable the grouping phase.
    pub enabled: Option<bool>,
    /// Similarity needed to join a group (0.0-1.0).
    pub similarity_threshold: Option<f32>,
    /// Confirm groups with the backend's visual comparison.
    pub visual_check: Option<bool>,
}

/// Batch execution configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Items per processing chunk.
    pub batch_size: Option<usize>,
    /// Pause between chunks in milliseconds.
    pub chunk_pause_ms: Option<u64>,
    /// Result cache capacity.
    pub cache_size: Option<usize>,
}

/// Remote scoring service configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Enable/disable the remote service.
    pub enabled: Option<bool>,
    /// Base URL of the service.
    pub url: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Attempts per call, including the first.
    pub max_attempts: Option<u32>,
    /// Delay before the first retry in milliseconds.
    pub initial_backoff_ms: Option<u64>,
}

/// Catalog write-back configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Write a star rating for passed items.
    pub auto_rate: Option<bool>,
    /// Write a color label for passed items.
    pub auto_label: Option<bool>,
    /// Label used by `auto_label`.
    pub passed_label: Option<String>,
}

/// Output formatting configuration.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output format: "csv" or "json".
    pub format: Option<String>,
    /// Pretty-print JSON output.
    pub pretty: Option<bool>,
    /// Show progress bar.
    pub progress: Option<bool>,
}

impl AppConfig {
    /// Load configuration from XDG and project-local files.
    ///
    /// Priority (lowest to highest):
    /// 1. XDG config: `~/.config/photo-cull/config.toml`
    /// 2. Project-local: `.photo-cull.toml` (searched up from cwd)
    ///
    /// Missing files are silently ignored. Invalid values are logged as warnings.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(xdg_path) = xdg_config_path() {
            if xdg_path.exists() {
                info!("Loading XDG config: {}", xdg_path.display());
                if let Some(xdg_config) = load_file(&xdg_path) {
                    config = xdg_config;
                }
            } else {
                debug!("XDG config not found: {}", xdg_path.display());
            }
        }

        if let Some(project_path) = find_project_config() {
            info!("Loading project config: {}", project_path.display());
            if let Some(project_config) = load_file(&project_path) {
                config.merge(project_config);
            }
        }

        for warning in config.sanitize() {
            eprintln!("warning: {warning}");
        }

        config
    }

    /// Drops values outside their acceptable range.
    ///
    /// Each dropped value falls back to its default and is reported in the
    /// returned list of warnings.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut check = |name: &str, ok: bool, shown: String| {
            if !ok {
                warnings.push(format!("{name} {shown}, using default"));
            }
            ok
        };

        let unit = |v: f32| (0.0..=1.0).contains(&v);
        let positive = |v: f32| v.is_finite() && v > 0.0;

        self.scoring.threshold = self.scoring.threshold.filter(|&v| {
            check("scoring.threshold", unit(v), format!("must be 0.0-1.0, got {v}"))
        });
        self.grouping.similarity_threshold = self.grouping.similarity_threshold.filter(|&v| {
            check(
                "grouping.similarity_threshold",
                unit(v),
                format!("must be 0.0-1.0, got {v}"),
            )
        });
        self.scoring.technical_weight = self.scoring.technical_weight.filter(|&v| {
            check(
                "scoring.technical_weight",
                positive(v),
                format!("must be a positive number, got {v}"),
            )
        });
        self.scoring.aesthetic_weight = self.scoring.aesthetic_weight.filter(|&v| {
            check(
                "scoring.aesthetic_weight",
                positive(v),
                format!("must be a positive number, got {v}"),
            )
        });
        self.scoring.blur_threshold = self.scoring.blur_threshold.filter(|&v| {
            check(
                "scoring.blur_threshold",
                v.is_finite() && v >= 0.0,
                format!("must be non-negative, got {v}"),
            )
        });
        self.batch.batch_size = self.batch.batch_size.filter(|&v| {
            check("batch.batch_size", v > 0, "must be at least 1".to_string())
        });
        self.backend.max_attempts = self.backend.max_attempts.filter(|&v| {
            check("backend.max_attempts", v > 0, "must be at least 1".to_string())
        });
        self.backend.timeout_secs = self.backend.timeout_secs.filter(|&v| {
            check("backend.timeout_secs", v > 0, "must be at least 1".to_string())
        });
        self.output.format = self.output.format.take().filter(|f| {
            check(
                "output.format",
                f == "csv" || f == "json",
                format!("must be 'csv' or 'json', got '{f}'"),
            )
        });

        warnings
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` when present.
    fn merge(&mut self, other: Self) {
        // General
        self.general.recursive = other.general.recursive.or(self.general.recursive);

        // Scoring
        self.scoring.threshold = other.scoring.threshold.or(self.scoring.threshold);
        self.scoring.technical_weight = other
            .scoring
            .technical_weight
            .or(self.scoring.technical_weight);
        self.scoring.aesthetic_weight = other
            .scoring
            .aesthetic_weight
            .or(self.scoring.aesthetic_weight);
        self.scoring.blur_threshold = other.scoring.blur_threshold.or(self.scoring.blur_threshold);

        // Grouping
        self.grouping.enabled = other.grouping.enabled.or(self.grouping.enabled);
        self.grouping.similarity_threshold = other
            .grouping
            .similarity_threshold
            .or(self.grouping.similarity_threshold);
        self.grouping.visual_check = other.grouping.visual_check.or(self.grouping.visual_check);

        // Batch
        self.batch.batch_size = other.batch.batch_size.or(self.batch.batch_size);
        self.batch.chunk_pause_ms = other.batch.chunk_pause_ms.or(self.batch.chunk_pause_ms);
        self.batch.cache_size = other.batch.cache_size.or(self.batch.cache_size);

        // Backend
        self.backend.enabled = other.backend.enabled.or(self.backend.enabled);
        self.backend.url = other.backend.url.or_else(|| self.backend.url.take());
        self.backend.timeout_secs = other.backend.timeout_secs.or(self.backend.timeout_secs);
        self.backend.max_attempts = other.backend.max_attempts.or(self.backend.max_attempts);
        self.backend.initial_backoff_ms = other
            .backend
            .initial_backoff_ms
            .or(self.backend.initial_backoff_ms);

        // Catalog
        self.catalog.auto_rate = other.catalog.auto_rate.or(self.catalog.auto_rate);
        self.catalog.auto_label = other.catalog.auto_label.or(self.catalog.auto_label);
        self.catalog.passed_label = other
            .catalog
            .passed_label
            .or_else(|| self.catalog.passed_label.take());

        // Output
        self.output.format = other.output.format.or_else(|| self.output.format.take());
        self.output.pretty = other.output.pretty.or(self.output.pretty);
        self.output.progress = other.output.progress.or(self.output.progress);
    }
}

/// Get the XDG config file path.
fn xdg_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("photo-cull").join("config.toml"))
}

/// Find project-local config by searching up from current directory.
fn find_project_config() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    find_config_in_parents(&cwd)
}

/// Search for `.photo-cull.toml` in the given directory and its parents.
fn find_config_in_parents(start: &Path) -> Option<PathBuf> {
    let mut current = Some(start);

    while let Some(dir) = current {
        let config_path = dir.join(PROJECT_CONFIG);
        if config_path.exists() {
            return Some(config_path);
        }
        current = dir.parent();
    }

    None
}

/// Load and parse a TOML config file.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return None;
        }
    };

    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!("Failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}
