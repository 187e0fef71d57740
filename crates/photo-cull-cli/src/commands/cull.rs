//! Cull command - score, group and export a batch of photos.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use photo_cull_adapters::{CsvOutput, FsCatalog, HttpAssessor, JsonOutput, LocalAssessor};
use photo_cull_core::cache::DEFAULT_CACHE_SIZE;
use photo_cull_core::orchestrator::DEFAULT_CHUNK_PAUSE;
use photo_cull_core::scoring::DEFAULT_CALL_TIMEOUT;
use photo_cull_core::{
    BatchOptions, BatchOrchestrator, BatchResults, BatchState, OrchestratorConfig,
    QualityAssessor, ResultOutput, RetryPolicy, Scorer,
};
use tracing::{debug, info, warn};

use super::ExitCode;
use crate::config::AppConfig;
use crate::output::ProgressBar;

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One CSV row per scored photo
    #[default]
    Csv,
    /// Single JSON document with summary, photos and groups
    Json,
}

/// Parse and validate a value in 0.0..=1.0.
fn parse_unit(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("{value} is not in 0.0..=1.0"))
    }
}

/// Parse and validate a strictly positive weight.
fn parse_weight(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(format!("{value} must be greater than 0"))
    }
}

/// Parse and validate a non-negative blur variance.
fn parse_variance(s: &str) -> Result<f32, String> {
    let value: f32 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a valid number"))?;
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(format!("{value} must not be negative"))
    }
}

/// Parse and validate a chunk size.
fn parse_batch_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("batch size must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(_) => Err(format!("'{s}' is not a valid count")),
    }
}

/// Shared arguments for a cull run.
#[derive(Args, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct CullArgs {
    /// Files or directories to cull
    pub paths: Vec<PathBuf>,

    /// Recurse into subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Minimum overall score to pass (0.0-1.0)
    #[arg(long, value_parser = parse_unit)]
    pub threshold: Option<f32>,

    /// Weight of the technical score
    #[arg(long, value_parser = parse_weight)]
    pub technical_weight: Option<f32>,

    /// Weight of the aesthetic score
    #[arg(long, value_parser = parse_weight)]
    pub aesthetic_weight: Option<f32>,

    /// Similarity needed to group two photos (0.0-1.0)
    #[arg(long, value_parser = parse_unit)]
    pub similarity_threshold: Option<f32>,

    /// Laplacian variance at which a photo counts as sharp
    #[arg(long, value_parser = parse_variance)]
    pub blur_threshold: Option<f32>,

    /// Skip near-duplicate grouping
    #[arg(long)]
    pub no_grouping: bool,

    /// Confirm groups with the scoring service's visual comparison
    #[arg(long)]
    pub visual_check: bool,

    /// Write a star rating for passed photos
    #[arg(long)]
    pub auto_rate: bool,

    /// Write a color label for passed photos
    #[arg(long)]
    pub auto_label: bool,

    /// Color label written by --auto-label
    #[arg(long, value_name = "LABEL")]
    pub passed_label: Option<String>,

    /// Photos per processing chunk
    #[arg(long, value_parser = parse_batch_size)]
    pub batch_size: Option<usize>,

    /// Rescore photos even when a cached result exists
    #[arg(long)]
    pub force: bool,

    /// Base URL of the scoring service
    #[arg(long, value_name = "URL")]
    pub backend_url: Option<String>,

    /// Score locally without the scoring service
    #[arg(long)]
    pub no_ai: bool,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write results to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Pretty-print JSON output (only affects --format json)
    #[arg(long)]
    pub pretty: bool,

    /// Show progress bar
    #[arg(long)]
    pub progress: bool,

    /// Suppress progress output
    #[arg(short, long)]
    pub quiet: bool,

    /// Merged config (populated by `with_config`, not from CLI).
    #[arg(skip)]
    config: Option<AppConfig>,
}

impl CullArgs {
    /// Apply configuration file values, respecting CLI precedence.
    ///
    /// Layering priority (lowest to highest):
    /// 1. Hardcoded defaults (in accessor methods)
    /// 2. Config file values (XDG, then project-local)
    /// 3. CLI arguments (already set on self)
    ///
    /// For boolean flags: CLI flags always win. Config can enable/disable
    /// only when the CLI flag wasn't explicitly set.
    pub fn with_config(mut args: Self, config: &AppConfig) -> Self {
        if !args.recursive {
            args.recursive = config.general.recursive.unwrap_or(false);
        }

        // Scoring: CLI > config (accessor provides hardcoded fallback)
        args.threshold = args.threshold.or(config.scoring.threshold);
        args.technical_weight = args.technical_weight.or(config.scoring.technical_weight);
        args.aesthetic_weight = args.aesthetic_weight.or(config.scoring.aesthetic_weight);
        args.blur_threshold = args.blur_threshold.or(config.scoring.blur_threshold);

        // Grouping: --no-grouping wins, then config
        if !args.no_grouping {
            if let Some(enabled) = config.grouping.enabled {
                args.no_grouping = !enabled;
            }
        }
        args.similarity_threshold = args
            .similarity_threshold
            .or(config.grouping.similarity_threshold);
        if !args.visual_check {
            args.visual_check = config.grouping.visual_check.unwrap_or(false);
        }

        args.batch_size = args.batch_size.or(config.batch.batch_size);

        // Backend: --no-ai wins, then config
        if !args.no_ai {
            if let Some(enabled) = config.backend.enabled {
                args.no_ai = !enabled;
            }
        }
        if args.backend_url.is_none() {
            args.backend_url.clone_from(&config.backend.url);
        }

        // Catalog write-back
        if !args.auto_rate {
            args.auto_rate = config.catalog.auto_rate.unwrap_or(false);
        }
        if !args.auto_label {
            args.auto_label = config.catalog.auto_label.unwrap_or(false);
        }
        if args.passed_label.is_none() {
            args.passed_label.clone_from(&config.catalog.passed_label);
        }

        // Output format: CLI > config (accessor provides fallback)
        if args.format.is_none() {
            args.format = config
                .output
                .format
                .as_ref()
                .and_then(|s| match s.as_str() {
                    "csv" => Some(OutputFormat::Csv),
                    "json" => Some(OutputFormat::Json),
                    _ => None,
                });
        }
        if !args.pretty {
            args.pretty = config.output.pretty.unwrap_or(false);
        }
        if !args.progress {
            args.progress = config.output.progress.unwrap_or(false);
        }

        // Store config for the batch and backend settings that have no flag
        args.config = Some(config.clone());

        args
    }

    /// Batch options with fallback to the hardcoded defaults.
    #[must_use]
    pub fn batch_options(&self) -> BatchOptions {
        let defaults = BatchOptions::default();
        BatchOptions {
            threshold: self.threshold.unwrap_or(defaults.threshold),
            technical_weight: self.technical_weight.unwrap_or(defaults.technical_weight),
            aesthetic_weight: self.aesthetic_weight.unwrap_or(defaults.aesthetic_weight),
            similarity_threshold: self
                .similarity_threshold
                .unwrap_or(defaults.similarity_threshold),
            blur_threshold: self.blur_threshold.unwrap_or(defaults.blur_threshold),
            enable_grouping: !self.no_grouping,
            visual_check: self.visual_check,
            auto_rate: self.auto_rate,
            auto_label: self.auto_label,
            passed_label: self
                .passed_label
                .clone()
                .unwrap_or(defaults.passed_label),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            force: self.force,
        }
    }

    /// Get output format with fallback to CSV.
    fn format(&self) -> OutputFormat {
        self.format.unwrap_or_default()
    }

    /// Scoring service URL, unless local scoring was requested.
    fn backend_url(&self) -> Option<&str> {
        if self.no_ai {
            None
        } else {
            self.backend_url.as_deref()
        }
    }

    fn backend_timeout(&self) -> Duration {
        self.config
            .as_ref()
            .and_then(|c| c.backend.timeout_secs)
            .map_or(DEFAULT_CALL_TIMEOUT, Duration::from_secs)
    }

    fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        let backend = self.config.as_ref().map(|c| &c.backend);
        RetryPolicy {
            max_attempts: backend
                .and_then(|b| b.max_attempts)
                .unwrap_or(defaults.max_attempts),
            initial_delay: backend
                .and_then(|b| b.initial_backoff_ms)
                .map_or(defaults.initial_delay, Duration::from_millis),
            ..defaults
        }
    }

    fn orchestrator_config(&self) -> OrchestratorConfig {
        let chunk_pause = self
            .config
            .as_ref()
            .and_then(|c| c.batch.chunk_pause_ms)
            .map_or(DEFAULT_CHUNK_PAUSE, Duration::from_millis);
        OrchestratorConfig { chunk_pause }
    }

    fn cache_size(&self) -> usize {
        self.config
            .as_ref()
            .and_then(|c| c.batch.cache_size)
            .unwrap_or(DEFAULT_CACHE_SIZE)
    }
}

/// Result of running the cull command.
#[allow(dead_code)] // Fields exposed for programmatic use
pub struct CullResult {
    /// Final batch results.
    pub results: BatchResults,
    /// Exit code.
    pub exit_code: ExitCode,
}

/// Run the cull command.
///
/// Expects `args` to have been processed through `with_config()` first
/// to apply configuration file settings.
pub fn run(args: &CullArgs) -> Result<CullResult> {
    info!("Running cull command on {} paths", args.paths.len());

    if args.paths.is_empty() {
        anyhow::bail!("No paths specified");
    }

    let options = args.batch_options();
    options.validate().context("Invalid options")?;

    let catalog = Arc::new(FsCatalog::scan(&args.paths, args.recursive));
    debug!("Scanned {} files", catalog.len());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let show_progress = !args.quiet && (args.progress || std::io::stderr().is_terminal());
    let progress = ProgressBar::new(args.quiet, show_progress);

    let results = runtime.block_on(run_batch(args, options, catalog, progress.clone()))?;

    let output = build_output(args)?;
    output.write(&results)?;
    output.flush()?;

    let exit_code = exit_code(&results);
    let outcome = match results.state {
        BatchState::Cancelled => "Cancelled",
        BatchState::Error => "Failed",
        _ => "Done",
    };
    progress.finish(&results.summary, outcome);

    Ok(CullResult { results, exit_code })
}

/// Runs the batch on the current runtime, cancelling it on Ctrl-C.
async fn run_batch(
    args: &CullArgs,
    options: BatchOptions,
    catalog: Arc<FsCatalog>,
    progress: ProgressBar,
) -> Result<BatchResults> {
    let assessor = build_assessor(args, &options)?;
    let scorer = Scorer::new(assessor)
        .with_cache_size(args.cache_size())
        .with_retry(args.retry_policy())
        .with_call_timeout(args.backend_timeout());

    let items = catalog.items();
    let orchestrator = BatchOrchestrator::new(Arc::new(scorer), args.orchestrator_config())
        .with_catalog(catalog);
    let handle = orchestrator.start_batch(items, options, progress)?;

    let results = tokio::select! {
        results = orchestrator.results(&handle) => results?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, cancelling batch");
            orchestrator.cancel(&handle)?;
            orchestrator.results(&handle).await?
        }
    };
    Ok(results)
}

/// Picks the scoring service client, or the local assessor.
fn build_assessor(args: &CullArgs, options: &BatchOptions) -> Result<Arc<dyn QualityAssessor>> {
    if let Some(url) = args.backend_url() {
        info!("Using scoring service at {url}");
        let assessor = HttpAssessor::with_timeout(url, args.backend_timeout())?;
        return Ok(Arc::new(assessor));
    }

    info!("Scoring locally; AI quality and face checks disabled");
    Ok(Arc::new(
        LocalAssessor::new().with_blur_threshold(options.blur_threshold),
    ))
}

fn build_output(args: &CullArgs) -> Result<Box<dyn ResultOutput>> {
    let writer: Box<dyn std::io::Write + Send> = match &args.output {
        Some(path) => Box::new(
            std::fs::File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path.display()))?,
        ),
        None => Box::new(std::io::stdout()),
    };

    let output: Box<dyn ResultOutput> = match args.format() {
        OutputFormat::Csv => Box::new(CsvOutput::new(writer)),
        OutputFormat::Json => Box::new(JsonOutput::new(writer, args.pretty)),
    };
    Ok(output)
}

/// Maps the final batch state to a process exit code.
fn exit_code(results: &BatchResults) -> ExitCode {
    match results.state {
        BatchState::Cancelled => ExitCode::Cancelled,
        BatchState::Error => ExitCode::Error,
        _ if results.summary.failed > 0 => ExitCode::Rejected,
        _ => ExitCode::Success,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;
    use photo_cull_core::BatchSummary;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: CullArgs,
    }

    fn parse(argv: &[&str]) -> CullArgs {
        TestCli::parse_from(std::iter::once("photo-cull").chain(argv.iter().copied())).args
    }

    fn results(state: BatchState, failed: usize) -> BatchResults {
        BatchResults {
            state,
            results: Vec::new(),
            groups: Vec::new(),
            summary: BatchSummary {
                total: 3,
                processed: 3,
                passed: 3 - failed,
                failed,
                grouped: 0,
                errors: 0,
            },
        }
    }

    #[test]
    fn test_parsers() {
        assert_eq!(parse_unit("0.5"), Ok(0.5));
        assert!(parse_unit("1.5").is_err());
        assert!(parse_weight("0").is_err());
        assert!(parse_variance("-1").is_err());
        assert_eq!(parse_batch_size("20"), Ok(20));
        assert!(parse_batch_size("0").is_err());
    }

    #[test]
    fn test_defaults_match_batch_options() {
        let args = CullArgs::with_config(parse(&["shoot/"]), &AppConfig::default());
        assert_eq!(args.batch_options(), BatchOptions::default());
        assert_eq!(args.format(), OutputFormat::Csv);
        assert!(args.backend_url().is_none());
        assert_eq!(args.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_cli_overrides_config() {
        let config: AppConfig = toml::from_str(
            r#"
[scoring]
threshold = 0.5
aesthetic_weight = 0.9

[grouping]
enabled = false

[backend]
url = "http://config:8000"
max_attempts = 5
initial_backoff_ms = 100

[output]
format = "json"
"#,
        )
        .unwrap();
        let args = CullArgs::with_config(
            parse(&["--threshold", "0.7", "--format", "csv", "--no-ai", "shoot/"]),
            &config,
        );

        let options = args.batch_options();
        assert!((options.threshold - 0.7).abs() < f32::EPSILON);
        assert!((options.aesthetic_weight - 0.9).abs() < f32::EPSILON);
        assert!(!options.enable_grouping);
        assert_eq!(args.format(), OutputFormat::Csv);
        assert!(args.backend_url().is_none());
        assert_eq!(args.retry_policy().max_attempts, 5);
        assert_eq!(args.retry_policy().initial_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_backend_disabled_in_config() {
        let config: AppConfig =
            toml::from_str("[backend]\nenabled = false\nurl = \"http://x:1\"").unwrap();
        let args = CullArgs::with_config(parse(&["shoot/"]), &config);
        assert!(args.no_ai);
        assert!(args.backend_url().is_none());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&results(BatchState::Completed, 0)), ExitCode::Success);
        assert_eq!(exit_code(&results(BatchState::Completed, 1)), ExitCode::Rejected);
        assert_eq!(exit_code(&results(BatchState::Cancelled, 0)), ExitCode::Cancelled);
        assert_eq!(exit_code(&results(BatchState::Error, 0)), ExitCode::Error);
    }
}
