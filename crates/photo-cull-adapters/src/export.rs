//! CSV and JSON exporters for batch results.

use std::io::{self, Write};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use photo_cull_core::{
    AiScore, BatchResults, BatchState, BatchSummary, CompositionScore, FaceSummary, Group, ItemId,
    ResultOutput, ScoreResult, TechnicalScore,
};
use serde::Serialize;
use time::OffsetDateTime;

/// CSV header row.
pub const CSV_HEADER: &str = "Photo,Overall Score,Technical,Aesthetic,Passed,Group";

type SharedWriter = Mutex<Box<dyn Write + Send>>;

fn lock(writer: &SharedWriter) -> Result<std::sync::MutexGuard<'_, Box<dyn Write + Send>>> {
    writer.lock().map_err(|e| anyhow!("Lock poisoned: {e}"))
}

/// CSV exporter.
///
/// Writes one row per valid, successfully scored item. Invalid and failed
/// items are left out; they are listed in the JSON export instead.
pub struct CsvOutput {
    writer: SharedWriter,
}

impl CsvOutput {
    /// Creates a CSV exporter writing to stdout.
    #[must_use]
    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Creates a CSV exporter writing to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

/// Renders the CSV document for a batch.
#[must_use]
pub fn render_csv(results: &BatchResults) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for result in results.results.iter().filter(|r| r.is_scored()) {
        let technical = result
            .technical
            .map_or_else(String::new, |t| format!("{:.3}", t.overall));
        let aesthetic = result
            .aesthetic()
            .map_or_else(String::new, |a| format!("{a:.3}"));
        let row = [
            csv_field(result.item_id.as_str()),
            format!("{:.3}", result.overall),
            technical,
            aesthetic,
            result.passed.to_string(),
            csv_field(result.group_id.as_deref().unwrap_or_default()),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Quotes a field if it contains a delimiter, quote or line break.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

impl ResultOutput for CsvOutput {
    #[allow(clippy::significant_drop_tightening)]
    fn write(&self, results: &BatchResults) -> Result<()> {
        let csv = render_csv(results);
        let mut writer = lock(&self.writer)?;
        writer.write_all(csv.as_bytes())?;
        Ok(())
    }

    #[allow(clippy::significant_drop_tightening)]
    fn flush(&self) -> Result<()> {
        let mut writer = lock(&self.writer)?;
        writer.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    state: BatchState,
    summary: &'a BatchSummary,
    photos: Vec<JsonPhoto<'a>>,
    groups: &'a [Group],
}

#[derive(Serialize)]
struct JsonPhoto<'a> {
    id: &'a ItemId,
    scores: JsonScores<'a>,
    #[serde(with = "time::serde::rfc3339")]
    timestamp: OffsetDateTime,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonScores<'a> {
    overall: f32,
    passed: bool,
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    technical: Option<&'a TechnicalScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ai: Option<&'a AiScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    composition: Option<&'a CompositionScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    faces: Option<&'a FaceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    group_id: Option<&'a str>,
    is_group_best: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "no_warnings")]
    warnings: &'a [String],
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn no_warnings(warnings: &&[String]) -> bool {
    warnings.is_empty()
}

impl<'a> From<&'a ScoreResult> for JsonPhoto<'a> {
    fn from(result: &'a ScoreResult) -> Self {
        Self {
            id: &result.item_id,
            scores: JsonScores {
                overall: result.overall,
                passed: result.passed,
                valid: result.valid,
                technical: result.technical.as_ref(),
                ai: result.ai.as_ref(),
                composition: result.composition.as_ref(),
                faces: result.faces.as_ref(),
                group_id: result.group_id.as_deref(),
                is_group_best: result.is_group_best,
                error: result.error.as_deref(),
                warnings: &result.warnings,
            },
            timestamp: result.timestamp,
        }
    }
}

/// JSON exporter.
///
/// Writes a single document `{state, summary, photos, groups}` with one
/// entry per result, including invalid and failed items.
pub struct JsonOutput {
    writer: SharedWriter,
    pretty: bool,
}

impl JsonOutput {
    /// Creates a JSON exporter writing to stdout.
    #[must_use]
    pub fn stdout(pretty: bool) -> Self {
        Self::new(Box::new(io::stdout()), pretty)
    }

    /// Creates a JSON exporter writing to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>, pretty: bool) -> Self {
        Self {
            writer: Mutex::new(writer),
            pretty,
        }
    }
}

/// Renders the JSON document for a batch.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn render_json(results: &BatchResults, pretty: bool) -> Result<String> {
    let report = JsonReport {
        state: results.state,
        summary: &results.summary,
        photos: results.results.iter().map(JsonPhoto::from).collect(),
        groups: &results.groups,
    };
    let json = if pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };
    Ok(json)
}

impl ResultOutput for JsonOutput {
    #[allow(clippy::significant_drop_tightening)]
    fn write(&self, results: &BatchResults) -> Result<()> {
        let json = render_json(results, self.pretty)?;
        let mut writer = lock(&self.writer)?;
        writeln!(writer, "{json}")?;
        Ok(())
    }

    #[allow(clippy::significant_drop_tightening)]
    fn flush(&self) -> Result<()> {
        let mut writer = lock(&self.writer)?;
        writer.flush()?;
        Ok(())
    }
}
