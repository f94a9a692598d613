// gate-engine/src/artifacts.rs
// ============================================================================
// Module: Gate Engine Artifact Shapes
// Description: Typed views over the JSON artifacts the adapters emit.
// Purpose: Give the Gate Engine structured reads without re-parsing ad hoc.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! One struct per artifact file named in spec.md §6's filesystem layout.
//! Every loader is tolerant of a missing file (`Ok(None)`); a malformed
//! file that does exist is a load error, since a sealed bundle with
//! unparsable JSON is itself evidence of a broken adapter run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading an artifact for evaluation.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// The artifact file exists but could not be parsed as JSON.
    #[error("malformed artifact at {path}: {source}")]
    Malformed {
        /// Path relative to the task directory.
        path: String,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Reads and parses `relative_path` under `task_dir`, returning `None` if
/// the file does not exist.
///
/// # Errors
///
/// Returns [`ArtifactError::Malformed`] if the file exists but is not
/// valid JSON for `T`.
pub fn load_optional<T: for<'de> Deserialize<'de>>(
    task_dir: &Path,
    relative_path: &str,
) -> Result<Option<T>, ArtifactError> {
    let full = task_dir.join(relative_path);
    let Ok(bytes) = fs::read(&full) else {
        return Ok(None);
    };
    serde_json::from_slice(&bytes).map(Some).map_err(|source| ArtifactError::Malformed {
        path: relative_path.to_string(),
        source,
    })
}

// ============================================================================
// SECTION: Code Artifacts
// ============================================================================

/// `diff.json` (spec.md §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffReport {
    /// Files with modified content.
    #[serde(default)]
    pub files_modified: Vec<String>,
    /// Newly created files.
    #[serde(default)]
    pub files_created: Vec<String>,
    /// Removed files.
    #[serde(default)]
    pub files_deleted: Vec<String>,
    /// Qualified function/method names touched.
    #[serde(default)]
    pub functions_modified: Vec<String>,
    /// Endpoint descriptors touched (`METHOD path`).
    #[serde(default)]
    pub endpoints_modified: Vec<String>,
    /// Sum of modified/created/deleted counts.
    #[serde(default)]
    pub total_changes: u64,
}

/// `lint.json` (spec.md §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintReport {
    /// Process exit code of the linter.
    #[serde(rename = "exitCode", default)]
    pub exit_code: i32,
    /// Number of lint errors.
    #[serde(default)]
    pub errors: u64,
    /// Number of lint warnings.
    #[serde(default)]
    pub warnings: u64,
    /// Number of files the linter examined.
    #[serde(default)]
    pub files_checked: u64,
    /// Individual lint findings, left as opaque JSON for downstream display.
    #[serde(default)]
    pub issues: Vec<serde_json::Value>,
}

/// `tests.json` (spec.md §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestsReport {
    /// Passed test count.
    #[serde(default)]
    pub passed: u64,
    /// Failed test count.
    #[serde(default)]
    pub failed: u64,
    /// Skipped test count.
    #[serde(default)]
    pub skipped: u64,
    /// Total test count (`0` when no framework ran).
    #[serde(default)]
    pub total: u64,
    /// Wall-clock duration of the test run.
    #[serde(default)]
    pub duration_ms: u64,
    /// Per-test detail, left opaque.
    #[serde(default)]
    pub details: Vec<serde_json::Value>,
    /// Human-readable summary for the no-framework edge case.
    #[serde(default)]
    pub summary: Option<String>,
}

/// `coverage.json` (spec.md §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoverageReport {
    /// Overall coverage percentage, normalized to `[0, 100]`.
    #[serde(default)]
    pub pct: f64,
    /// Line coverage percentage, if reported separately.
    #[serde(default)]
    pub lines: Option<f64>,
    /// Branch coverage percentage, if reported separately.
    #[serde(default)]
    pub branches: Option<f64>,
    /// Function coverage percentage, if reported separately.
    #[serde(default)]
    pub functions: Option<f64>,
    /// Statement coverage percentage, if reported separately.
    #[serde(default)]
    pub statements: Option<f64>,
    /// Path to the raw coverage report the adapter parsed.
    #[serde(default)]
    pub report_path: Option<String>,
}

/// Certainty of a `code:map-functions` correlation (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchCertainty {
    /// Exact or case-insensitive identifier match.
    Certain,
    /// Substring or Levenshtein-ratio match.
    Fuzzy,
}

/// A single claim-to-diff correlation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionMatch {
    /// The claimed unit identifier (`func:<name>` or `ep:<METHOD> <path>`).
    pub claimed: String,
    /// The diff entry it was matched to.
    pub matched: String,
    /// How confident the match is.
    pub certainty: MatchCertainty,
}

/// `function_map.json` (spec.md §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionMapReport {
    /// Claim-to-diff correlations, sorted by `claimed`.
    #[serde(default)]
    pub matches: Vec<FunctionMatch>,
    /// Claimed units with no resolvable match.
    #[serde(default)]
    pub unmatched_claims: Vec<String>,
    /// Diff functions/endpoints with no corresponding claim.
    #[serde(default)]
    pub unmatched_diffs: Vec<String>,
}

impl FunctionMapReport {
    /// Finds the match recorded for `claimed`, if any.
    #[must_use]
    pub fn match_for(&self, claimed: &str) -> Option<&FunctionMatch> {
        self.matches.iter().find(|entry| entry.claimed == claimed)
    }
}

// ============================================================================
// SECTION: Link Artifacts
// ============================================================================

/// `links/urlset.json`: the deduplicated, sorted discovery result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlSet {
    /// Discovered URLs.
    pub urls: Vec<String>,
}

/// `links/statuses.json`: raw status per URL (`200`, `"timeout"`, `"error"`).
pub type StatusMap = BTreeMap<String, serde_json::Value>;

/// `links/check.json` (spec.md §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkCheckReport {
    /// URLs probed.
    #[serde(default)]
    pub total_checked: u64,
    /// URLs classed as passing.
    #[serde(default)]
    pub passed: u64,
    /// URLs classed as failing.
    #[serde(default)]
    pub failed: u64,
    /// Per-class counters (`2xx`, `3xx`, `4xx`, `5xx`, `timeout`, `error`).
    #[serde(default)]
    pub summary: BTreeMap<String, u64>,
}

/// `links/resample.json` (spec.md §4.5).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResampleReport {
    /// URLs retried.
    #[serde(default)]
    pub total_resampled: u64,
    /// URLs that recovered to a passing status.
    #[serde(default)]
    pub recovered: u64,
    /// URLs that remained failure-class after every attempt.
    #[serde(default)]
    pub still_failed: Vec<String>,
    /// Per-attempt trace, left opaque.
    #[serde(default)]
    pub resample_attempts: Vec<serde_json::Value>,
}

/// Classifies a raw status value into spec.md §4.5's category taxonomy.
#[must_use]
pub fn classify_status(value: &serde_json::Value) -> &'static str {
    if let Some(code) = value.as_u64() {
        return match code {
            200..=299 => "2xx",
            300..=399 => "3xx",
            400..=499 => "4xx",
            500..=599 => "5xx",
            _ => "error",
        };
    }
    match value.as_str() {
        Some("timeout") => "timeout",
        _ => "error",
    }
}

/// Returns whether `category` counts as passing under `treat_3xx_as_pass`.
#[must_use]
pub fn is_passing_category(category: &str, treat_3xx_as_pass: bool) -> bool {
    category == "2xx" || (category == "3xx" && treat_3xx_as_pass)
}

// ============================================================================
// SECTION: API Artifacts
// ============================================================================

/// A single endpoint probe result inside `api/check.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEndpointResult {
    /// Endpoint URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// HTTP status code observed.
    pub status: u16,
    /// Round-trip latency in milliseconds.
    pub latency_ms: u64,
    /// Whether the response body matched the declared JSON Schema, if any
    /// was provided.
    #[serde(default)]
    pub schema_ok: Option<bool>,
    /// JSON Schema validation error messages, if `schema_ok == Some(false)`.
    #[serde(default)]
    pub schema_errors: Vec<String>,
}

impl ApiEndpointResult {
    /// Returns the unit identifier this result corresponds to
    /// (`ep:<METHOD> <path>`).
    #[must_use]
    pub fn unit_id(&self) -> gate_core::UnitId {
        gate_core::UnitId::endpoint(&self.method, &self.url)
    }
}

/// `api/check.json` (spec.md §4.6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiCheckReport {
    /// Endpoints probed.
    #[serde(default)]
    pub total_checked: u64,
    /// Endpoints classed as passing.
    #[serde(default)]
    pub passed: u64,
    /// Endpoints classed as failing.
    #[serde(default)]
    pub failed: u64,
    /// Per-endpoint detail.
    #[serde(default)]
    pub endpoints: Vec<ApiEndpointResult>,
}

// ============================================================================
// SECTION: Content Artifacts
// ============================================================================

/// A single scanned content file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentFileReport {
    /// Path relative to the target directory.
    pub path: String,
    /// Whitespace-delimited word count.
    pub word_count: u64,
    /// Heading-level histogram (`h1`, `h2`, ...), if Markdown/HTML.
    #[serde(default)]
    pub heading_counts: BTreeMap<String, u64>,
    /// Count of image references found.
    #[serde(default)]
    pub image_count: u64,
}

/// `content/scan.json` (spec.md §4.7).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentScanReport {
    /// One entry per scanned file.
    #[serde(default)]
    pub files: Vec<ContentFileReport>,
}

impl ContentScanReport {
    /// Finds the scan entry for `path`, if present.
    #[must_use]
    pub fn file(&self, path: &str) -> Option<&ContentFileReport> {
        self.files.iter().find(|entry| entry.path == path)
    }
}
