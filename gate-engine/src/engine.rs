// gate-engine/src/engine.rs
// ============================================================================
// Module: Gate Engine
// Description: Pure, deterministic bundle+Claim+Profile -> Verdict evaluator.
// Purpose: Implement the evaluation order from spec.md §4.8.
// Dependencies: crate::artifacts, gate-core
// ============================================================================

//! ## Overview
//! [`GateEngine::evaluate`] is CPU-bound and suspends on nothing: every
//! artifact it needs is read up front from a sealed bundle. It never
//! contacts the network or a subprocess, and its only time-dependent
//! output is the `timestamp` field it stamps on the way out (spec.md §4.8,
//! §5 "the Gate Engine is purely CPU-bound and never suspends on I/O").

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use gate_core::ArtifactStore;
use gate_core::Claim;
use gate_core::Commitment;
use gate_core::FunctionCertainty;
use gate_core::Profile;
use gate_core::ReasonCode;
use gate_core::StoreError;
use gate_core::TaskType;
use gate_core::Timestamp;
use gate_core::Unit;
use gate_core::UnitId;
use gate_core::UnitType;
use gate_core::Verdict;
use gate_core::VerdictPolicy;
use gate_core::VerdictStatus;

use crate::artifacts::ApiCheckReport;
use crate::artifacts::ArtifactError;
use crate::artifacts::ContentScanReport;
use crate::artifacts::CoverageReport;
use crate::artifacts::FunctionMapReport;
use crate::artifacts::LinkCheckReport;
use crate::artifacts::LintReport;
use crate::artifacts::StatusMap;
use crate::artifacts::TestsReport;
use crate::artifacts::UrlSet;
use crate::artifacts::classify_status;
use crate::artifacts::is_passing_category;
use crate::artifacts::load_optional;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while evaluating a bundle.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The Artifact Store reported an I/O or checksum problem that is not
    /// itself a decidable verdict reason (e.g. the task directory is
    /// unreadable).
    #[error("artifact store error: {0}")]
    Store(#[from] StoreError),
    /// A sealed artifact existed but failed to parse.
    #[error("artifact error: {0}")]
    Artifact(#[from] ArtifactError),
    /// The verdict the engine was about to return does not match the fixed
    /// verdict schema (spec.md §6 verdict-out boundary).
    #[error("verdict schema error: {0}")]
    Schema(#[from] gate_core::SchemaError),
}

// ============================================================================
// SECTION: Gate Engine
// ============================================================================

/// Pure rule engine that turns a sealed bundle into a [`Verdict`]
/// (spec.md §4.8).
#[derive(Debug, Clone, Copy, Default)]
pub struct GateEngine;

impl GateEngine {
    /// Evaluates `commitment` + `claim` + `profile` against the sealed
    /// bundle in `store`, following the evaluation order from spec.md
    /// §4.8: integrity, coverage, type-specific fatal checks, soft checks,
    /// aggregation.
    ///
    /// `claim` is `None` when the Orchestrator never received one; the
    /// Gate then short-circuits with `MISSING_CLAIM` without reading the
    /// bundle (spec.md §4.9).
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Store`] if the task directory cannot be read
    /// at all (a problem with the host, not a verdict-worthy fact), or
    /// [`GateError::Artifact`] if a present artifact file is not valid
    /// JSON.
    pub fn evaluate(
        store: &ArtifactStore,
        commitment: &Commitment,
        claim: Option<&Claim>,
        profile: &Profile,
    ) -> Result<Verdict, GateError> {
        let policy = VerdictPolicy {
            profile: profile.name.clone(),
            thresholds: profile.to_threshold_map(),
        };

        let Some(claim) = claim.filter(|claim| claim.has_valid_schema() && gate_core::validate_claim(claim).is_ok()) else {
            return finish(short_circuit(commitment, policy, ReasonCode::MissingClaim));
        };

        let mut reasons: Vec<ReasonCode> = Vec::new();
        let mut metrics: BTreeMap<String, serde_json::Value> = BTreeMap::new();

        // Step 1: schema/integrity.
        match store.verify(&commitment.task_id) {
            Ok(()) => {}
            Err(StoreError::ChecksumMismatch { .. } | StoreError::NotSealed) => {
                reasons.push(ReasonCode::ChecksumMismatch);
            }
            Err(other) => return Err(GateError::Store(other)),
        }
        if !claim.claim.is_count_consistent() {
            reasons.push(ReasonCode::ClaimInconsistent);
        }
        if commitment.task_type == TaskType::DbUpdate {
            reasons.push(ReasonCode::NoPlanForType);
        }

        // A checksum mismatch means the bundle cannot be trusted; stop
        // before reading any further artifact into the evaluation.
        if reasons.iter().any(|reason| *reason == ReasonCode::ChecksumMismatch) {
            let mut verdict = short_circuit(commitment, policy, ReasonCode::ChecksumMismatch);
            if reasons.contains(&ReasonCode::ClaimInconsistent) {
                verdict.reasons.push(ReasonCode::ClaimInconsistent);
            }
            order_reasons(&mut verdict.reasons);
            return finish(verdict);
        }

        let task_dir = store.peek_task_dir(&commitment.task_id);

        // Step 2 + 3: per-unit coverage and type-specific checks, combined
        // so each unit's `reason` can prefer the specific code over the
        // generic `UNIT_MISSING` (spec.md §4.8 tie-break rule).
        let mut per_unit = Vec::new();
        for raw_id in &claim.claim.units_list {
            let unit = evaluate_unit(&task_dir, commitment, profile, raw_id)?;
            per_unit.push(unit);
        }
        per_unit.sort_by(|a, b| a.unit_id.cmp(&b.unit_id));

        let units_verified = per_unit.iter().filter(|unit| unit.verified).count() as u64;
        let units_expected = commitment.expected_total;
        // `UNIT_MISSING` is the generic catch-all for a shortfall no
        // adapter evidence explains at all; a shortfall a unit's own
        // specific reason already accounts for (`WORD_MIN`,
        // `DIFF_MISMATCH`, a non-2xx link status, ...) does not also earn
        // the generic code, per the tie-break rule above.
        let unexplained_shortfall =
            per_unit.is_empty() || per_unit.iter().any(|unit| !unit.verified && unit.reason.as_deref() == Some("missing evidence"));
        if units_verified < units_expected && unexplained_shortfall {
            reasons.push(ReasonCode::UnitMissing);
        }

        // Step 3 (continued): aggregate, task-wide fatal checks per type.
        match commitment.task_type {
            TaskType::Code => evaluate_code_fatal(&task_dir, profile, &mut reasons, &mut metrics)?,
            TaskType::LinkCheck => evaluate_link_fatal(&task_dir, profile, &mut reasons, &mut metrics)?,
            TaskType::ApiCheck => evaluate_api_fatal(&task_dir, commitment, profile, &mut reasons)?,
            TaskType::Content => {
                // Per-file WORD_MIN already folded into per-unit evaluation
                // above; promote it to a task-level reason if any unit
                // failed on that basis.
                if per_unit.iter().any(|unit| unit.reason.as_deref().is_some_and(|r| r.starts_with("word_count<"))) {
                    reasons.push(ReasonCode::WordMin);
                }
            }
            TaskType::DbUpdate => {}
        }

        order_reasons(&mut reasons);
        reasons.dedup();

        let fatal = reasons.iter().any(|reason| reason.is_fatal());
        let status = if fatal {
            VerdictStatus::Fail
        } else if units_verified == units_expected && reasons.is_empty() {
            VerdictStatus::Pass
        } else {
            VerdictStatus::Partial
        };

        finish(Verdict {
            task_id: commitment.task_id.clone(),
            status,
            units_expected,
            units_verified,
            per_unit,
            reasons,
            metrics,
            policy,
            timestamp: Timestamp::now(),
        })
    }
}

/// Schema-validates `verdict` at the verdict-out boundary before returning
/// it (spec.md §6).
fn finish(verdict: Verdict) -> Result<Verdict, GateError> {
    gate_core::validate_verdict(&verdict)?;
    Ok(verdict)
}

// ============================================================================
// SECTION: Short-circuit Verdicts
// ============================================================================

fn short_circuit(commitment: &Commitment, policy: VerdictPolicy, reason: ReasonCode) -> Verdict {
    Verdict {
        task_id: commitment.task_id.clone(),
        status: VerdictStatus::Fail,
        units_expected: commitment.expected_total,
        units_verified: 0,
        per_unit: Vec::new(),
        reasons: vec![reason],
        metrics: BTreeMap::new(),
        policy,
        timestamp: Timestamp::now(),
    }
}

fn order_reasons(reasons: &mut [ReasonCode]) {
    reasons.sort_by(|a, b| a.evaluation_step().cmp(&b.evaluation_step()).then_with(|| a.as_str().cmp(b.as_str())));
}

// ============================================================================
// SECTION: Per-unit Evaluation
// ============================================================================

fn evaluate_unit(
    task_dir: &std::path::Path,
    commitment: &Commitment,
    profile: &Profile,
    raw_id: &str,
) -> Result<Unit, GateError> {
    let task_id = commitment.task_id.clone();
    let (unit_type, verified, reason) = match commitment.task_type {
        TaskType::Content => evaluate_content_unit(task_dir, commitment, profile, raw_id)?,
        TaskType::Code => evaluate_code_unit(task_dir, raw_id)?,
        TaskType::LinkCheck => evaluate_link_unit(task_dir, raw_id)?,
        TaskType::ApiCheck => evaluate_api_unit(task_dir, raw_id)?,
        TaskType::DbUpdate => (UnitType::Item, false, Some("no adapter plan for db_update".to_string())),
    };
    Ok(Unit {
        task_id,
        unit_id: UnitId::new(raw_id),
        unit_type,
        claimed: true,
        verified,
        reason,
    })
}

fn evaluate_content_unit(
    task_dir: &std::path::Path,
    commitment: &Commitment,
    profile: &Profile,
    raw_id: &str,
) -> Result<(UnitType, bool, Option<String>), GateError> {
    let scan: Option<ContentScanReport> = load_optional(task_dir, "content/scan.json")?;
    let Some(scan) = scan else {
        return Ok((UnitType::File, false, Some("missing evidence".to_string())));
    };
    let Some(entry) = scan.file(raw_id) else {
        return Ok((UnitType::File, false, Some("missing evidence".to_string())));
    };
    let word_min = commitment
        .quality
        .get("word_min")
        .and_then(serde_json::Value::as_u64);
    if let Some(min) = word_min
        && entry.word_count < word_floor(min, profile.word_tolerance)
    {
        return Ok((UnitType::File, false, Some(format!("word_count<{min}"))));
    }
    Ok((UnitType::File, true, None))
}

/// Lowers `word_min` by `tolerance` (a fractional allowance, e.g. `0.1` for
/// 10%) before comparing against a unit's word count, so a profile that
/// sets `word_tolerance` treats a near-miss as still verified (spec.md §6
/// profile key `word_tolerance`).
fn word_floor(word_min: u64, tolerance: Option<f64>) -> u64 {
    match tolerance {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "tolerance is a small fraction in [0,1]; result fits u64")]
        Some(tolerance) if tolerance > 0.0 => {
            let allowance = (word_min as f64 * tolerance).floor() as u64;
            word_min.saturating_sub(allowance)
        }
        _ => word_min,
    }
}

fn evaluate_code_unit(
    task_dir: &std::path::Path,
    raw_id: &str,
) -> Result<(UnitType, bool, Option<String>), GateError> {
    let unit_type = if raw_id.starts_with("ep:") { UnitType::Endpoint } else { UnitType::Function };
    let map: Option<FunctionMapReport> = load_optional(task_dir, "function_map.json")?;
    let Some(map) = map else {
        return Ok((unit_type, false, Some("missing evidence".to_string())));
    };
    if map.unmatched_claims.iter().any(|entry| entry == raw_id) {
        return Ok((unit_type, false, Some("no match in diff".to_string())));
    }
    match map.match_for(raw_id) {
        Some(_found) => Ok((unit_type, true, None)),
        None => Ok((unit_type, false, Some("missing evidence".to_string()))),
    }
}

fn evaluate_link_unit(
    task_dir: &std::path::Path,
    raw_id: &str,
) -> Result<(UnitType, bool, Option<String>), GateError> {
    let statuses: Option<StatusMap> = load_optional(task_dir, "links/statuses.json")?;
    let Some(statuses) = statuses else {
        return Ok((UnitType::Url, false, Some("missing evidence".to_string())));
    };
    let Some(value) = statuses.get(raw_id) else {
        return Ok((UnitType::Url, false, Some("missing evidence".to_string())));
    };
    let category = classify_status(value);
    // `treat_3xx_as_pass` is a profile concern; the raw per-unit check
    // treats only 2xx as unconditionally passing and defers the 3xx
    // policy question to the task-level `LINK_FAIL` aggregate, matching
    // spec.md §4.8's split between per-unit coverage and policy fatals.
    if category == "2xx" {
        Ok((UnitType::Url, true, None))
    } else {
        Ok((UnitType::Url, false, Some(format!("status={value}"))))
    }
}

fn evaluate_api_unit(
    task_dir: &std::path::Path,
    raw_id: &str,
) -> Result<(UnitType, bool, Option<String>), GateError> {
    let check: Option<ApiCheckReport> = load_optional(task_dir, "api/check.json")?;
    let Some(check) = check else {
        return Ok((UnitType::Endpoint, false, Some("missing evidence".to_string())));
    };
    let Some(endpoint) = check.endpoints.iter().find(|entry| entry.unit_id().as_str() == raw_id) else {
        return Ok((UnitType::Endpoint, false, Some("missing evidence".to_string())));
    };
    if endpoint.status >= 400 {
        return Ok((UnitType::Endpoint, false, Some(format!("status={}", endpoint.status))));
    }
    if endpoint.schema_ok == Some(false) {
        return Ok((UnitType::Endpoint, false, Some("schema_mismatch".to_string())));
    }
    Ok((UnitType::Endpoint, true, None))
}

// ============================================================================
// SECTION: Task-wide Fatal Checks
// ============================================================================

fn evaluate_code_fatal(
    task_dir: &std::path::Path,
    profile: &Profile,
    reasons: &mut Vec<ReasonCode>,
    metrics: &mut BTreeMap<String, serde_json::Value>,
) -> Result<(), GateError> {
    if profile.lint_required == Some(true) {
        let lint: Option<LintReport> = load_optional(task_dir, "lint.json")?;
        let failed = lint.as_ref().is_none_or(|report| report.exit_code != 0 || report.errors > 0);
        if failed {
            reasons.push(ReasonCode::LintFail);
        }
    }
    if profile.tests_required == Some(true) {
        let tests: Option<TestsReport> = load_optional(task_dir, "tests.json")?;
        let failed = tests.as_ref().is_none_or(|report| report.total == 0 || report.failed > 0);
        if failed {
            reasons.push(ReasonCode::TestFail);
        }
    }
    if let Some(min) = profile.coverage_min {
        let coverage: Option<CoverageReport> = load_optional(task_dir, "coverage.json")?;
        let pct = coverage.as_ref().map_or(0.0, |report| report.pct);
        if pct < min {
            reasons.push(ReasonCode::CoverageFail);
        }
        metrics.insert("coverage_pct".to_string(), serde_json::json!(pct));
    }
    if profile.build_required == Some(true) {
        let build: Option<serde_json::Value> = load_optional(task_dir, "build.json")?;
        let succeeded = build.as_ref().and_then(|value| value.get("success")).and_then(serde_json::Value::as_bool);
        if succeeded != Some(true) {
            reasons.push(ReasonCode::BuildFail);
        }
    }

    let map: Option<FunctionMapReport> = load_optional(task_dir, "function_map.json")?;
    if let Some(map) = map {
        if !map.unmatched_claims.is_empty() && profile.function_certainty_required == Some(FunctionCertainty::Certain)
        {
            reasons.push(ReasonCode::DiffMismatch);
        }
        if !map.unmatched_diffs.is_empty() {
            reasons.push(ReasonCode::UnclaimedChange);
            metrics.insert("unclaimed_diffs".to_string(), serde_json::json!(map.unmatched_diffs));
        }
    }
    Ok(())
}

fn evaluate_link_fatal(
    task_dir: &std::path::Path,
    profile: &Profile,
    reasons: &mut Vec<ReasonCode>,
    metrics: &mut BTreeMap<String, serde_json::Value>,
) -> Result<(), GateError> {
    let urlset: Option<UrlSet> = load_optional(task_dir, "links/urlset.json")?;
    let statuses: Option<StatusMap> = load_optional(task_dir, "links/statuses.json")?;
    let urlset_len = urlset.as_ref().map_or(0, |set| set.urls.len());
    let statuses_len = statuses.as_ref().map_or(0, std::collections::BTreeMap::len);
    if urlset_len != statuses_len {
        reasons.push(ReasonCode::LinkCoverage);
    }

    if profile.require_full_coverage == Some(true)
        && let Some(statuses) = &statuses
    {
        let treat_3xx_as_pass = profile.treat_3xx_as_pass == Some(true);
        let still_failing = statuses
            .values()
            .filter(|value| !is_passing_category(classify_status(value), treat_3xx_as_pass))
            .count();
        if still_failing > 0 {
            reasons.push(ReasonCode::LinkFail);
        }
        metrics.insert("still_failing_links".to_string(), serde_json::json!(still_failing));
    }

    let check: Option<LinkCheckReport> = load_optional(task_dir, "links/check.json")?;
    if let Some(check) = check {
        metrics.insert("links_total_checked".to_string(), serde_json::json!(check.total_checked));
        metrics.insert("links_passed".to_string(), serde_json::json!(check.passed));
    }
    Ok(())
}

fn evaluate_api_fatal(
    task_dir: &std::path::Path,
    commitment: &Commitment,
    profile: &Profile,
    reasons: &mut Vec<ReasonCode>,
) -> Result<(), GateError> {
    let check: Option<ApiCheckReport> = load_optional(task_dir, "api/check.json")?;
    let Some(check) = check else {
        return Ok(());
    };
    if check.endpoints.iter().any(|entry| entry.status >= 400) {
        reasons.push(ReasonCode::ApiFailed);
    }
    if check.endpoints.iter().any(|entry| entry.schema_ok == Some(false)) {
        reasons.push(ReasonCode::SchemaMismatch);
    }
    if let Some(max_ms) = profile.max_response_time_ms
        && check.endpoints.iter().any(|entry| entry.latency_ms > max_ms)
    {
        reasons.push(ReasonCode::LatencyFail);
    }
    // `require_all_endpoints` demands every scoped endpoint actually appear
    // in the check report; a scoped endpoint the report never touched is
    // treated the same as a failed one (spec.md §6 profile key).
    if profile.require_all_endpoints == Some(true) {
        let checked: std::collections::BTreeSet<String> =
            check.endpoints.iter().map(|entry| entry.unit_id().to_string()).collect();
        let uncovered = commitment.scope.endpoints.iter().any(|endpoint| !checked.contains(endpoint.as_str()));
        if uncovered {
            reasons.push(ReasonCode::ApiFailed);
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use gate_core::ClaimBody;
    use gate_core::ClaimDeclared;
    use gate_core::ClaimScope;
    use gate_core::CommitmentScope;
    use gate_core::TaskId;

    use super::*;

    fn default_profile() -> Profile {
        Profile {
            name: "default".to_string(),
            ..Profile::default()
        }
    }

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        (dir, store)
    }

    fn commitment(task_type: TaskType, expected_total: u64, quality: BTreeMap<String, serde_json::Value>) -> Commitment {
        Commitment {
            task_id: TaskId::new("t-1").unwrap(),
            task_type,
            profile: "default".to_string(),
            expected_total,
            quality,
            scope: CommitmentScope::default(),
        }
    }

    fn claim(task_type: TaskType, units: &[&str]) -> Claim {
        Claim {
            schema: gate_core::CLAIM_SCHEMA.to_string(),
            actor: "agent-1".to_string(),
            task_id: TaskId::new("t-1").unwrap(),
            timestamp: Timestamp::now(),
            claim: ClaimBody {
                task_type,
                units_total: units.len() as u64,
                units_list: units.iter().map(ToString::to_string).collect(),
                scope: ClaimScope::default(),
                declared: ClaimDeclared::default(),
            },
        }
    }

    #[test]
    fn content_happy_path_passes() {
        let (_dir, store) = store();
        let id = TaskId::new("t-1").unwrap();
        let scan = serde_json::json!({
            "files": [
                {"path": "a.md", "word_count": 420, "heading_counts": {}, "image_count": 0},
                {"path": "b.md", "word_count": 500, "heading_counts": {}, "image_count": 0},
                {"path": "c.md", "word_count": 410, "heading_counts": {}, "image_count": 0}
            ]
        });
        store.put(&id, "content/scan.json", serde_json::to_vec(&scan).unwrap().as_slice(), false).unwrap();
        store.seal(&id).unwrap();

        let mut quality = BTreeMap::new();
        quality.insert("word_min".to_string(), serde_json::json!(300));
        let commitment = commitment(TaskType::Content, 3, quality);
        let claim = claim(TaskType::Content, &["a.md", "b.md", "c.md"]);
        let profile = default_profile();

        let verdict = GateEngine::evaluate(&store, &commitment, Some(&claim), &profile).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Pass);
        assert_eq!(verdict.units_verified, 3);
        assert!(verdict.reasons.is_empty());
    }

    #[test]
    fn content_shortfall_fails_with_word_min() {
        let (_dir, store) = store();
        let id = TaskId::new("t-1").unwrap();
        let scan = serde_json::json!({
            "files": [
                {"path": "a.md", "word_count": 420, "heading_counts": {}, "image_count": 0},
                {"path": "b.md", "word_count": 210, "heading_counts": {}, "image_count": 0}
            ]
        });
        store.put(&id, "content/scan.json", serde_json::to_vec(&scan).unwrap().as_slice(), false).unwrap();
        store.seal(&id).unwrap();

        let mut quality = BTreeMap::new();
        quality.insert("word_min".to_string(), serde_json::json!(300));
        let commitment = commitment(TaskType::Content, 2, quality);
        let claim = claim(TaskType::Content, &["a.md", "b.md"]);
        let profile = default_profile();

        let verdict = GateEngine::evaluate(&store, &commitment, Some(&claim), &profile).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Fail);
        assert_eq!(verdict.reasons, vec![ReasonCode::WordMin]);
        let failed_unit = verdict.per_unit.iter().find(|unit| unit.unit_id.as_str() == "b.md").unwrap();
        assert!(!failed_unit.verified);
        assert_eq!(failed_unit.reason.as_deref(), Some("word_count<300"));
    }

    #[test]
    fn missing_claim_short_circuits() {
        let (_dir, store) = store();
        let commitment = commitment(TaskType::Content, 3, BTreeMap::new());
        let profile = default_profile();

        let verdict = GateEngine::evaluate(&store, &commitment, None, &profile).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Fail);
        assert_eq!(verdict.reasons, vec![ReasonCode::MissingClaim]);
        assert_eq!(verdict.units_verified, 0);
    }

    #[test]
    fn integrity_tamper_is_detected() {
        let (_dir, store) = store();
        let id = TaskId::new("t-1").unwrap();
        store.put(&id, "links/statuses.json", b"{\"https://a\":200}", false).unwrap();
        store.seal(&id).unwrap();
        std::fs::write(store.peek_task_dir(&id).join("links/statuses.json"), b"{\"https://a\":500}").unwrap();

        let commitment = commitment(TaskType::LinkCheck, 1, BTreeMap::new());
        let claim = claim(TaskType::LinkCheck, &["https://a"]);
        let profile = default_profile();

        let verdict = GateEngine::evaluate(&store, &commitment, Some(&claim), &profile).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Fail);
        assert_eq!(verdict.reasons, vec![ReasonCode::ChecksumMismatch]);
    }

    #[test]
    fn code_diff_mismatch_under_certain_policy() {
        let (_dir, store) = store();
        let id = TaskId::new("t-1").unwrap();
        let map = serde_json::json!({
            "matches": [
                {"claimed": "func:authenticate", "matched": "authenticate", "certainty": "certain"},
                {"claimed": "func:validateToken", "matched": "validateToken", "certainty": "certain"}
            ],
            "unmatched_claims": ["func:refreshToken"],
            "unmatched_diffs": []
        });
        store.put(&id, "function_map.json", serde_json::to_vec(&map).unwrap().as_slice(), false).unwrap();
        store.seal(&id).unwrap();

        let mut profile = default_profile();
        profile.function_certainty_required = Some(FunctionCertainty::Certain);
        let commitment = commitment(TaskType::Code, 3, BTreeMap::new());
        let claim = claim(TaskType::Code, &["func:authenticate", "func:validateToken", "func:refreshToken"]);

        let verdict = GateEngine::evaluate(&store, &commitment, Some(&claim), &profile).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Fail);
        assert!(verdict.reasons.contains(&ReasonCode::DiffMismatch));
        let missing = verdict.per_unit.iter().find(|unit| unit.unit_id.as_str() == "func:refreshToken").unwrap();
        assert_eq!(missing.reason.as_deref(), Some("no match in diff"));
    }

    #[test]
    fn link_coverage_partial_after_resample() {
        let (_dir, store) = store();
        let id = TaskId::new("t-1").unwrap();
        let urls: Vec<String> = (1..=8).map(|n| format!("https://example.test/{n}")).collect();
        let urlset = serde_json::json!(urls);
        let mut statuses = serde_json::Map::new();
        for url in &urls[..7] {
            statuses.insert(url.clone(), serde_json::json!(200));
        }
        statuses.insert(urls[7].clone(), serde_json::json!(500));
        store.put(&id, "links/urlset.json", serde_json::to_vec(&urlset).unwrap().as_slice(), false).unwrap();
        store
            .put(&id, "links/statuses.json", serde_json::to_vec(&statuses).unwrap().as_slice(), false)
            .unwrap();
        store.seal(&id).unwrap();

        let mut profile = default_profile();
        profile.treat_3xx_as_pass = Some(true);
        profile.require_full_coverage = Some(false);
        let commitment = commitment(TaskType::LinkCheck, 8, BTreeMap::new());
        let claim = claim(TaskType::LinkCheck, &urls.iter().map(String::as_str).collect::<Vec<_>>());

        let verdict = GateEngine::evaluate(&store, &commitment, Some(&claim), &profile).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Partial);
        assert!(verdict.reasons.is_empty());
        assert_eq!(verdict.units_verified, 7);
        let still_failing =
            verdict.per_unit.iter().find(|unit| unit.unit_id.as_str() == urls[7]).unwrap();
        assert!(!still_failing.verified);
        assert_eq!(still_failing.reason.as_deref(), Some("status=500"));
    }

    #[test]
    fn empty_urlset_with_nonzero_expectation_is_unit_missing() {
        let (_dir, store) = store();
        let id = TaskId::new("t-1").unwrap();
        store.seal(&id).unwrap();

        let commitment = commitment(TaskType::LinkCheck, 1, BTreeMap::new());
        let claim = claim(TaskType::LinkCheck, &[]);
        let profile = default_profile();

        let verdict = GateEngine::evaluate(&store, &commitment, Some(&claim), &profile).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Fail);
        assert!(verdict.reasons.contains(&ReasonCode::UnitMissing));
        assert_eq!(verdict.units_verified, 0);
    }

    #[test]
    fn word_tolerance_forgives_a_small_shortfall() {
        let (_dir, store) = store();
        let id = TaskId::new("t-1").unwrap();
        let scan = serde_json::json!({
            "files": [
                {"path": "a.md", "word_count": 285, "heading_counts": {}, "image_count": 0}
            ]
        });
        store.put(&id, "content/scan.json", serde_json::to_vec(&scan).unwrap().as_slice(), false).unwrap();
        store.seal(&id).unwrap();

        let mut quality = BTreeMap::new();
        quality.insert("word_min".to_string(), serde_json::json!(300));
        let commitment = commitment(TaskType::Content, 1, quality);
        let claim = claim(TaskType::Content, &["a.md"]);
        let mut profile = default_profile();
        profile.word_tolerance = Some(0.1);

        let verdict = GateEngine::evaluate(&store, &commitment, Some(&claim), &profile).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Pass);
        assert_eq!(verdict.units_verified, 1);
    }

    #[test]
    fn word_tolerance_does_not_forgive_past_its_floor() {
        let (_dir, store) = store();
        let id = TaskId::new("t-1").unwrap();
        let scan = serde_json::json!({
            "files": [
                {"path": "a.md", "word_count": 250, "heading_counts": {}, "image_count": 0}
            ]
        });
        store.put(&id, "content/scan.json", serde_json::to_vec(&scan).unwrap().as_slice(), false).unwrap();
        store.seal(&id).unwrap();

        let mut quality = BTreeMap::new();
        quality.insert("word_min".to_string(), serde_json::json!(300));
        let commitment = commitment(TaskType::Content, 1, quality);
        let claim = claim(TaskType::Content, &["a.md"]);
        let mut profile = default_profile();
        profile.word_tolerance = Some(0.1);

        let verdict = GateEngine::evaluate(&store, &commitment, Some(&claim), &profile).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Fail);
        assert!(verdict.reasons.contains(&ReasonCode::WordMin));
    }

    #[test]
    fn require_all_endpoints_fails_on_a_scoped_but_unchecked_endpoint() {
        let (_dir, store) = store();
        let id = TaskId::new("t-1").unwrap();
        let check = serde_json::json!({
            "total_checked": 1,
            "passed": 1,
            "failed": 0,
            "endpoints": [
                {"url": "/health", "method": "GET", "status": 200, "latency_ms": 10, "schema_ok": null}
            ]
        });
        store.put(&id, "api/check.json", serde_json::to_vec(&check).unwrap().as_slice(), false).unwrap();
        store.seal(&id).unwrap();

        let mut commitment = commitment(TaskType::ApiCheck, 1, BTreeMap::new());
        commitment.scope.endpoints = vec!["ep:GET /health".to_string(), "ep:POST /users".to_string()];
        let claim = claim(TaskType::ApiCheck, &["ep:GET /health"]);
        let mut profile = default_profile();
        profile.require_all_endpoints = Some(true);

        let verdict = GateEngine::evaluate(&store, &commitment, Some(&claim), &profile).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Fail);
        assert!(verdict.reasons.contains(&ReasonCode::ApiFailed));
    }
}
