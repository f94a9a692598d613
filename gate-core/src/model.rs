// gate-core/src/model.rs
// ============================================================================
// Module: Gate Data Model
// Description: Task, Commitment, Claim, Artifact, Unit, Verdict, and Profile.
// Purpose: Canonical record shapes shared by every crate in the workspace.
// Dependencies: crate::identifiers, crate::hashing, crate::time, serde
// ============================================================================

//! ## Overview
//! These are the record shapes defined in spec.md §3. All are plain,
//! serializable data; none carry behavior beyond small accessor helpers.
//! Invariants called out in spec.md §3 are enforced at the boundaries that
//! construct these values (the Orchestrator when ingesting a Claim, the
//! Gate Engine when evaluating a bundle) rather than in the types
//! themselves, matching the corpus's append-only record style in
//! `decision-gate-core/src/core/state.rs`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::ReasonCode;
use crate::identifiers::TaskId;
use crate::identifiers::UnitId;
use crate::identifiers::UnitType;
use crate::time::Timestamp;

// ============================================================================
// SECTION: Task Lifecycle
// ============================================================================

/// Task lifecycle state (spec.md §3, §4.9).
///
/// # Invariants
/// - Transitions are monotonic: `pending -> claimed -> measured -> decided
///   -> persisted`. A task may terminate early at `decided` if no sink is
///   available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Commitment recorded, no Claim ingested yet.
    Pending,
    /// Claim ingested and schema-valid.
    Claimed,
    /// Adapter plan completed and the bundle is sealed.
    Measured,
    /// The Gate Engine produced a verdict.
    Decided,
    /// The verdict was written to the Evidence DB (and pushed, best-effort).
    Persisted,
}

/// The kind of verification plan a Commitment selects (spec.md §3).
///
/// # Invariants
/// - `DbUpdate` has no adapter plan; the Gate rejects it with
///   `NO_PLAN_FOR_TYPE` (spec.md §9 Open Questions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Content measurement (word counts, headings, images).
    Content,
    /// Code diff/lint/test/coverage verification.
    Code,
    /// Link discovery and liveness checking.
    LinkCheck,
    /// API schema/latency probing.
    ApiCheck,
    /// Reserved; no adapter plan ships for this type.
    DbUpdate,
}

// ============================================================================
// SECTION: Commitment
// ============================================================================

/// Scope of the work a Commitment authorizes the adapters to examine.
///
/// # Invariants
/// - None. Empty vectors are valid and mean "nothing additionally scoped".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentScope {
    /// Root directory the adapters should operate under, if applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_directory: Option<String>,
    /// Repo-relative file paths in scope.
    #[serde(default)]
    pub files: Vec<String>,
    /// Qualified function names in scope.
    #[serde(default)]
    pub functions: Vec<String>,
    /// Endpoint descriptors (`METHOD path`) in scope.
    #[serde(default)]
    pub endpoints: Vec<String>,
}

/// Immutable input describing the verification contract (spec.md §3).
///
/// # Invariants
/// - Never mutated after creation.
/// - `task_id` is unique across the Artifact Store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    /// Task identifier.
    pub task_id: TaskId,
    /// Verification plan selector.
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Named profile used by the Gate Engine.
    pub profile: String,
    /// Expected number of verified units for a `pass` verdict.
    pub expected_total: u64,
    /// Free-form quality targets (e.g. `word_min`, `coverage_min`) echoed
    /// from the executor's contract; authoritative thresholds still come
    /// from the named Profile.
    #[serde(default)]
    pub quality: BTreeMap<String, serde_json::Value>,
    /// Scope of files/functions/endpoints under verification.
    #[serde(default)]
    pub scope: CommitmentScope,
}

// ============================================================================
// SECTION: Claim
// ============================================================================

/// Schema identifier the Claim must declare.
pub const CLAIM_SCHEMA: &str = "verify.claim/v1.1";

/// Executor-declared intent, approach, and completion status.
///
/// # Invariants
/// - None; these fields are never trusted, only recorded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaimDeclared {
    /// Free-text statement of intent.
    #[serde(default)]
    pub intent: String,
    /// Free-text statement of approach.
    #[serde(default)]
    pub approach: String,
    /// Executor-reported completion status (never trusted for verdicts).
    #[serde(default)]
    pub completion_status: String,
}

/// Scope the executor claims to have touched.
///
/// # Invariants
/// - None.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaimScope {
    /// Repository root the executor operated against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_root: Option<String>,
    /// Named targets (endpoints, URLs, directories).
    #[serde(default)]
    pub targets: Vec<String>,
    /// Files the executor reports touching.
    #[serde(default)]
    pub files: Vec<String>,
}

/// Inner claim body.
///
/// # Invariants
/// - `units_total == units_list.len()`; violation is `CLAIM_INCONSISTENT`
///   (spec.md §3, §4.8).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaimBody {
    /// Verification plan selector (must match the Commitment's).
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Declared total unit count.
    pub units_total: u64,
    /// Declared unit identifiers, as raw strings (resolved to `UnitId` by
    /// the Orchestrator).
    pub units_list: Vec<String>,
    /// Claimed scope.
    #[serde(default)]
    pub scope: ClaimScope,
    /// Declared intent/approach/status.
    #[serde(default)]
    pub declared: ClaimDeclared,
}

impl ClaimBody {
    /// Returns whether `units_total` matches `units_list.len()`
    /// (spec.md §3 invariant).
    #[must_use]
    pub fn is_count_consistent(&self) -> bool {
        usize::try_from(self.units_total).map(|total| total == self.units_list.len()).unwrap_or(false)
    }
}

/// Executor-supplied, schema `verify.claim/v1.1` (spec.md §3, §6).
///
/// # Invariants
/// - `schema == CLAIM_SCHEMA`.
/// - `task_id` matches the Commitment's `task_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Claim {
    /// Schema identifier; must equal [`CLAIM_SCHEMA`].
    pub schema: String,
    /// Actor that produced the claim (executor identity, opaque string).
    pub actor: String,
    /// Task identifier; must match the Commitment.
    pub task_id: TaskId,
    /// Claim timestamp.
    pub timestamp: Timestamp,
    /// Claim body.
    pub claim: ClaimBody,
}

impl Claim {
    /// Returns whether the claim's schema field matches [`CLAIM_SCHEMA`].
    #[must_use]
    pub fn has_valid_schema(&self) -> bool {
        self.schema == CLAIM_SCHEMA
    }
}

// ============================================================================
// SECTION: Artifact
// ============================================================================

/// A named, content-addressed file inside a task directory (spec.md §3).
///
/// # Invariants
/// - `path` is relative to the task directory.
/// - `sha256` is the lowercase hex digest of the file's bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    /// Path relative to the task directory.
    pub path: String,
    /// File size in bytes.
    pub size: u64,
    /// Lowercase hex SHA-256 digest.
    pub sha256: String,
}

/// Schema tag for the bundle index (spec.md §12 supplement).
pub const BUNDLE_SCHEMA: &str = "gate.bundle/v1";

/// `artifacts.json`: the bundle index produced by `seal` (spec.md §4.1).
///
/// # Invariants
/// - `entries` is sorted by `path` for determinism.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    /// Bundle schema tag.
    pub bundle_schema: String,
    /// Task identifier this bundle belongs to.
    pub task_id: TaskId,
    /// Sorted artifact entries.
    pub entries: Vec<ArtifactEntry>,
}

impl ArtifactBundle {
    /// Creates a new, empty bundle for `task_id`.
    #[must_use]
    pub fn new(task_id: TaskId) -> Self {
        Self {
            bundle_schema: BUNDLE_SCHEMA.to_string(),
            task_id,
            entries: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Unit
// ============================================================================

/// The smallest decidable item inside a task (spec.md §3).
///
/// # Invariants
/// - `verified ⇒ reason.is_none()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Task identifier.
    pub task_id: TaskId,
    /// Unit identifier.
    pub unit_id: UnitId,
    /// Unit kind.
    pub unit_type: UnitType,
    /// Whether the executor's Claim listed this unit.
    pub claimed: bool,
    /// Whether the Gate Engine found corresponding evidence.
    pub verified: bool,
    /// The most specific failure reason, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Unit {
    /// Returns whether the unit is `ok` (spec.md §3: `verified ⇒ ok` and
    /// "a unit is `ok` iff `reason` is null").
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.reason.is_none()
    }
}

// ============================================================================
// SECTION: Verdict
// ============================================================================

/// Overall verdict status (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictStatus {
    /// All expected units verified, zero reasons.
    Pass,
    /// Some units verified, no fatal reason fired.
    Partial,
    /// A fatal reason fired.
    Fail,
}

impl VerdictStatus {
    /// Maps the verdict status to the process exit code from spec.md §6.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Pass => 0,
            Self::Fail => 1,
            Self::Partial => 2,
        }
    }
}

/// Policy metadata recorded on a verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerdictPolicy {
    /// Profile name used for evaluation.
    pub profile: String,
    /// Threshold values actually applied, for auditability.
    pub thresholds: BTreeMap<String, serde_json::Value>,
}

/// Output of the Gate Engine (spec.md §3).
///
/// # Invariants
/// - `status == Pass` iff `reasons` is empty and
///   `units_verified >= units_expected`.
/// - `status == Fail` if any fatal reason code fired.
/// - Reproducible: the same bundle + profile yields the same verdict bytes
///   modulo `timestamp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Task identifier.
    pub task_id: TaskId,
    /// Overall status.
    pub status: VerdictStatus,
    /// Expected unit count (from the Commitment).
    pub units_expected: u64,
    /// Verified unit count.
    pub units_verified: u64,
    /// Per-unit detail, sorted by `unit_id`.
    pub per_unit: Vec<Unit>,
    /// Fatal and informational reason codes, ordered per spec.md §7.
    pub reasons: Vec<ReasonCode>,
    /// Soft metrics recorded during evaluation.
    pub metrics: BTreeMap<String, serde_json::Value>,
    /// Policy used for this verdict.
    pub policy: VerdictPolicy,
    /// Verdict timestamp.
    pub timestamp: Timestamp,
}

impl Verdict {
    /// Returns the bytes that two verdicts must share for bit-identical
    /// reproduction, i.e. canonical JSON with `timestamp` forced to a fixed
    /// placeholder (spec.md §8).
    ///
    /// # Errors
    ///
    /// Returns an error if canonicalization fails.
    pub fn reproducible_bytes(&self) -> Result<Vec<u8>, crate::hashing::HashError> {
        let mut normalized = self.clone();
        normalized.timestamp = Timestamp::from_offset(time::OffsetDateTime::UNIX_EPOCH);
        crate::hashing::canonical_json_bytes(&normalized)
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_body_count_consistency() {
        let body = ClaimBody {
            task_type: TaskType::Content,
            units_total: 2,
            units_list: vec!["a.md".to_string(), "b.md".to_string()],
            scope: ClaimScope::default(),
            declared: ClaimDeclared::default(),
        };
        assert!(body.is_count_consistent());

        let mut mismatched = body;
        mismatched.units_total = 3;
        assert!(!mismatched.is_count_consistent());
    }

    #[test]
    fn claim_schema_validation() {
        let claim = Claim {
            schema: CLAIM_SCHEMA.to_string(),
            actor: "agent-1".to_string(),
            task_id: TaskId::new("t-1").unwrap(),
            timestamp: Timestamp::now(),
            claim: ClaimBody {
                task_type: TaskType::Content,
                units_total: 0,
                units_list: vec![],
                scope: ClaimScope::default(),
                declared: ClaimDeclared::default(),
            },
        };
        assert!(claim.has_valid_schema());
    }

    #[test]
    fn verdict_exit_codes_match_spec() {
        assert_eq!(VerdictStatus::Pass.exit_code(), 0);
        assert_eq!(VerdictStatus::Fail.exit_code(), 1);
        assert_eq!(VerdictStatus::Partial.exit_code(), 2);
    }

    #[test]
    fn unit_ok_iff_reason_is_none() {
        let unit = Unit {
            task_id: TaskId::new("t-1").unwrap(),
            unit_id: UnitId::new("a.md"),
            unit_type: UnitType::File,
            claimed: true,
            verified: true,
            reason: None,
        };
        assert!(unit.is_ok());

        let mut failed = unit;
        failed.verified = false;
        failed.reason = Some("word_count<300".to_string());
        assert!(!failed.is_ok());
    }

    #[test]
    fn verdict_reproducible_bytes_ignore_timestamp() {
        let task_id = TaskId::new("t-1").unwrap();
        let base = Verdict {
            task_id: task_id.clone(),
            status: VerdictStatus::Pass,
            units_expected: 0,
            units_verified: 0,
            per_unit: vec![],
            reasons: vec![],
            metrics: BTreeMap::new(),
            policy: VerdictPolicy {
                profile: "content_default".to_string(),
                thresholds: BTreeMap::new(),
            },
            timestamp: Timestamp::now(),
        };
        let mut later = base.clone();
        later.timestamp = Timestamp::now();
        assert_eq!(base.reproducible_bytes().unwrap(), later.reproducible_bytes().unwrap());
    }
}
