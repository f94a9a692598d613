// gate-core/src/identifiers.rs
// ============================================================================
// Module: Gate Identifiers
// Description: Canonical opaque identifiers for tasks, units, and reason codes.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque and serialize as plain strings. `TaskId` and
//! `UnitId` carry no validation beyond non-emptiness; `ReasonCode` is
//! restricted to the fixed taxonomy in spec.md §7 so a typo in adapter or
//! gate code fails at construction rather than producing a verdict with an
//! unrecognized reason.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Task Identifier
// ============================================================================

/// Opaque, unique identifier for a verification task.
///
/// # Invariants
/// - Never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Creates a new task identifier.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::Empty`] if `id` is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, IdentifierError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdentifierError::Empty);
        }
        Ok(Self(id))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Unit Identifier
// ============================================================================

/// The kind of unit a `UnitId` names.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    /// A repo-relative file path.
    File,
    /// A qualified function or method name (`func:<name>`).
    Function,
    /// An HTTP endpoint (`ep:<METHOD> <path>`).
    Endpoint,
    /// An absolute URL.
    Url,
    /// A row identifier (reserved for future `db_update` support).
    Row,
    /// A generic claimed item.
    Item,
}

/// Deterministic identifier for the smallest decidable item inside a task.
///
/// # Invariants
/// - For `UnitType::File`, the value is the repo-relative path.
/// - For `UnitType::Function`, the value is `func:<qualified-name>`.
/// - For `UnitType::Endpoint`, the value is `ep:<METHOD> <path>`.
/// - For `UnitType::Url`, the value is the absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    /// Creates a unit id from a raw string already in canonical form.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Builds a function unit id (`func:<name>`).
    #[must_use]
    pub fn function(name: &str) -> Self {
        Self(format!("func:{name}"))
    }

    /// Builds an endpoint unit id (`ep:<METHOD> <path>`).
    #[must_use]
    pub fn endpoint(method: &str, path: &str) -> Self {
        Self(format!("ep:{} {path}", method.to_ascii_uppercase()))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Reason Codes
// ============================================================================

/// Stable identifier for a specific failure class (spec.md §7).
///
/// # Invariants
/// - Variants are stable for serialization and external contract matching.
/// - `UNCLAIMED_CHANGE` is the only non-fatal code; see [`ReasonCode::is_fatal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// Claim missing or schema-invalid.
    MissingClaim,
    /// `units_total != len(units_list)` in the Claim.
    ClaimInconsistent,
    /// A listed artifact's SHA-256 did not match the recorded hash.
    ChecksumMismatch,
    /// Fewer units were verified than the Commitment's `expected_total`.
    UnitMissing,
    /// A content file fell below the profile's `word_min`.
    WordMin,
    /// A claimed function/endpoint had no certain match in the diff.
    DiffMismatch,
    /// Lint reported errors while `lint_required` is set.
    LintFail,
    /// Tests failed, or no tests ran, while `tests_required` is set.
    TestFail,
    /// Coverage percentage fell below `coverage_min`.
    CoverageFail,
    /// The project build failed while `build_required` is set.
    BuildFail,
    /// `|statuses| != |urlset|` for a link-check task.
    LinkCoverage,
    /// A URL remained failure-class after resample under
    /// `require_full_coverage`.
    LinkFail,
    /// An API endpoint responded with `status >= 400`.
    ApiFailed,
    /// An API response failed JSON Schema validation.
    SchemaMismatch,
    /// Endpoint latency exceeded `max_response_time_ms` under a strict
    /// profile.
    LatencyFail,
    /// No adapter plan is registered for the Commitment's task type.
    NoPlanForType,
    /// A required adapter capability has no resolvable binary.
    MissingAdapter,
    /// A diff unit was not present in the Claim (non-fatal, metrics-only).
    UnclaimedChange,
}

impl ReasonCode {
    /// Returns whether this reason code is fatal (forces `status = fail`).
    ///
    /// Per spec.md §7, `UNCLAIMED_CHANGE` is the sole non-fatal code.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !matches!(self, Self::UnclaimedChange)
    }

    /// Returns the evaluation-step ordinal used to order `reasons[]`
    /// (spec.md §7: "ordered by evaluation step then alphabetically within
    /// a step").
    #[must_use]
    pub const fn evaluation_step(self) -> u8 {
        match self {
            Self::MissingClaim | Self::ClaimInconsistent | Self::ChecksumMismatch => 0,
            Self::UnitMissing => 1,
            Self::WordMin
            | Self::DiffMismatch
            | Self::LintFail
            | Self::TestFail
            | Self::CoverageFail
            | Self::BuildFail
            | Self::LinkCoverage
            | Self::LinkFail
            | Self::ApiFailed
            | Self::SchemaMismatch
            | Self::LatencyFail => 2,
            Self::NoPlanForType | Self::MissingAdapter => 3,
            Self::UnclaimedChange => 4,
        }
    }

    /// Returns the stable `SCREAMING_SNAKE_CASE` wire form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingClaim => "MISSING_CLAIM",
            Self::ClaimInconsistent => "CLAIM_INCONSISTENT",
            Self::ChecksumMismatch => "CHECKSUM_MISMATCH",
            Self::UnitMissing => "UNIT_MISSING",
            Self::WordMin => "WORD_MIN",
            Self::DiffMismatch => "DIFF_MISMATCH",
            Self::LintFail => "LINT_FAIL",
            Self::TestFail => "TEST_FAIL",
            Self::CoverageFail => "COVERAGE_FAIL",
            Self::BuildFail => "BUILD_FAIL",
            Self::LinkCoverage => "LINK_COVERAGE",
            Self::LinkFail => "LINK_FAIL",
            Self::ApiFailed => "API_FAILED",
            Self::SchemaMismatch => "SCHEMA_MISMATCH",
            Self::LatencyFail => "LATENCY_FAIL",
            Self::NoPlanForType => "NO_PLAN_FOR_TYPE",
            Self::MissingAdapter => "MISSING_ADAPTER",
            Self::UnclaimedChange => "UNCLAIMED_CHANGE",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while constructing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// The identifier string was empty.
    #[error("identifier must not be empty")]
    Empty,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_id_rejects_empty() {
        assert_eq!(TaskId::new(""), Err(IdentifierError::Empty));
        assert!(TaskId::new("t-1").is_ok());
    }

    #[test]
    fn unit_id_function_form() {
        assert_eq!(UnitId::function("authenticate").as_str(), "func:authenticate");
    }

    #[test]
    fn unit_id_endpoint_form() {
        assert_eq!(UnitId::endpoint("get", "/health").as_str(), "ep:GET /health");
    }

    #[test]
    fn reason_code_fatal_classification() {
        assert!(ReasonCode::MissingClaim.is_fatal());
        assert!(ReasonCode::TestFail.is_fatal());
        assert!(!ReasonCode::UnclaimedChange.is_fatal());
    }

    #[test]
    fn reason_code_wire_form_round_trips() {
        let json = serde_json::to_string(&ReasonCode::CoverageFail).unwrap();
        assert_eq!(json, "\"COVERAGE_FAIL\"");
        let back: ReasonCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ReasonCode::CoverageFail);
    }

    #[test]
    fn evaluation_step_orders_integrity_before_coverage() {
        assert!(ReasonCode::MissingClaim.evaluation_step() < ReasonCode::UnitMissing.evaluation_step());
        assert!(ReasonCode::UnitMissing.evaluation_step() < ReasonCode::CoverageFail.evaluation_step());
    }
}
