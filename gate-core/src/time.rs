// gate-core/src/time.rs
// ============================================================================
// Module: Gate Time Model
// Description: Canonical timestamp representation for verdicts and records.
// Purpose: Keep pure logic (Gate Engine) free of wall-clock reads.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! The Gate Engine never reads wall-clock time itself (spec.md §5: "The Gate
//! Engine is purely CPU-bound and never suspends on I/O"); timestamps are
//! always supplied by the caller (the Orchestrator) and carried as plain
//! data. This keeps `verdict.json` reproducible modulo the `timestamp`
//! field, as required by spec.md §3 and §8.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// RFC 3339 timestamp carried verbatim through the data model.
///
/// # Invariants
/// - Always represents UTC.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(String);

impl Timestamp {
    /// Builds a timestamp from the current wall-clock time.
    ///
    /// Callers at the I/O boundary (the Orchestrator, the CLI) use this;
    /// pure logic (the Gate Engine) must receive a `Timestamp` as input
    /// instead of constructing one.
    #[must_use]
    pub fn now() -> Self {
        Self::from_offset(OffsetDateTime::now_utc())
    }

    /// Builds a timestamp from an explicit `OffsetDateTime`.
    #[must_use]
    pub fn from_offset(value: OffsetDateTime) -> Self {
        Self(value.format(&Rfc3339).unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string()))
    }

    /// Returns the RFC 3339 string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_produces_rfc3339() {
        let ts = Timestamp::now();
        assert!(OffsetDateTime::parse(ts.as_str(), &Rfc3339).is_ok());
    }
}
