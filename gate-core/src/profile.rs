// gate-core/src/profile.rs
// ============================================================================
// Module: Profile Registry
// Description: Named threshold sets controlling Gate Engine behavior.
// Purpose: Decouple verification strictness from adapter/engine code.
// Dependencies: serde, serde_json, std::collections::BTreeMap
// ============================================================================

//! ## Overview
//! A Profile is a named bag of thresholds (spec.md §4.8, §6). Every field is
//! optional; an absent field disables the corresponding fatal check rather
//! than defaulting to a magic "off" sentinel value, so a profile file that
//! says nothing about coverage never fires `COVERAGE_FAIL`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Function Certainty
// ============================================================================

/// Required certainty for `code:map-functions` matches (spec.md §4.4, §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionCertainty {
    /// Only exact or case-insensitive identifier matches count.
    Certain,
    /// Substring or Levenshtein-ratio matches are accepted.
    Fuzzy,
}

// ============================================================================
// SECTION: Profile
// ============================================================================

/// Named threshold set recognized by the Gate Engine (spec.md §6).
///
/// # Invariants
/// - Every field is optional; `None` means the corresponding check is not
///   enforced, never that it is enforced with a zero/false threshold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name.
    #[serde(default)]
    pub name: String,
    /// Lint must exit 0 with zero errors.
    #[serde(default)]
    pub lint_required: Option<bool>,
    /// Tests must run and all pass.
    #[serde(default)]
    pub tests_required: Option<bool>,
    /// Minimum coverage percentage, inclusive.
    #[serde(default)]
    pub coverage_min: Option<f64>,
    /// Required function-match certainty for `DIFF_MISMATCH`.
    #[serde(default)]
    pub function_certainty_required: Option<FunctionCertainty>,
    /// Project build must succeed.
    #[serde(default)]
    pub build_required: Option<bool>,
    /// Minimum word count per content file.
    #[serde(default)]
    pub word_min: Option<u64>,
    /// Allowed fractional tolerance below `word_min` before it is fatal.
    #[serde(default)]
    pub word_tolerance: Option<f64>,
    /// Maximum resample attempts per failing URL.
    #[serde(default)]
    pub resample_failures: Option<u32>,
    /// Per-request timeout in milliseconds (links/API probing).
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Treat HTTP 3xx as a passing link status.
    #[serde(default)]
    pub treat_3xx_as_pass: Option<bool>,
    /// Bounded concurrency for link/API probing.
    #[serde(default)]
    pub concurrent_checks: Option<u32>,
    /// Delay between probe batches in milliseconds.
    #[serde(default)]
    pub rate_limit_ms: Option<u64>,
    /// Require every discovered URL to be non-failure-class after resample.
    #[serde(default)]
    pub require_full_coverage: Option<bool>,
    /// Validate API responses against the declared JSON Schema.
    #[serde(default)]
    pub validate_schema: Option<bool>,
    /// Maximum allowed endpoint latency in milliseconds.
    #[serde(default)]
    pub max_response_time_ms: Option<u64>,
    /// Require every endpoint in scope to be checked.
    #[serde(default)]
    pub require_all_endpoints: Option<bool>,
}

impl Profile {
    /// Returns `concurrent_checks`, defaulting to 5 per spec.md §4.5.
    #[must_use]
    pub fn concurrent_checks_or_default(&self) -> u32 {
        self.concurrent_checks.unwrap_or(5)
    }

    /// Returns `timeout_ms`, defaulting to 5000 per spec.md §4.5.
    #[must_use]
    pub fn timeout_ms_or_default(&self) -> u64 {
        self.timeout_ms.unwrap_or(5_000)
    }

    /// Returns `rate_limit_ms`, defaulting to 100 per spec.md §4.5.
    #[must_use]
    pub fn rate_limit_ms_or_default(&self) -> u64 {
        self.rate_limit_ms.unwrap_or(100)
    }

    /// Returns `resample_failures`, defaulting to 3.
    #[must_use]
    pub fn resample_failures_or_default(&self) -> u32 {
        self.resample_failures.unwrap_or(3)
    }

    /// Serializes the thresholds that were actually set, for recording on
    /// `Verdict.policy.thresholds`.
    #[must_use]
    pub fn to_threshold_map(&self) -> BTreeMap<String, serde_json::Value> {
        let value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .filter(|(_, v)| !v.is_null())
                .collect::<BTreeMap<_, _>>(),
            _ => BTreeMap::new(),
        }
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Errors raised while loading a profile registry.
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// The registry file could not be read.
    #[error("failed to read profile registry at {0}: {1}")]
    Read(String, std::io::Error),
    /// The registry file could not be parsed.
    #[error("failed to parse profile registry: {0}")]
    Parse(#[from] serde_json::Error),
    /// The requested profile name is not present in the registry.
    #[error("unknown profile: {0}")]
    Unknown(String),
}

/// A loaded `profiles.json` registry (spec.md §6).
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: BTreeMap<String, Profile>,
}

impl ProfileRegistry {
    /// Loads a registry from a JSON file mapping profile name to thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Read`] or [`ProfileError::Parse`] on
    /// failure.
    pub fn load(path: &Path) -> Result<Self, ProfileError> {
        let bytes =
            fs::read(path).map_err(|err| ProfileError::Read(path.display().to_string(), err))?;
        let mut profiles: BTreeMap<String, Profile> = serde_json::from_slice(&bytes)?;
        for (name, profile) in &mut profiles {
            profile.name = name.clone();
        }
        Ok(Self {
            profiles,
        })
    }

    /// Builds a registry directly from an in-memory map (used by tests and
    /// by embedded default profiles).
    #[must_use]
    pub fn from_map(profiles: BTreeMap<String, Profile>) -> Self {
        Self {
            profiles,
        }
    }

    /// Looks up a profile by name.
    ///
    /// # Errors
    ///
    /// Returns [`ProfileError::Unknown`] if no profile with that name
    /// exists.
    pub fn get(&self, name: &str) -> Result<&Profile, ProfileError> {
        self.profiles.get(name).ok_or_else(|| ProfileError::Unknown(name.to_string()))
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_disable_checks() {
        let profile = Profile::default();
        assert_eq!(profile.coverage_min, None);
        assert_eq!(profile.lint_required, None);
    }

    #[test]
    fn defaults_match_spec_values() {
        let profile = Profile::default();
        assert_eq!(profile.concurrent_checks_or_default(), 5);
        assert_eq!(profile.timeout_ms_or_default(), 5_000);
        assert_eq!(profile.rate_limit_ms_or_default(), 100);
    }

    #[test]
    fn registry_rejects_unknown_profile() {
        let registry = ProfileRegistry::from_map(BTreeMap::new());
        assert!(matches!(registry.get("missing"), Err(ProfileError::Unknown(_))));
    }

    #[test]
    fn threshold_map_omits_unset_fields() {
        let mut profile = Profile::default();
        profile.coverage_min = Some(80.0);
        let map = profile.to_threshold_map();
        assert_eq!(map.get("coverage_min").and_then(serde_json::Value::as_f64), Some(80.0));
        assert!(!map.contains_key("lint_required"));
    }
}
