// gate-adapters/src/manifest.rs
// ============================================================================
// Module: Adapter Manifest
// Description: `manifest.json` shape self-describing an adapter binary.
// Purpose: Let the Runtime build a capability -> binary index without
//          hardcoding adapter identities (spec.md §4.3, §9).
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every adapter directory carries a `manifest.json` naming its
//! capabilities and entry point. This mirrors the capability-registry
//! discipline in the corpus's provider registry, generalized from
//! in-process trait objects to out-of-process binaries (spec.md §9
//! "Heterogeneous adapter authors → capability registry").

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Manifest
// ============================================================================

/// Sandbox constraints an adapter declares for itself (spec.md §4.3, §6).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxSpec {
    /// External tools the adapter expects to shell out to.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Wall-clock timeout in seconds for a single invocation.
    #[serde(default = "default_timeout_s")]
    pub timeout_s: u64,
    /// Whether the adapter is permitted to perform network I/O.
    #[serde(default)]
    pub network: bool,
}

const fn default_timeout_s() -> u64 {
    60
}

/// Self-description an adapter directory publishes as `manifest.json`
/// (spec.md §4.3, §6).
///
/// # Invariants
/// - `capabilities` are unique `domain:action` strings.
/// - `entry` is a path relative to the manifest's own directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterManifest {
    /// Adapter name.
    pub name: String,
    /// Adapter version.
    pub version: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Path to the executable, relative to this manifest's directory.
    pub entry: String,
    /// Capabilities this adapter provides (e.g. `code:diff`).
    pub capabilities: Vec<String>,
    /// Sandbox constraints.
    #[serde(default)]
    pub sandbox: SandboxSpec,
}
