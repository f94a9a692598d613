// gate-adapters/src/lib.rs
// ============================================================================
// Crate: gate-adapters
// Description: Adapter Runtime (discovery + dispatch) and shared adapter
//              binary support (spec.md §4.3-§4.7).
// Purpose: Resolve capabilities to adapter binaries and invoke them under
//          the CLI contract; the four built-in adapters live as `[[bin]]`
//          targets in this same crate.
// ============================================================================

//! ## Overview
//! `gate-adapters` is split into the in-process Runtime library
//! (`runtime`, `manifest`) used by `gate-orchestrator`, and shared
//! argument/I-O plumbing (`cli_support`) reused by the four adapter
//! binaries under `src/bin/`. `levenshtein` backs the code adapter's
//! fuzzy function matching.

pub mod cli_support;
pub mod levenshtein;
pub mod manifest;
pub mod runtime;

pub use manifest::AdapterManifest;
pub use manifest::SandboxSpec;
pub use runtime::AdapterRuntime;
pub use runtime::RuntimeError;
