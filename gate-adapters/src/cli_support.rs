// gate-adapters/src/cli_support.rs
// ============================================================================
// Module: Adapter CLI Support
// Description: Shared argument parsing and I/O helpers for adapter binaries.
// Purpose: Keep the four built-in adapters honoring one CLI contract
//          (spec.md §4.3, §6) without repeating boilerplate.
// Dependencies: clap, gate-core, serde_json
// ============================================================================

//! ## Overview
//! Every adapter binary is invoked as
//! `<adapter-bin> <capability> --task-dir <dir> --commitment <file>
//! --claim <file> --profile <file>` (spec.md §6). This module parses that
//! contract once and provides the read/write helpers each adapter's
//! `main` calls directly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use clap::Parser;
use gate_core::ArtifactStore;
use gate_core::Claim;
use gate_core::Commitment;
use gate_core::Profile;
use gate_core::TaskId;
use serde::Serialize;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while an adapter binary parses its inputs or writes its
/// outputs.
#[derive(Debug, thiserror::Error)]
pub enum AdapterCliError {
    /// An input file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// An input file existed but did not parse as JSON.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_json::Error,
    },
    /// Writing an artifact through the store failed.
    #[error("failed to write artifact: {0}")]
    Store(#[from] gate_core::StoreError),
    /// Serializing an artifact to JSON failed.
    #[error("failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
    /// `--task-dir` did not end in a non-empty directory name to use as
    /// the task identifier.
    #[error("task directory has no usable name: {0}")]
    InvalidTaskDir(PathBuf),
}

// ============================================================================
// SECTION: Arguments
// ============================================================================

/// The mandatory adapter CLI contract (spec.md §4.3, §6).
#[derive(Debug, Parser)]
#[command(name = "adapter", about = "Verification Gate adapter CLI contract")]
pub struct AdapterArgs {
    /// Capability to execute (e.g. `code:diff`).
    pub capability: String,
    /// Task directory the adapter writes artifacts into.
    #[arg(long = "task-dir")]
    pub task_dir: PathBuf,
    /// Path to the sealed `commitment.json`.
    #[arg(long)]
    pub commitment: PathBuf,
    /// Path to `claim.json`.
    #[arg(long)]
    pub claim: PathBuf,
    /// Path to the resolved profile thresholds for this task.
    #[arg(long)]
    pub profile: PathBuf,
}

impl AdapterArgs {
    /// Opens an [`ArtifactStore`] rooted one level above `task_dir`, since
    /// the store owns `<root>/<task_id>/`, not the task directory itself.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterCliError::InvalidTaskDir`] if `task_dir` has no
    /// usable directory name.
    pub fn store_and_task_id(&self) -> Result<(ArtifactStore, TaskId), AdapterCliError> {
        let task_id_str = self
            .task_dir
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| AdapterCliError::InvalidTaskDir(self.task_dir.clone()))?;
        let root = self.task_dir.parent().unwrap_or(&self.task_dir);
        let task_id =
            TaskId::new(task_id_str).map_err(|_| AdapterCliError::InvalidTaskDir(self.task_dir.clone()))?;
        Ok((ArtifactStore::new(root), task_id))
    }
}

// ============================================================================
// SECTION: Loaders
// ============================================================================

/// Reads and parses `commitment.json`.
///
/// # Errors
///
/// Returns [`AdapterCliError`] if the file cannot be read or parsed.
pub fn load_commitment(path: &Path) -> Result<Commitment, AdapterCliError> {
    read_json(path)
}

/// Reads and parses `claim.json`, returning `None` if it is absent (the
/// Orchestrator never writes one when no Claim arrived).
///
/// # Errors
///
/// Returns [`AdapterCliError::Parse`] if the file exists but is invalid.
pub fn load_claim(path: &Path) -> Result<Option<Claim>, AdapterCliError> {
    if !path.exists() {
        return Ok(None);
    }
    read_json(path).map(Some)
}

/// Reads and parses the resolved profile for this task.
///
/// # Errors
///
/// Returns [`AdapterCliError`] if the file cannot be read or parsed.
pub fn load_profile(path: &Path) -> Result<Profile, AdapterCliError> {
    read_json(path)
}

fn read_json<T: for<'de> serde::Deserialize<'de>>(path: &Path) -> Result<T, AdapterCliError> {
    let bytes = fs::read(path).map_err(|source| AdapterCliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|source| AdapterCliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Serializes `value` and writes it atomically to `relative_path` inside
/// the task directory, overwriting any prior run's output (adapters are
/// re-runnable; spec.md §4.1).
///
/// # Errors
///
/// Returns [`AdapterCliError`] on serialization or store failure.
pub fn write_artifact<T: Serialize>(
    store: &ArtifactStore,
    task_id: &TaskId,
    relative_path: &str,
    value: &T,
) -> Result<(), AdapterCliError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    store.put(task_id, relative_path, &bytes, true)?;
    Ok(())
}
