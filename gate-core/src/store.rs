// gate-core/src/store.rs
// ============================================================================
// Module: Artifact Store
// Description: Filesystem layout per task; atomic writes; bundle sealing.
// Purpose: Own the task directory exclusively (spec.md §3 Ownership).
// Dependencies: crate::{hashing, identifiers, model}, std::fs
// ============================================================================

//! ## Overview
//! One directory per task (`<root>/<task_id>/`). Writes are atomic
//! (write-temp + rename) and re-writing an existing artifact path is
//! rejected unless an explicit attempt suffix is used, matching spec.md
//! §4.1's append-only discipline. After adapters complete, `seal` enumerates
//! every file under the task directory (except the bundle index itself),
//! hashes it, and writes `artifacts.json` + `checksums.sha256`. `verify`
//! recomputes hashes and reports the first mismatch, used both by the Gate
//! Engine's integrity check (spec.md §4.8 step 1) and by the standalone
//! `gate verify-bundle` command.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use crate::hashing::hash_bundle_entry;
use crate::identifiers::TaskId;
use crate::model::ArtifactBundle;
use crate::model::ArtifactEntry;
use crate::model::BUNDLE_SCHEMA;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Filename of the bundle index written by `seal`.
pub const ARTIFACTS_INDEX_FILE: &str = "artifacts.json";
/// Filename of the flat checksum listing written alongside the index.
pub const CHECKSUMS_FILE: &str = "checksums.sha256";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the Artifact Store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Underlying filesystem operation failed.
    #[error("io error at {path}: {source}")]
    Io {
        /// Path the operation was attempted against.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
    /// Attempted to overwrite an existing artifact without an attempt
    /// suffix.
    #[error("artifact already exists: {0}")]
    AlreadyExists(PathBuf),
    /// A sealed bundle's recorded hash does not match the file on disk.
    #[error("checksum mismatch for {path}: expected {expected}, found {actual}")]
    ChecksumMismatch {
        /// Path relative to the task directory.
        path: String,
        /// Hash recorded in `artifacts.json`.
        expected: String,
        /// Hash recomputed from the file on disk.
        actual: String,
    },
    /// `artifacts.json` could not be parsed.
    #[error("malformed bundle index: {0}")]
    MalformedIndex(String),
    /// `artifacts.json` is missing.
    #[error("bundle index not found; task was never sealed")]
    NotSealed,
}

// ============================================================================
// SECTION: Artifact Store
// ============================================================================

/// Filesystem-backed Artifact Store rooted at `<root>`.
///
/// # Invariants
/// - Each task owns exactly one directory, `<root>/<task_id>/`.
/// - No component other than the Orchestrator writes into a task
///   directory (spec.md §3 Ownership).
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Opens (or lazily creates) an Artifact Store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Returns the directory owned by `task_id`, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn task_dir(&self, task_id: &TaskId) -> Result<PathBuf, StoreError> {
        let dir = self.root.join(task_id.as_str());
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Writes `bytes` atomically to `relative_path` inside the task
    /// directory. Overwriting an existing file is rejected unless
    /// `allow_overwrite` is set (used for attempt-suffixed reruns).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the target exists and
    /// overwrite was not requested, or [`StoreError::Io`] on filesystem
    /// failure.
    pub fn put(
        &self,
        task_id: &TaskId,
        relative_path: &str,
        bytes: &[u8],
        allow_overwrite: bool,
    ) -> Result<PathBuf, StoreError> {
        let dir = self.task_dir(task_id)?;
        let target = dir.join(relative_path);

        if target.exists() && !allow_overwrite {
            return Err(StoreError::AlreadyExists(target));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp = target.with_extension(format!(
            "{}.tmp",
            target.extension().and_then(|ext| ext.to_str()).unwrap_or("bin")
        ));
        fs::write(&tmp, bytes).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &target).map_err(|source| StoreError::Io {
            path: target.clone(),
            source,
        })?;
        Ok(target)
    }

    /// Enumerates every file under the task directory (sorted, relative
    /// paths, excluding the bundle index files themselves), hashes each,
    /// and writes `artifacts.json` + `checksums.sha256`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] on filesystem failure.
    pub fn seal(&self, task_id: &TaskId) -> Result<ArtifactBundle, StoreError> {
        let dir = self.task_dir(task_id)?;
        let mut entries = Vec::new();
        collect_files(&dir, &dir, &mut entries)?;
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let mut bundle = ArtifactBundle::new(task_id.clone());
        bundle.entries = entries;

        let index_bytes = serde_json::to_vec_pretty(&bundle)
            .map_err(|source| StoreError::Io {
                path: dir.join(ARTIFACTS_INDEX_FILE),
                source: io::Error::new(io::ErrorKind::InvalidData, source),
            })?;
        self.put(task_id, ARTIFACTS_INDEX_FILE, &index_bytes, true)?;

        let checksums = render_checksums(&bundle);
        self.put(task_id, CHECKSUMS_FILE, checksums.as_bytes(), true)?;

        Ok(bundle)
    }

    /// Loads the sealed bundle index for `task_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotSealed`] if no index exists, or
    /// [`StoreError::MalformedIndex`] if it cannot be parsed.
    pub fn load_bundle(&self, task_id: &TaskId) -> Result<ArtifactBundle, StoreError> {
        let dir = self.task_dir(task_id)?;
        let index_path = dir.join(ARTIFACTS_INDEX_FILE);
        let bytes = fs::read(&index_path).map_err(|_| StoreError::NotSealed)?;
        let bundle: ArtifactBundle =
            serde_json::from_slice(&bytes).map_err(|err| StoreError::MalformedIndex(err.to_string()))?;
        if bundle.bundle_schema != BUNDLE_SCHEMA {
            return Err(StoreError::MalformedIndex(format!(
                "unsupported bundle schema: {}",
                bundle.bundle_schema
            )));
        }
        crate::schema::validate_artifact_bundle(&bundle).map_err(|err| StoreError::MalformedIndex(err.to_string()))?;
        Ok(bundle)
    }

    /// Recomputes hashes for every entry in the sealed bundle and returns
    /// the first mismatch, or `Ok(())` if all match.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotSealed`]/[`StoreError::MalformedIndex`] as
    /// per [`Self::load_bundle`], or [`StoreError::ChecksumMismatch`] for
    /// the first artifact whose on-disk hash differs from the recorded one.
    pub fn verify(&self, task_id: &TaskId) -> Result<(), StoreError> {
        let bundle = self.load_bundle(task_id)?;
        let dir = self.task_dir(task_id)?;
        for entry in &bundle.entries {
            let path = dir.join(&entry.path);
            let bytes = fs::read(&path).map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            let (_, actual) = hash_bundle_entry(&bytes);
            if actual != entry.sha256 {
                return Err(StoreError::ChecksumMismatch {
                    path: entry.path.clone(),
                    expected: entry.sha256.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }

    /// Returns the task directory path without creating it.
    #[must_use]
    pub fn peek_task_dir(&self, task_id: &TaskId) -> PathBuf {
        self.root.join(task_id.as_str())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<ArtifactEntry>) -> Result<(), StoreError> {
    let read_dir = fs::read_dir(dir).map_err(|source| StoreError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in read_dir {
        let entry = entry.map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .map_err(|_| StoreError::MalformedIndex("path escaped task root".to_string()))?
            .to_string_lossy()
            .replace('\\', "/");
        if relative == ARTIFACTS_INDEX_FILE || relative == CHECKSUMS_FILE {
            continue;
        }
        let bytes = fs::read(&path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;
        let (size, sha256) = hash_bundle_entry(&bytes);
        out.push(ArtifactEntry {
            path: relative,
            size,
            sha256,
        });
    }
    Ok(())
}

fn render_checksums(bundle: &ArtifactBundle) -> String {
    let mut out = String::new();
    for entry in &bundle.entries {
        out.push_str(&entry.sha256);
        out.push_str("  ");
        out.push_str(&entry.path);
        out.push('\n');
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn task_id() -> TaskId {
        TaskId::new("t-1").unwrap()
    }

    #[test]
    fn put_rejects_overwrite_without_flag() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let id = task_id();
        store.put(&id, "a.json", b"{}", false).unwrap();
        let err = store.put(&id, "a.json", b"{}", false).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
    }

    #[test]
    fn seal_then_verify_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let id = task_id();
        store.put(&id, "diff.json", b"{\"a\":1}", false).unwrap();
        store.put(&id, "nested/lint.json", b"{}", false).unwrap();
        let bundle = store.seal(&id).unwrap();
        assert_eq!(bundle.entries.len(), 2);
        assert_eq!(bundle.entries[0].path, "diff.json");
        assert_eq!(bundle.entries[1].path, "nested/lint.json");
        store.verify(&id).unwrap();
    }

    #[test]
    fn verify_detects_tamper() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let id = task_id();
        store.put(&id, "links/statuses.json", b"{\"https://a\":200}", false).unwrap();
        store.seal(&id).unwrap();

        let tampered_path = store.peek_task_dir(&id).join("links/statuses.json");
        fs::write(&tampered_path, b"{\"https://a\":500}").unwrap();

        let err = store.verify(&id).unwrap_err();
        assert!(matches!(err, StoreError::ChecksumMismatch { .. }));
    }

    #[test]
    fn verify_without_seal_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path());
        let id = task_id();
        let err = store.verify(&id).unwrap_err();
        assert!(matches!(err, StoreError::NotSealed));
    }
}
