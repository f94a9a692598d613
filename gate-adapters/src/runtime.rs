// gate-adapters/src/runtime.rs
// ============================================================================
// Module: Adapter Runtime
// Description: Capability discovery and subprocess dispatch for adapters.
// Purpose: Resolve `capability -> binary` and invoke the CLI contract with
//          a per-adapter timeout (spec.md §4.3).
// Dependencies: gate-core, std::process
// ============================================================================

//! ## Overview
//! At startup the Runtime scans an adapter directory for `manifest.json`
//! files, one per immediate subdirectory, and builds an in-memory
//! `capability -> entry path` index — the out-of-process analogue of the
//! corpus's in-process provider registry (spec.md §9). Invocation honors
//! the adapter CLI contract from spec.md §4.3/§6 and enforces the
//! manifest's declared timeout with a poll loop, since the corpus carries
//! no process-timeout crate to reach for.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Child;
use std::process::Command;
use std::process::ExitStatus;
use std::time::Duration;
use std::time::Instant;

use crate::manifest::AdapterManifest;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by the Adapter Runtime.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The adapter directory could not be scanned.
    #[error("failed to scan adapter directory {0}: {1}")]
    Scan(PathBuf, std::io::Error),
    /// A `manifest.json` existed but could not be parsed.
    #[error("malformed manifest at {0}: {1}")]
    MalformedManifest(PathBuf, serde_json::Error),
    /// No adapter registers the requested capability.
    #[error("no adapter registered for capability {0}")]
    MissingAdapter(String),
    /// A manifest declared a capability outside the fixed namespace
    /// vocabulary (`code:*`, `links:*`, `api:*`, `content:*`).
    #[error("manifest at {0} declares unknown capability namespace: {1}")]
    UnknownCapability(PathBuf, String),
    /// The adapter binary could not be spawned.
    #[error("failed to spawn adapter for {capability} at {entry}: {source}")]
    Spawn {
        /// Capability requested.
        capability: String,
        /// Resolved entry path.
        entry: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The adapter did not finish before its manifest-declared timeout and
    /// was killed.
    #[error("adapter for {0} timed out after {1:?} and was terminated")]
    Timeout(String, Duration),
}

// ============================================================================
// SECTION: Resolved Entry
// ============================================================================

#[derive(Debug, Clone)]
struct ResolvedCapability {
    entry: PathBuf,
    timeout: Duration,
}

/// Capability namespaces a manifest's `capabilities[]` entries may use
/// (spec.md §12).
const CAPABILITY_NAMESPACES: &[&str] = &["code:", "links:", "api:", "content:"];

fn is_known_capability(capability: &str) -> bool {
    CAPABILITY_NAMESPACES.iter().any(|namespace| capability.starts_with(namespace))
}

// ============================================================================
// SECTION: Adapter Runtime
// ============================================================================

/// In-memory `capability -> binary` index built by scanning an adapter
/// directory (spec.md §4.3).
#[derive(Debug, Clone, Default)]
pub struct AdapterRuntime {
    index: BTreeMap<String, ResolvedCapability>,
}

impl AdapterRuntime {
    /// Scans `adapter_dir` for one `manifest.json` per immediate
    /// subdirectory and builds the capability index.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Scan`] if the directory cannot be read,
    /// [`RuntimeError::MalformedManifest`] if a manifest file exists but
    /// does not parse, or [`RuntimeError::UnknownCapability`] if a manifest
    /// declares a capability outside the fixed namespace vocabulary.
    pub fn discover(adapter_dir: &Path) -> Result<Self, RuntimeError> {
        let mut index = BTreeMap::new();
        let entries = fs::read_dir(adapter_dir).map_err(|err| RuntimeError::Scan(adapter_dir.to_path_buf(), err))?;
        for entry in entries {
            let entry = entry.map_err(|err| RuntimeError::Scan(adapter_dir.to_path_buf(), err))?;
            let dir = entry.path();
            if !dir.is_dir() {
                continue;
            }
            let manifest_path = dir.join("manifest.json");
            let Ok(bytes) = fs::read(&manifest_path) else {
                continue;
            };
            let manifest: AdapterManifest =
                serde_json::from_slice(&bytes).map_err(|err| RuntimeError::MalformedManifest(manifest_path.clone(), err))?;
            let entry_path = dir.join(&manifest.entry);
            let timeout = Duration::from_secs(manifest.sandbox.timeout_s);
            for capability in &manifest.capabilities {
                if !is_known_capability(capability) {
                    return Err(RuntimeError::UnknownCapability(manifest_path, capability.clone()));
                }
                index.insert(
                    capability.clone(),
                    ResolvedCapability {
                        entry: entry_path.clone(),
                        timeout,
                    },
                );
            }
        }
        Ok(Self {
            index,
        })
    }

    /// Returns the resolved binary path for `capability`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::MissingAdapter`] if no manifest declared
    /// this capability.
    pub fn resolve(&self, capability: &str) -> Result<&Path, RuntimeError> {
        self.index
            .get(capability)
            .map(|resolved| resolved.entry.as_path())
            .ok_or_else(|| RuntimeError::MissingAdapter(capability.to_string()))
    }

    /// Invokes the adapter registered for `capability` using the CLI
    /// contract from spec.md §4.3/§6, killing it if it exceeds its
    /// manifest's declared timeout.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::MissingAdapter`], [`RuntimeError::Spawn`],
    /// or [`RuntimeError::Timeout`].
    pub fn invoke(
        &self,
        capability: &str,
        task_dir: &Path,
        commitment_path: &Path,
        claim_path: &Path,
        profile_path: &Path,
    ) -> Result<ExitStatus, RuntimeError> {
        let resolved = self.index.get(capability).ok_or_else(|| RuntimeError::MissingAdapter(capability.to_string()))?;

        let mut child: Child = Command::new(&resolved.entry)
            .arg(capability)
            .arg("--task-dir")
            .arg(task_dir)
            .arg("--commitment")
            .arg(commitment_path)
            .arg("--claim")
            .arg(claim_path)
            .arg("--profile")
            .arg(profile_path)
            .spawn()
            .map_err(|source| RuntimeError::Spawn {
                capability: capability.to_string(),
                entry: resolved.entry.clone(),
                source,
            })?;

        wait_with_timeout(&mut child, resolved.timeout)
            .ok_or_else(|| RuntimeError::Timeout(capability.to_string(), resolved.timeout))
    }

    /// Returns every capability currently registered, sorted.
    #[must_use]
    pub fn capabilities(&self) -> Vec<&str> {
        self.index.keys().map(String::as_str).collect()
    }
}

/// Polls `child` until it exits or `timeout` elapses; kills and returns
/// `None` on timeout.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Option<ExitStatus> {
    let start = Instant::now();
    let poll_interval = Duration::from_millis(50);
    loop {
        if let Ok(Some(status)) = child.try_wait() {
            return Some(status);
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            let _ = child.wait();
            return None;
        }
        std::thread::sleep(poll_interval);
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, name: &str, capabilities: &[&str]) {
        let adapter_dir = dir.join(name);
        fs::create_dir_all(&adapter_dir).unwrap();
        let manifest = serde_json::json!({
            "name": name,
            "version": "0.1.0",
            "entry": "run.sh",
            "capabilities": capabilities,
            "sandbox": {"tools": [], "timeout_s": 30, "network": false},
        });
        fs::write(adapter_dir.join("manifest.json"), serde_json::to_vec(&manifest).unwrap()).unwrap();
    }

    #[test]
    fn discover_builds_capability_index() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "code", &["code:diff", "code:lint"]);
        write_manifest(dir.path(), "content", &["content:scan"]);

        let runtime = AdapterRuntime::discover(dir.path()).unwrap();
        assert!(runtime.resolve("code:diff").is_ok());
        assert!(runtime.resolve("content:scan").is_ok());
        assert!(matches!(runtime.resolve("api:check"), Err(RuntimeError::MissingAdapter(_))));
    }

    #[test]
    fn discover_ignores_directories_without_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("not-an-adapter")).unwrap();
        let runtime = AdapterRuntime::discover(dir.path()).unwrap();
        assert!(runtime.capabilities().is_empty());
    }

    #[test]
    fn discover_rejects_unknown_capability_namespace() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "rogue", &["shell:exec"]);
        let err = AdapterRuntime::discover(dir.path()).unwrap_err();
        assert!(matches!(err, RuntimeError::UnknownCapability(_, namespace) if namespace == "shell:exec"));
    }
}
