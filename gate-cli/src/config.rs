// gate-cli/src/config.rs
// ============================================================================
// Module: Gate Config
// Description: TOML configuration for the `gate` binary.
// Purpose: Resolve the filesystem layout (store root, adapter dir, Evidence
//          DB, profile registry) and Monitor bind address from a config
//          file, an env var override, or built-in defaults.
// Dependencies: serde, toml, std::fs
// ============================================================================

//! ## Overview
//! Every field is `#[serde(default)]` so an empty or partial config file is
//! valid; a field absent from the file falls back to a relative-path
//! default rather than failing to parse. The config path itself is
//! resolved the same way everywhere in the corpus: an explicit `--config`
//! flag wins, then the `GATE_CONFIG` environment variable, then
//! `gate.toml` in the current directory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Config filename used when neither `--config` nor `GATE_CONFIG` is set.
const DEFAULT_CONFIG_NAME: &str = "gate.toml";
/// Environment variable overriding the config file path.
const CONFIG_ENV_VAR: &str = "GATE_CONFIG";
/// Maximum accepted config file size.
const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum accepted config path length.
const MAX_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// Resolved configuration for a `gate` invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Root directory the Artifact Store writes sealed task bundles under.
    pub store_root: PathBuf,
    /// Directory scanned for adapter `manifest.json` files.
    pub adapter_dir: PathBuf,
    /// Path to the Evidence DB's SQLite file.
    pub evidence_db: PathBuf,
    /// Path to the `profiles.json` registry.
    pub profile_registry: PathBuf,
    /// Monitor service settings.
    pub monitor: MonitorSection,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from("gate-store"),
            adapter_dir: PathBuf::from("adapters"),
            evidence_db: PathBuf::from("gate-evidence.sqlite3"),
            profile_registry: PathBuf::from("profiles.json"),
            monitor: MonitorSection::default(),
        }
    }
}

/// Monitor service configuration section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    /// Address the Monitor's HTTP API binds to.
    pub bind: SocketAddr,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8090)),
        }
    }
}

impl GateConfig {
    /// Loads configuration using the resolution rules: an explicit `path`
    /// wins, then `GATE_CONFIG`, then `gate.toml`. A missing file at the
    /// resolved default path is not an error; it yields [`GateConfig::default`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicitly-named or env-overridden
    /// path cannot be read, exceeds the size limit, or fails to parse.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (resolved, required) = resolve_path(path)?;
        validate_path(&resolved)?;

        let bytes = match fs::read(&resolved) {
            Ok(bytes) => bytes,
            Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(err) => return Err(ConfigError::Io(resolved.display().to_string(), err)),
        };
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        Ok(config)
    }
}

/// Resolves the config path, reporting whether it was explicitly requested
/// (in which case a missing file is an error) or a fallback default (in
/// which case a missing file just means "use built-in defaults").
fn resolve_path(path: Option<&Path>) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    Ok(())
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading a [`GateConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("config io error at {0}: {1}")]
    Io(String, std::io::Error),
    /// The config file could not be parsed as TOML.
    #[error("config parse error: {0}")]
    Parse(String),
    /// The config file or path was invalid.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_default_path_yields_defaults() {
        // SAFETY-free: no GATE_CONFIG set in the test environment; a
        // nonexistent `gate.toml` in the crate root should not error.
        let config = GateConfig::load(None).unwrap();
        assert_eq!(config.monitor.bind.port(), 8090);
    }

    #[test]
    fn explicit_missing_path_is_an_error() {
        let missing = PathBuf::from("/nonexistent/gate-cli-test/gate.toml");
        assert!(GateConfig::load(Some(&missing)).is_err());
    }

    #[test]
    fn parses_overridden_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gate.toml");
        fs::write(&path, "store_root = \"/tmp/store\"\n[monitor]\nbind = \"0.0.0.0:9000\"\n").unwrap();
        let config = GateConfig::load(Some(&path)).unwrap();
        assert_eq!(config.store_root, PathBuf::from("/tmp/store"));
        assert_eq!(config.monitor.bind.port(), 9000);
    }
}
