// gate-core/src/hashing.rs
// ============================================================================
// Module: Canonical Hashing
// Description: RFC 8785 JSON canonicalization and content hashing utilities.
// Purpose: Provide deterministic hashes for artifacts and verdict bytes.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! The gate hashes all canonical JSON using RFC 8785 (JCS) so that two runs
//! over the same bundle produce byte-identical digests (spec.md §8:
//! "re-running the Gate on the unchanged bundle yields bit-identical
//! verdict.json"). Binary artifacts (patches, XML reports) are hashed
//! directly over raw bytes instead.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Supported hash algorithms for gate artifacts.
///
/// # Invariants
/// - Only one variant exists today; the enum exists so `artifacts.json`
///   entries remain self-describing if a second algorithm is ever added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256 hashing.
    Sha256,
}

/// Default hash algorithm for the gate.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

// ============================================================================
// SECTION: Hash Digest
// ============================================================================

/// Deterministic content hash representation.
///
/// # Invariants
/// - `value` is lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigest {
    /// Hash algorithm identifier.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub value: String,
}

impl HashDigest {
    /// Creates a new digest from raw bytes.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            value: hex_encode(bytes),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing canonical hashes.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Hashes canonical JSON using the provided algorithm.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn hash_canonical_json<T: Serialize + ?Sized>(
    algorithm: HashAlgorithm,
    value: &T,
) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(algorithm, &bytes))
}

/// Hashes raw bytes using the provided algorithm.
#[must_use]
pub fn hash_bytes(algorithm: HashAlgorithm, bytes: &[u8]) -> HashDigest {
    match algorithm {
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(bytes);
            let digest = hasher.finalize();
            HashDigest::new(HashAlgorithm::Sha256, &digest)
        }
    }
}

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Returns the `(size, sha256)` pair the Artifact Store records for one
/// sealed file (spec.md §4.1: `ArtifactEntry.size` + `ArtifactEntry.sha256`),
/// using [`DEFAULT_HASH_ALGORITHM`] and the same digest both `seal` and
/// `verify` recompute.
#[must_use]
pub fn hash_bundle_entry(bytes: &[u8]) -> (u64, String) {
    (bytes.len() as u64, hash_bytes(DEFAULT_HASH_ALGORITHM, bytes).value)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_bytes_is_deterministic() {
        let a = hash_bytes(HashAlgorithm::Sha256, b"hello");
        let b = hash_bytes(HashAlgorithm::Sha256, b"hello");
        assert_eq!(a, b);
    }

    #[test]
    fn canonical_json_ignores_key_order() {
        let a = serde_json::json!({"b": 1, "a": 2});
        let b = serde_json::json!({"a": 2, "b": 1});
        let hash_a = hash_canonical_json(HashAlgorithm::Sha256, &a).unwrap();
        let hash_b = hash_canonical_json(HashAlgorithm::Sha256, &b).unwrap();
        assert_eq!(hash_a, hash_b);
    }

    #[test]
    fn hex_encoding_is_lowercase() {
        let digest = hash_bytes(HashAlgorithm::Sha256, b"x");
        assert_eq!(digest.value, digest.value.to_ascii_lowercase());
    }

    #[test]
    fn bundle_entry_reports_size_and_matching_digest() {
        let (size, sha256) = hash_bundle_entry(b"artifact contents");
        assert_eq!(size, "artifact contents".len() as u64);
        assert_eq!(sha256, hash_bytes(DEFAULT_HASH_ALGORITHM, b"artifact contents").value);
    }
}
