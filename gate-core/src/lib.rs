// gate-core/src/lib.rs
// ============================================================================
// Crate: gate-core
// Description: Data model, canonical hashing, and the Artifact Store.
// Purpose: Shared, I/O-light foundation for every other gate crate.
// ============================================================================

//! ## Overview
//! `gate-core` defines the record shapes from spec.md §3 (`Task`,
//! `Commitment`, `Claim`, `Artifact`, `Unit`, `Verdict`, `Profile`), the
//! canonical hashing utilities that make the bundle and verdict
//! reproducible, and the filesystem-backed Artifact Store. It performs no
//! network or subprocess I/O.

pub mod hashing;
pub mod identifiers;
pub mod model;
pub mod profile;
pub mod schema;
pub mod store;
pub mod time;

pub use hashing::HashAlgorithm;
pub use hashing::HashDigest;
pub use identifiers::ReasonCode;
pub use identifiers::TaskId;
pub use identifiers::UnitId;
pub use identifiers::UnitType;
pub use model::ArtifactBundle;
pub use model::ArtifactEntry;
pub use model::CLAIM_SCHEMA;
pub use model::Claim;
pub use model::ClaimBody;
pub use model::ClaimDeclared;
pub use model::ClaimScope;
pub use model::Commitment;
pub use model::CommitmentScope;
pub use model::TaskState;
pub use model::TaskType;
pub use model::Unit;
pub use model::Verdict;
pub use model::VerdictPolicy;
pub use model::VerdictStatus;
pub use profile::FunctionCertainty;
pub use profile::Profile;
pub use profile::ProfileError;
pub use profile::ProfileRegistry;
pub use schema::SchemaError;
pub use schema::validate_artifact_bundle;
pub use schema::validate_claim;
pub use schema::validate_verdict;
pub use store::ArtifactStore;
pub use store::StoreError;
pub use time::Timestamp;
