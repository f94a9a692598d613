// gate-evidence/src/lib.rs
// ============================================================================
// Crate: gate-evidence
// Description: SQLite-backed Evidence DB (spec.md §4.2).
// Purpose: Persist per-unit and metrics records with idempotent upserts.
// ============================================================================

//! ## Overview
//! Two tables: `units(task_id, unit_id, unit_type, claimed, verified,
//! reason, created_at)` keyed on `(task_id, unit_id)`, and
//! `metrics(task_id, k, v, created_at)`. Upserts are idempotent so re-running
//! a task's Gate evaluation never explodes row counts (spec.md §8: "Upserting
//! a Verdict twice into the Evidence DB leaves exactly one row per
//! `(task_id, unit_id)`").

mod db;
mod queries;

pub use db::EvidenceDb;
pub use db::EvidenceDbError;
pub use queries::DailyAggregate;
pub use queries::TaskSummary;
pub use queries::UnitTypeCount;
