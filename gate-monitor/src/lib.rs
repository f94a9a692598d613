// gate-monitor/src/lib.rs
// ============================================================================
// Crate: gate-monitor
// Description: Read/push HTTP API over the Evidence DB (spec.md §4.10).
// Purpose: Serve verdict/task views and accept best-effort verdict pushes.
// ============================================================================

//! ## Overview
//! The Monitor is "a projection of the DB, not authoritative for the
//! verdict" (spec.md §4.10): every GET is a read of `gate-evidence`, and
//! `POST /api/verdict` is an idempotent upsert through the same
//! `persist_verdict` path the Orchestrator itself uses. Losing the Monitor
//! loses visibility, never correctness.

mod client;
mod server;

pub use client::HttpVerdictSink;
pub use client::HttpVerdictSinkError;
pub use server::MonitorError;
pub use server::build_router;
pub use server::serve;
