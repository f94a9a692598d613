// gate-orchestrator/src/lib.rs
// ============================================================================
// Crate: gate-orchestrator
// Description: Task lifecycle state machine (spec.md §4.9).
// Purpose: Wire the Artifact Store, Adapter Runtime, Gate Engine, and
//          Evidence DB into one per-task run without owning their
//          internals.
// ============================================================================

//! ## Overview
//! `gate-orchestrator` drives a single task from `pending` through
//! `persisted`: it writes the Commitment/Claim into the task directory it
//! exclusively owns, resolves and runs the adapter plan for the task's
//! type, seals the bundle, runs the Gate, and persists + pushes the
//! resulting verdict. It never evaluates a verdict itself (that is
//! `gate-engine`'s job) and never interprets artifact bytes (that is the
//! adapters' job); it only sequences the handoffs between them, the way
//! `decision-gate-broker::CompositeBroker` sequences source resolution and
//! sink delivery without inspecting payload semantics itself.

pub mod plan;
pub mod sink;
pub mod telemetry;

mod orchestrator;

pub use orchestrator::CancelToken;
pub use orchestrator::Orchestrator;
pub use orchestrator::OrchestratorError;
pub use orchestrator::RunOutcome;
pub use orchestrator::outcome_state;
pub use plan::AdapterPlan;
pub use plan::PlanStep;
pub use sink::NoopSink;
pub use sink::SinkError;
pub use sink::VerdictSink;
pub use telemetry::NoopMetrics;
pub use telemetry::OrchestratorMetrics;
