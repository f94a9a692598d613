// gate-orchestrator/src/telemetry.rs
// ============================================================================
// Module: telemetry
// Description: Dependency-light per-stage metrics (grounded on
//              decision-gate-mcp/src/telemetry.rs).
// ============================================================================

//! No metrics crate is pulled in for this: a typed event plus a default
//! no-op sink is enough for a library that other binaries (`gate-cli`,
//! `gate-monitor`) can wire into whatever metrics backend they already
//! have, the same split the corpus's MCP server uses for its own request
//! telemetry.

use std::time::Duration;

/// One stage of a single task run (spec.md §4.9's state machine, recast as
/// instrumentation points rather than persisted states).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorStage {
    /// Claim ingestion and schema validation.
    Claim,
    /// Adapter plan execution.
    Plan,
    /// Bundle sealing.
    Seal,
    /// Gate Engine evaluation.
    Gate,
    /// Evidence DB persistence.
    Persist,
    /// Best-effort Monitor push.
    Push,
}

impl OrchestratorStage {
    /// Stable label for metric export.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Claim => "claim",
            Self::Plan => "plan",
            Self::Seal => "seal",
            Self::Gate => "gate",
            Self::Persist => "persist",
            Self::Push => "push",
        }
    }
}

/// Outcome of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestratorOutcome {
    /// The stage completed without a fatal condition.
    Ok,
    /// The stage produced a fatal short-circuit (`MISSING_ADAPTER`,
    /// cancellation before seal, etc).
    Fatal,
    /// The stage was skipped (e.g. an optional adapter capability absent).
    Skipped,
}

impl OrchestratorOutcome {
    /// Stable label for metric export.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Fatal => "fatal",
            Self::Skipped => "skipped",
        }
    }
}

/// Latency histogram buckets for stage timings, in milliseconds.
pub const STAGE_LATENCY_BUCKETS_MS: [u64; 7] = [5, 10, 25, 50, 100, 500, 2_000];

/// One recorded stage timing.
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorMetricEvent {
    /// Stage this event describes.
    pub stage: OrchestratorStage,
    /// How the stage concluded.
    pub outcome: OrchestratorOutcome,
    /// Wall-clock time spent in the stage.
    pub duration: Duration,
}

/// Sink for per-stage metrics. Implementations must not block task
/// completion; the Orchestrator calls this synchronously between stages.
pub trait OrchestratorMetrics: Send + Sync {
    /// Records one stage's outcome and duration.
    fn record_stage(&self, event: OrchestratorMetricEvent);
}

/// Records nothing. The default when no metrics backend is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl OrchestratorMetrics for NoopMetrics {
    fn record_stage(&self, _event: OrchestratorMetricEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_labels_are_stable() {
        assert_eq!(OrchestratorStage::Plan.as_str(), "plan");
        assert_eq!(OrchestratorOutcome::Fatal.as_str(), "fatal");
    }

    #[test]
    fn noop_metrics_accepts_any_event() {
        let event = OrchestratorMetricEvent {
            stage: OrchestratorStage::Gate,
            outcome: OrchestratorOutcome::Ok,
            duration: Duration::from_millis(12),
        };
        NoopMetrics.record_stage(event);
    }
}
