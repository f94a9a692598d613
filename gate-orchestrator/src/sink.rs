// gate-orchestrator/src/sink.rs
// ============================================================================
// Module: sink
// Description: Best-effort verdict push after persistence (spec.md §4.9-§4.10).
// ============================================================================

//! The Monitor Service is "a projection of the DB, not authoritative for
//! the verdict" (spec.md §4.10): a push failure must never un-decide a
//! task. `VerdictSink` is the seam that lets the Orchestrator hand a
//! decided verdict to whatever delivers it onward without depending on
//! `gate-monitor` itself, mirroring the injected-trait-object shape of
//! `decision-gate-broker`'s `Sink` trait.

use gate_core::Verdict;

/// A delivery failure. Carries no I/O detail beyond a display message:
/// the Orchestrator only logs this, it never acts on it.
#[derive(Debug, thiserror::Error)]
#[error("verdict sink delivery failed: {0}")]
pub struct SinkError(pub String);

/// Delivers a decided verdict somewhere outside the Evidence DB (e.g. an
/// HTTP push to the Monitor Service's `POST /api/verdict`). Implementations
/// must not block the task's state transition to `persisted`; the
/// Orchestrator calls this after `persist_verdict` has already succeeded
/// and treats a failure here as best-effort.
pub trait VerdictSink: Send + Sync {
    /// Attempts delivery. Errors are logged by the caller and otherwise
    /// ignored — they never cause the task to be re-decided or reverted.
    fn push(&self, verdict: &Verdict) -> Result<(), SinkError>;
}

/// A sink that does nothing. The default when no Monitor push is wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl VerdictSink for NoopSink {
    fn push(&self, _verdict: &Verdict) -> Result<(), SinkError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_core::TaskId;
    use gate_core::Timestamp;
    use gate_core::VerdictPolicy;
    use gate_core::VerdictStatus;

    #[test]
    fn noop_sink_always_succeeds() {
        let verdict = Verdict {
            task_id: TaskId::new("t-1").expect("valid id"),
            status: VerdictStatus::Pass,
            units_expected: 1,
            units_verified: 1,
            per_unit: Vec::new(),
            reasons: Vec::new(),
            metrics: std::collections::BTreeMap::new(),
            policy: VerdictPolicy {
                profile: "default".to_string(),
                thresholds: std::collections::BTreeMap::new(),
            },
            timestamp: Timestamp::now(),
        };
        assert!(NoopSink.push(&verdict).is_ok());
    }
}
