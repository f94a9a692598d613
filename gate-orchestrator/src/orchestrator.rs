// gate-orchestrator/src/orchestrator.rs
// ============================================================================
// Module: orchestrator
// Description: Task lifecycle state machine (spec.md §4.9).
// Purpose: Drive one task from `pending` to `persisted`.
// Dependencies: gate-adapters, gate-core, gate-engine, gate-evidence
// ============================================================================

//! ## Overview
//! [`Orchestrator::run_task`] is the single entry point. It owns nothing
//! the other crates don't already own: the Artifact Store's task
//! directory, the Adapter Runtime's capability index, the Gate Engine's
//! pure evaluation, and the Evidence DB's upserts are all resolved
//! through injected handles, mirroring how
//! `decision-gate-broker::CompositeBroker` resolves a source and delivers
//! to a sink without holding their internals itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use gate_adapters::AdapterRuntime;
use gate_adapters::RuntimeError;
use gate_core::ArtifactStore;
use gate_core::Claim;
use gate_core::Commitment;
use gate_core::Profile;
use gate_core::ReasonCode;
use gate_core::StoreError;
use gate_core::TaskState;
use gate_core::Timestamp;
use gate_core::Verdict;
use gate_core::VerdictPolicy;
use gate_core::VerdictStatus;
use gate_engine::GateEngine;
use gate_engine::GateError;
use gate_evidence::EvidenceDb;
use gate_evidence::EvidenceDbError;

use crate::plan::AdapterPlan;
use crate::sink::NoopSink;
use crate::sink::VerdictSink;
use crate::telemetry::NoopMetrics;
use crate::telemetry::OrchestratorMetricEvent;
use crate::telemetry::OrchestratorMetrics;
use crate::telemetry::OrchestratorOutcome;
use crate::telemetry::OrchestratorStage;

/// Number of times a bare process-spawn failure is retried before the
/// adapter invocation is treated as fatal. Spawn failures are the only
/// retried class: a timeout means the adapter already consumed its
/// declared budget and retrying it would not change that.
const ADAPTER_SPAWN_RETRIES: u32 = 3;
/// Base backoff between spawn retries, doubled each attempt up to a 2s cap.
const ADAPTER_SPAWN_BACKOFF_BASE_MS: u64 = 200;
const ADAPTER_SPAWN_BACKOFF_CAP_MS: u64 = 2_000;

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// A shared, cooperative cancellation flag. Checked between adapter plan
/// steps; never interrupts a single adapter invocation already in flight.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not yet cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns whether cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while running a task. These represent host/infrastructure
/// problems, not verdict-worthy facts — verdict-worthy facts (a missing
/// Claim, a missing adapter, a failed check) are always captured as a
/// [`Verdict`] instead of an `Err`.
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// The Artifact Store reported an I/O problem.
    #[error("artifact store error: {0}")]
    Store(#[from] StoreError),
    /// The Gate Engine could not evaluate the sealed bundle.
    #[error("gate engine error: {0}")]
    Gate(#[from] GateError),
    /// The Evidence DB could not be written.
    #[error("evidence db error: {0}")]
    Evidence(#[from] EvidenceDbError),
    /// A Commitment or Claim could not be serialized into the task
    /// directory.
    #[error("failed to serialize task input: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ============================================================================
// SECTION: Run Outcome
// ============================================================================

/// The result of [`Orchestrator::run_task`].
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The task reached `persisted` with a verdict.
    Persisted(Verdict),
    /// The task was cancelled before its bundle was sealed; no verdict was
    /// ever produced, per spec.md §4.9 ("cancellable at any point").
    CancelledBeforeMeasurement,
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Wires the Artifact Store, Adapter Runtime, Gate Engine, and Evidence DB
/// into one per-task run (spec.md §4.9).
pub struct Orchestrator {
    store: ArtifactStore,
    runtime: AdapterRuntime,
    evidence: EvidenceDb,
    sink: Arc<dyn VerdictSink>,
    metrics: Arc<dyn OrchestratorMetrics>,
}

impl Orchestrator {
    /// Builds an Orchestrator over the given Artifact Store, Adapter
    /// Runtime, and Evidence DB, pushing decided verdicts nowhere
    /// (`NoopSink`) and recording no metrics (`NoopMetrics`).
    #[must_use]
    pub fn new(store: ArtifactStore, runtime: AdapterRuntime, evidence: EvidenceDb) -> Self {
        Self {
            store,
            runtime,
            evidence,
            sink: Arc::new(NoopSink),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Replaces the verdict sink used for best-effort Monitor push.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn VerdictSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replaces the metrics recorder.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn OrchestratorMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Runs one task from `pending` to `persisted` (or to an early
    /// cancellation), per the state machine in spec.md §4.9.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError`] for infrastructure failures (the
    /// task directory is unwritable, the Evidence DB is unreachable).
    /// Verdict-worthy facts are always returned as `Ok` with a `Verdict`
    /// carrying the relevant reason code.
    pub fn run_task(
        &self,
        commitment: &Commitment,
        claim: Option<&Claim>,
        profile: &Profile,
        cancel: &CancelToken,
    ) -> Result<RunOutcome, OrchestratorError> {
        let task_id = &commitment.task_id;
        let task_dir = self.store.task_dir(task_id)?;
        let commitment_path = task_dir.join("commitment.json");
        let claim_path = task_dir.join("claim.json");
        let profile_path = task_dir.join("profile.json");

        self.store.put(task_id, "commitment.json", &serde_json::to_vec_pretty(commitment)?, true)?;
        self.store.put(task_id, "profile.json", &serde_json::to_vec_pretty(profile)?, true)?;

        let valid_claim = claim.filter(|claim| claim.has_valid_schema() && gate_core::validate_claim(claim).is_ok());
        self.record_outcome(
            OrchestratorStage::Claim,
            if valid_claim.is_some() { OrchestratorOutcome::Ok } else { OrchestratorOutcome::Fatal },
            Duration::ZERO,
        );

        let Some(claim) = valid_claim else {
            // spec.md §4.9: a missing/invalid Claim short-circuits before
            // measurement ever begins; the Gate Engine's own `None` path
            // produces the MISSING_CLAIM verdict.
            let verdict = GateEngine::evaluate(&self.store, commitment, None, profile)?;
            return self.decide_and_persist(task_id, verdict, cancel);
        };
        self.store.put(task_id, "claim.json", &serde_json::to_vec_pretty(claim)?, true)?;

        let plan = AdapterPlan::for_task_type(commitment.task_type);
        let plan_start = Instant::now();
        for step in plan.steps {
            if cancel.is_cancelled() {
                self.record_outcome(OrchestratorStage::Plan, OrchestratorOutcome::Fatal, plan_start.elapsed());
                return Ok(RunOutcome::CancelledBeforeMeasurement);
            }

            match self.runtime.resolve(step.capability) {
                Ok(_) => {
                    match self.invoke_with_retry(step.capability, &task_dir, &commitment_path, &claim_path, &profile_path) {
                        Ok(()) => {}
                        Err(_) if !step.required => {
                            self.record_outcome(OrchestratorStage::Plan, OrchestratorOutcome::Skipped, plan_start.elapsed());
                        }
                        Err(_) => {
                            self.record_outcome(OrchestratorStage::Plan, OrchestratorOutcome::Fatal, plan_start.elapsed());
                            let verdict = missing_adapter_verdict(commitment, profile);
                            return self.decide_and_persist(task_id, verdict, cancel);
                        }
                    }
                }
                Err(RuntimeError::MissingAdapter(_)) if !step.required => {
                    self.record_outcome(OrchestratorStage::Plan, OrchestratorOutcome::Skipped, plan_start.elapsed());
                }
                Err(_) => {
                    self.record_outcome(OrchestratorStage::Plan, OrchestratorOutcome::Fatal, plan_start.elapsed());
                    let verdict = missing_adapter_verdict(commitment, profile);
                    return self.decide_and_persist(task_id, verdict, cancel);
                }
            }
        }
        self.record_outcome(OrchestratorStage::Plan, OrchestratorOutcome::Ok, plan_start.elapsed());

        let cancelled_after_measurement = cancel.is_cancelled();

        let seal_start = Instant::now();
        self.store.seal(task_id)?;
        self.record_outcome(OrchestratorStage::Seal, OrchestratorOutcome::Ok, seal_start.elapsed());

        let gate_start = Instant::now();
        let mut verdict = GateEngine::evaluate(&self.store, commitment, Some(claim), profile)?;
        self.record_outcome(OrchestratorStage::Gate, OrchestratorOutcome::Ok, gate_start.elapsed());

        if cancelled_after_measurement && verdict.status == VerdictStatus::Pass {
            // spec.md §4.9: "a cancelled task must never produce a pass
            // verdict". The Gate Engine stays pure and cancellation-blind;
            // the Orchestrator is the layer that enforces this downgrade.
            verdict.status = VerdictStatus::Partial;
        }

        self.decide_and_persist(task_id, verdict, cancel)
    }

    fn decide_and_persist(
        &self,
        task_id: &gate_core::TaskId,
        verdict: Verdict,
        cancel: &CancelToken,
    ) -> Result<RunOutcome, OrchestratorError> {
        let mut verdict = verdict;
        if cancel.is_cancelled() && verdict.status == VerdictStatus::Pass {
            verdict.status = VerdictStatus::Partial;
        }

        self.store.put(task_id, "verdict.json", &serde_json::to_vec_pretty(&verdict)?, true)?;

        let persist_start = Instant::now();
        self.evidence.persist_verdict(&verdict)?;
        self.record_outcome(OrchestratorStage::Persist, OrchestratorOutcome::Ok, persist_start.elapsed());

        // Best-effort: a push failure must not un-decide the task
        // (spec.md §4.10, §7).
        let push_start = Instant::now();
        let outcome = match self.sink.push(&verdict) {
            Ok(()) => OrchestratorOutcome::Ok,
            Err(_) => OrchestratorOutcome::Fatal,
        };
        self.record_outcome(OrchestratorStage::Push, outcome, push_start.elapsed());

        Ok(RunOutcome::Persisted(verdict))
    }

    /// Invokes `capability`, retrying only bare spawn failures. A clean
    /// process exit with a non-zero status is treated the same as a
    /// `RuntimeError` by the caller: per spec.md §7, a crashed adapter is
    /// "an internal fatal distinct from measurement failure", not a
    /// retryable condition and not a generic error (spec.md §8: "adapter
    /// timeout -> typed fatal not generic error").
    fn invoke_with_retry(
        &self,
        capability: &str,
        task_dir: &std::path::Path,
        commitment_path: &PathBuf,
        claim_path: &PathBuf,
        profile_path: &PathBuf,
    ) -> Result<(), RuntimeError> {
        let mut attempt = 0_u32;
        loop {
            attempt += 1;
            let result = self.runtime.invoke(capability, task_dir, commitment_path, claim_path, profile_path);
            match result {
                Ok(status) if status.success() => return Ok(()),
                Ok(_status) => return Err(RuntimeError::MissingAdapter(capability.to_string())),
                Err(RuntimeError::Spawn {
                    ..
                }) if attempt < ADAPTER_SPAWN_RETRIES => {
                    let backoff_ms = (ADAPTER_SPAWN_BACKOFF_BASE_MS.saturating_mul(1_u64 << (attempt - 1)))
                        .min(ADAPTER_SPAWN_BACKOFF_CAP_MS);
                    std::thread::sleep(Duration::from_millis(backoff_ms));
                }
                Err(other) => return Err(other),
            }
        }
    }

    fn record_outcome(&self, stage: OrchestratorStage, outcome: OrchestratorOutcome, duration: Duration) {
        self.metrics.record_stage(OrchestratorMetricEvent {
            stage,
            outcome,
            duration,
        });
    }
}

/// Constructs the fatal `MISSING_ADAPTER` verdict, mirroring
/// `gate_engine::engine`'s private `short_circuit` helper shape. The Gate
/// Engine itself has no code path for this: it never knows whether a
/// binary was resolvable, only whether the expected artifacts exist.
fn missing_adapter_verdict(commitment: &Commitment, profile: &Profile) -> Verdict {
    Verdict {
        task_id: commitment.task_id.clone(),
        status: VerdictStatus::Fail,
        units_expected: commitment.expected_total,
        units_verified: 0,
        per_unit: Vec::new(),
        reasons: vec![ReasonCode::MissingAdapter],
        metrics: std::collections::BTreeMap::new(),
        policy: VerdictPolicy {
            profile: profile.name.clone(),
            thresholds: profile.to_threshold_map(),
        },
        timestamp: Timestamp::now(),
    }
}

/// Returns the [`TaskState`] a persisted run outcome represents, for
/// callers (e.g. `gate-cli`) that want to report lifecycle state rather
/// than just the verdict.
#[must_use]
pub fn outcome_state(outcome: &RunOutcome) -> TaskState {
    match outcome {
        RunOutcome::Persisted(_) => TaskState::Persisted,
        RunOutcome::CancelledBeforeMeasurement => TaskState::Claimed,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use gate_core::ClaimBody;
    use gate_core::ClaimDeclared;
    use gate_core::ClaimScope;
    use gate_core::CommitmentScope;
    use gate_core::TaskId;
    use gate_core::TaskType;

    use super::*;

    fn write_manifest(adapter_root: &std::path::Path, name: &str, capabilities: &[&str], script: &str) {
        let dir = adapter_root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("run.sh"), script).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(dir.join("run.sh")).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(dir.join("run.sh"), perms).unwrap();
        }
        let manifest = serde_json::json!({
            "name": name,
            "version": "0.1.0",
            "entry": "run.sh",
            "capabilities": capabilities,
            "sandbox": {"tools": [], "timeout_s": 5, "network": false},
        });
        std::fs::write(dir.join("manifest.json"), serde_json::to_vec(&manifest).unwrap()).unwrap();
    }

    fn commitment(task_type: TaskType, expected_total: u64, quality: BTreeMap<String, serde_json::Value>) -> Commitment {
        Commitment {
            task_id: TaskId::new("t-1").unwrap(),
            task_type,
            profile: "default".to_string(),
            expected_total,
            quality,
            scope: CommitmentScope::default(),
        }
    }

    fn claim(task_type: TaskType, units: &[&str]) -> Claim {
        Claim {
            schema: gate_core::CLAIM_SCHEMA.to_string(),
            actor: "agent-1".to_string(),
            task_id: TaskId::new("t-1").unwrap(),
            timestamp: Timestamp::now(),
            claim: ClaimBody {
                task_type,
                units_total: units.len() as u64,
                units_list: units.iter().map(ToString::to_string).collect(),
                scope: ClaimScope::default(),
                declared: ClaimDeclared::default(),
            },
        }
    }

    struct RecordingSink {
        pushed: Mutex<Vec<VerdictStatus>>,
    }

    impl VerdictSink for RecordingSink {
        fn push(&self, verdict: &Verdict) -> Result<(), crate::sink::SinkError> {
            self.pushed.lock().unwrap().push(verdict.status);
            Ok(())
        }
    }

    #[test]
    fn missing_claim_short_circuits_without_measurement() {
        let store_dir = tempfile::tempdir().unwrap();
        let adapter_dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(store_dir.path());
        let runtime = AdapterRuntime::discover(adapter_dir.path()).unwrap();
        let evidence = EvidenceDb::open_in_memory().unwrap();
        let orchestrator = Orchestrator::new(store, runtime, evidence);

        let commitment = commitment(TaskType::Content, 1, BTreeMap::new());
        let profile = Profile::default();
        let outcome = orchestrator.run_task(&commitment, None, &profile, &CancelToken::new()).unwrap();

        let RunOutcome::Persisted(verdict) = outcome else {
            panic!("expected a persisted verdict");
        };
        assert_eq!(verdict.status, VerdictStatus::Fail);
        assert_eq!(verdict.reasons, vec![ReasonCode::MissingClaim]);
    }

    #[test]
    fn missing_required_adapter_short_circuits() {
        let store_dir = tempfile::tempdir().unwrap();
        let adapter_dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(store_dir.path());
        let runtime = AdapterRuntime::discover(adapter_dir.path()).unwrap();
        let evidence = EvidenceDb::open_in_memory().unwrap();
        let orchestrator = Orchestrator::new(store, runtime, evidence);

        let commitment = commitment(TaskType::Content, 1, BTreeMap::new());
        let claim = claim(TaskType::Content, &["a.md"]);
        let profile = Profile::default();
        let outcome = orchestrator.run_task(&commitment, Some(&claim), &profile, &CancelToken::new()).unwrap();

        let RunOutcome::Persisted(verdict) = outcome else {
            panic!("expected a persisted verdict");
        };
        assert_eq!(verdict.status, VerdictStatus::Fail);
        assert_eq!(verdict.reasons, vec![ReasonCode::MissingAdapter]);
    }

    #[test]
    fn optional_adapter_missing_does_not_block_plan() {
        let store_dir = tempfile::tempdir().unwrap();
        let adapter_dir = tempfile::tempdir().unwrap();
        write_manifest(adapter_dir.path(), "diff", &["code:diff"], "#!/bin/sh\nexit 0\n");
        write_manifest(adapter_dir.path(), "map", &["code:map-functions"], "#!/bin/sh\nexit 0\n");
        let store = ArtifactStore::new(store_dir.path());
        let runtime = AdapterRuntime::discover(adapter_dir.path()).unwrap();
        let evidence = EvidenceDb::open_in_memory().unwrap();
        let orchestrator = Orchestrator::new(store, runtime, evidence);

        let commitment = commitment(TaskType::Code, 0, BTreeMap::new());
        let claim = claim(TaskType::Code, &[]);
        let profile = Profile::default();
        let outcome = orchestrator.run_task(&commitment, Some(&claim), &profile, &CancelToken::new()).unwrap();

        let RunOutcome::Persisted(verdict) = outcome else {
            panic!("expected a persisted verdict");
        };
        assert!(!verdict.reasons.contains(&ReasonCode::MissingAdapter));
    }

    #[test]
    fn cancellation_before_measurement_produces_no_verdict() {
        let store_dir = tempfile::tempdir().unwrap();
        let adapter_dir = tempfile::tempdir().unwrap();
        write_manifest(adapter_dir.path(), "content", &["content:scan"], "#!/bin/sh\nexit 0\n");
        let store = ArtifactStore::new(store_dir.path());
        let runtime = AdapterRuntime::discover(adapter_dir.path()).unwrap();
        let evidence = EvidenceDb::open_in_memory().unwrap();
        let orchestrator = Orchestrator::new(store, runtime, evidence);

        let commitment = commitment(TaskType::Content, 1, BTreeMap::new());
        let claim = claim(TaskType::Content, &["a.md"]);
        let profile = Profile::default();
        let cancel = CancelToken::new();
        cancel.cancel();
        let outcome = orchestrator.run_task(&commitment, Some(&claim), &profile, &cancel).unwrap();

        assert!(matches!(outcome, RunOutcome::CancelledBeforeMeasurement));
    }

    #[test]
    fn sink_failure_does_not_prevent_persistence() {
        struct FailingSink;
        impl VerdictSink for FailingSink {
            fn push(&self, _verdict: &Verdict) -> Result<(), crate::sink::SinkError> {
                Err(crate::sink::SinkError("unreachable".to_string()))
            }
        }

        let store_dir = tempfile::tempdir().unwrap();
        let adapter_dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(store_dir.path());
        let runtime = AdapterRuntime::discover(adapter_dir.path()).unwrap();
        let evidence = EvidenceDb::open_in_memory().unwrap();
        let orchestrator = Orchestrator::new(store, runtime, evidence).with_sink(Arc::new(FailingSink));

        let commitment = commitment(TaskType::Content, 1, BTreeMap::new());
        let profile = Profile::default();
        let outcome = orchestrator.run_task(&commitment, None, &profile, &CancelToken::new()).unwrap();

        let RunOutcome::Persisted(verdict) = outcome else {
            panic!("expected a persisted verdict");
        };
        assert_eq!(verdict.status, VerdictStatus::Fail);
    }

    #[test]
    fn recording_sink_observes_pushed_verdicts() {
        let store_dir = tempfile::tempdir().unwrap();
        let adapter_dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(store_dir.path());
        let runtime = AdapterRuntime::discover(adapter_dir.path()).unwrap();
        let evidence = EvidenceDb::open_in_memory().unwrap();
        let sink = Arc::new(RecordingSink {
            pushed: Mutex::new(Vec::new()),
        });
        let orchestrator = Orchestrator::new(store, runtime, evidence).with_sink(sink.clone());

        let commitment = commitment(TaskType::Content, 1, BTreeMap::new());
        let profile = Profile::default();
        orchestrator.run_task(&commitment, None, &profile, &CancelToken::new()).unwrap();

        assert_eq!(sink.pushed.lock().unwrap().len(), 1);
    }
}
