// system-tests/tests/scenarios.rs
// ============================================================================
// Module: End-to-End Scenarios
// Description: Orchestrator-driven coverage of the lifecycle paths that
//              need no real adapter binary to exercise.
// Purpose: Exercise the assembled workspace (Artifact Store, Adapter
//          Runtime, Gate Engine, Evidence DB, Monitor) the way a task
//          executor actually drives it, rather than calling any one
//          crate's internals directly.
// ============================================================================

#![allow(missing_docs, reason = "test binary, not a documented public API")]

use std::collections::BTreeMap;

use axum::body::Body;
use axum::http::Request;
use axum::http::StatusCode;
use gate_adapters::AdapterRuntime;
use gate_core::ArtifactStore;
use gate_core::Claim;
use gate_core::ClaimBody;
use gate_core::ClaimDeclared;
use gate_core::ClaimScope;
use gate_core::CommitmentScope;
use gate_core::Commitment;
use gate_core::Profile;
use gate_core::ReasonCode;
use gate_core::TaskId;
use gate_core::TaskType;
use gate_core::Timestamp;
use gate_core::VerdictStatus;
use gate_evidence::EvidenceDb;
use gate_orchestrator::CancelToken;
use gate_orchestrator::Orchestrator;
use gate_orchestrator::RunOutcome;
use tower::ServiceExt;

fn commitment(task_type: TaskType, expected_total: u64) -> Commitment {
    Commitment {
        task_id: TaskId::new("t-1").unwrap(),
        task_type,
        profile: "default".to_string(),
        expected_total,
        quality: BTreeMap::new(),
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

fn orchestrator(store_root: &std::path::Path, adapter_dir: &std::path::Path, evidence_path: &std::path::Path) -> Orchestrator {
    let store = ArtifactStore::new(store_root);
    let runtime = AdapterRuntime::discover(adapter_dir).unwrap();
    let evidence = EvidenceDb::open(evidence_path).unwrap();
    Orchestrator::new(store, runtime, evidence)
}

/// A `DbUpdate` Commitment has no adapter plan; the Gate rejects it with
/// `NO_PLAN_FOR_TYPE` without ever touching the Adapter Runtime, and the
/// resulting verdict is visible through the Monitor's router.
#[tokio::test(flavor = "multi_thread")]
async fn db_update_has_no_plan_and_is_visible_through_monitor() {
    let store_dir = tempfile::tempdir().unwrap();
    let adapter_dir = tempfile::tempdir().unwrap();
    let evidence_file = tempfile::tempdir().unwrap();
    let evidence_path = evidence_file.path().join("evidence.sqlite3");

    let orchestrator = orchestrator(store_dir.path(), adapter_dir.path(), &evidence_path);
    let commitment = commitment(TaskType::DbUpdate, 1);
    let claim = claim(TaskType::DbUpdate, &["row-1"]);
    let cancel = CancelToken::new();

    let outcome = orchestrator.run_task(&commitment, Some(&claim), &Profile::default(), &cancel).unwrap();
    let RunOutcome::Persisted(verdict) = outcome else {
        panic!("db_update task must reach persisted, not cancel before measurement");
    };
    assert_eq!(verdict.status, VerdictStatus::Fail);
    assert!(verdict.reasons.contains(&ReasonCode::NoPlanForType));

    let evidence = EvidenceDb::open(&evidence_path).unwrap();
    let router = gate_monitor::build_router(evidence);
    let response = router
        .oneshot(Request::builder().uri("/api/tasks/t-1").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

/// A missing Claim short-circuits before the adapter plan ever runs; the
/// Gate's own `None` path produces `MISSING_CLAIM` and the task still
/// reaches `persisted`.
#[tokio::test(flavor = "multi_thread")]
async fn missing_claim_short_circuits_before_plan() {
    let store_dir = tempfile::tempdir().unwrap();
    let adapter_dir = tempfile::tempdir().unwrap();
    let evidence_path = tempfile::tempdir().unwrap().path().join("evidence.sqlite3");

    let orchestrator = orchestrator(store_dir.path(), adapter_dir.path(), &evidence_path);
    let commitment = commitment(TaskType::Content, 1);
    let cancel = CancelToken::new();

    let outcome = orchestrator.run_task(&commitment, None, &Profile::default(), &cancel).unwrap();
    let RunOutcome::Persisted(verdict) = outcome else {
        panic!("a missing claim must still reach persisted with MISSING_CLAIM");
    };
    assert_eq!(verdict.status, VerdictStatus::Fail);
    assert!(verdict.reasons.contains(&ReasonCode::MissingClaim));
    assert_eq!(verdict.units_verified, 0);
}

/// A schema-invalid Claim is treated the same as a missing one: the
/// Orchestrator never writes `claim.json` and the Gate still resolves
/// `MISSING_CLAIM`.
#[tokio::test(flavor = "multi_thread")]
async fn schema_invalid_claim_is_treated_as_missing() {
    let store_dir = tempfile::tempdir().unwrap();
    let adapter_dir = tempfile::tempdir().unwrap();
    let evidence_path = tempfile::tempdir().unwrap().path().join("evidence.sqlite3");

    let orchestrator = orchestrator(store_dir.path(), adapter_dir.path(), &evidence_path);
    let commitment = commitment(TaskType::Content, 1);
    let mut bad_claim = claim(TaskType::Content, &["a.md"]);
    bad_claim.schema = "wrong-schema/v0".to_string();
    let cancel = CancelToken::new();

    let outcome = orchestrator.run_task(&commitment, Some(&bad_claim), &Profile::default(), &cancel).unwrap();
    let RunOutcome::Persisted(verdict) = outcome else {
        panic!("a schema-invalid claim must still reach persisted with MISSING_CLAIM");
    };
    assert!(verdict.reasons.contains(&ReasonCode::MissingClaim));
}

/// An empty adapter directory has no adapter for `content:scan`; since
/// that step is required, the run short-circuits with `MISSING_ADAPTER`
/// instead of ever sealing a bundle.
#[tokio::test(flavor = "multi_thread")]
async fn missing_required_adapter_is_fatal() {
    let store_dir = tempfile::tempdir().unwrap();
    let adapter_dir = tempfile::tempdir().unwrap();
    let evidence_path = tempfile::tempdir().unwrap().path().join("evidence.sqlite3");

    let orchestrator = orchestrator(store_dir.path(), adapter_dir.path(), &evidence_path);
    let commitment = commitment(TaskType::Content, 1);
    let claim = claim(TaskType::Content, &["a.md"]);
    let cancel = CancelToken::new();

    let outcome = orchestrator.run_task(&commitment, Some(&claim), &Profile::default(), &cancel).unwrap();
    let RunOutcome::Persisted(verdict) = outcome else {
        panic!("a missing required adapter must still reach persisted with MISSING_ADAPTER");
    };
    assert_eq!(verdict.status, VerdictStatus::Fail);
    assert!(verdict.reasons.contains(&ReasonCode::MissingAdapter));
}

/// Cancelling before a task's plan loop starts means no bundle is ever
/// sealed and no verdict is ever persisted, per spec.md's "cancellable at
/// any point" invariant.
#[tokio::test(flavor = "multi_thread")]
async fn cancellation_before_plan_yields_no_verdict() {
    let store_dir = tempfile::tempdir().unwrap();
    let adapter_dir = tempfile::tempdir().unwrap();
    let evidence_path = tempfile::tempdir().unwrap().path().join("evidence.sqlite3");

    let orchestrator = orchestrator(store_dir.path(), adapter_dir.path(), &evidence_path);
    let commitment = commitment(TaskType::Content, 1);
    let claim = claim(TaskType::Content, &["a.md"]);
    let cancel = CancelToken::new();
    cancel.cancel();

    let outcome = orchestrator.run_task(&commitment, Some(&claim), &Profile::default(), &cancel).unwrap();
    assert!(matches!(outcome, RunOutcome::CancelledBeforeMeasurement));

    let evidence = EvidenceDb::open(&evidence_path).unwrap();
    let task_id = TaskId::new("t-1").unwrap();
    assert!(evidence.units_for_task(&task_id).unwrap().is_empty());
}

/// Re-running the identical task upserts the same `task_id` header row
/// each time; the Evidence DB never accumulates a second row for a task
/// that has already run, per the upsert-is-idempotent invariant.
#[tokio::test(flavor = "multi_thread")]
async fn rerunning_a_task_does_not_duplicate_its_summary_row() {
    let store_dir = tempfile::tempdir().unwrap();
    let adapter_dir = tempfile::tempdir().unwrap();
    let evidence_path = tempfile::tempdir().unwrap().path().join("evidence.sqlite3");

    let commitment = commitment(TaskType::DbUpdate, 1);
    let claim = claim(TaskType::DbUpdate, &["row-1"]);

    for _ in 0..2 {
        let orchestrator = orchestrator(store_dir.path(), adapter_dir.path(), &evidence_path);
        let cancel = CancelToken::new();
        orchestrator.run_task(&commitment, Some(&claim), &Profile::default(), &cancel).unwrap();
    }

    let evidence = EvidenceDb::open(&evidence_path).unwrap();
    assert_eq!(evidence.latest_tasks(50).unwrap().len(), 1);
}
