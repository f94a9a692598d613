// gate-monitor/src/server.rs
// ============================================================================
// Module: server
// Description: Axum router and handlers for the Monitor's HTTP surface
//              (spec.md §4.10).
// Dependencies: axum, gate-core, gate-evidence, tokio
// ============================================================================

//! ## Overview
//! One route per endpoint spec.md §4.10 lists. Handlers are thin: they
//! parse path/query parameters, call straight into `gate-evidence`, and
//! shape the result as JSON. No handler interprets a `Verdict`'s
//! `reasons[]` or recomputes anything the Gate Engine already decided.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use gate_core::TaskId;
use gate_core::Verdict;
use gate_evidence::DailyAggregate;
use gate_evidence::EvidenceDb;
use gate_evidence::EvidenceDbError;
use gate_evidence::TaskSummary;
use gate_evidence::UnitTypeCount;
use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Router
// ============================================================================

/// Shared state for all Monitor handlers.
struct MonitorState {
    /// Evidence DB backing every read and the verdict push.
    evidence: EvidenceDb,
}

/// Builds the Monitor's router over `evidence`. Exposed separately from
/// [`serve`] so tests can drive the router without binding a socket.
#[must_use]
pub fn build_router(evidence: EvidenceDb) -> Router {
    let state = Arc::new(MonitorState {
        evidence,
    });
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/verdict", post(handle_push_verdict))
        .route("/api/tasks", get(handle_list_tasks))
        .route("/api/tasks/{id}", get(handle_task))
        .route("/api/tasks/{id}/units", get(handle_task_units))
        .route("/api/stats/units/types", get(handle_unit_type_histogram))
        .route("/api/stats/daily", get(handle_daily_stats))
        .with_state(state)
}

/// Binds `addr` and serves the Monitor's HTTP API until the process exits.
///
/// # Errors
///
/// Returns [`MonitorError::Bind`] if the address cannot be bound, or
/// [`MonitorError::Serve`] if the server loop fails.
pub async fn serve(addr: SocketAddr, evidence: EvidenceDb) -> Result<(), MonitorError> {
    let app = build_router(evidence);
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(MonitorError::Bind)?;
    axum::serve(listener, app).await.map_err(MonitorError::Serve)
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `GET /health`.
async fn handle_health() -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
    })
}

/// `POST /api/verdict`. Idempotent upsert keyed on `task_id`.
async fn handle_push_verdict(
    State(state): State<Arc<MonitorState>>,
    Json(verdict): Json<Verdict>,
) -> Result<StatusCode, MonitorError> {
    state.evidence.persist_verdict(&verdict)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/tasks?limit=N`.
async fn handle_list_tasks(
    State(state): State<Arc<MonitorState>>,
    Query(params): Query<ListTasksParams>,
) -> Result<Json<Vec<TaskSummary>>, MonitorError> {
    let limit = params.limit.unwrap_or(DEFAULT_TASK_LIMIT);
    Ok(Json(state.evidence.latest_tasks(limit)?))
}

/// `GET /api/tasks/:id`.
async fn handle_task(
    State(state): State<Arc<MonitorState>>,
    Path(id): Path<String>,
) -> Result<Json<TaskSummary>, MonitorError> {
    match state.evidence.task_summary(&id)? {
        Some(summary) => Ok(Json(summary)),
        None => Err(MonitorError::NotFound(id)),
    }
}

/// `GET /api/tasks/:id/units`.
async fn handle_task_units(
    State(state): State<Arc<MonitorState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<gate_core::Unit>>, MonitorError> {
    let task_id = TaskId::new(id).map_err(|err| MonitorError::InvalidTaskId(err.to_string()))?;
    Ok(Json(state.evidence.units_for_task(&task_id)?))
}

/// `GET /api/stats/units/types`.
async fn handle_unit_type_histogram(
    State(state): State<Arc<MonitorState>>,
) -> Result<Json<Vec<UnitTypeCount>>, MonitorError> {
    Ok(Json(state.evidence.unit_type_histogram()?))
}

/// `GET /api/stats/daily?days=N`.
async fn handle_daily_stats(
    State(state): State<Arc<MonitorState>>,
    Query(params): Query<DailyStatsParams>,
) -> Result<Json<Vec<DailyAggregate>>, MonitorError> {
    let days = params.days.unwrap_or(DEFAULT_DAILY_WINDOW);
    Ok(Json(state.evidence.daily_aggregates(days)?))
}

// ============================================================================
// SECTION: Request/Response Shapes
// ============================================================================

/// Default row count for `GET /api/tasks` when `limit` is omitted.
const DEFAULT_TASK_LIMIT: u32 = 50;
/// Default day window for `GET /api/stats/daily` when `days` is omitted.
const DEFAULT_DAILY_WINDOW: u32 = 30;

/// Query parameters for `GET /api/tasks`.
#[derive(Debug, Deserialize)]
struct ListTasksParams {
    /// Maximum number of rows to return, newest first.
    limit: Option<u32>,
}

/// Query parameters for `GET /api/stats/daily`.
#[derive(Debug, Deserialize)]
struct DailyStatsParams {
    /// Number of trailing days to aggregate.
    days: Option<u32>,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
struct HealthBody {
    /// Fixed liveness marker.
    status: &'static str,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while serving the Monitor's HTTP API.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// The bind address could not be claimed.
    #[error("monitor bind failed: {0}")]
    Bind(#[source] std::io::Error),
    /// The server loop failed.
    #[error("monitor server failed: {0}")]
    Serve(#[source] std::io::Error),
    /// The Evidence DB could not be read or written.
    #[error("evidence db error: {0}")]
    Evidence(#[from] EvidenceDbError),
    /// The path's task id was malformed.
    #[error("invalid task id: {0}")]
    InvalidTaskId(String),
    /// No task with the given id has a persisted verdict.
    #[error("task not found: {0}")]
    NotFound(String),
}

impl IntoResponse for MonitorError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Bind(_) | Self::Serve(_) | Self::Evidence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::InvalidTaskId(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(ErrorBody {
            error: self.to_string(),
        }))
            .into_response()
    }
}

/// JSON body for error responses.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// Human-readable error message.
    error: String,
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use axum::body::Body;
    use axum::http::Request;
    use gate_core::TaskId;
    use gate_core::Timestamp;
    use gate_core::Unit;
    use gate_core::UnitId;
    use gate_core::UnitType;
    use gate_core::VerdictPolicy;
    use gate_core::VerdictStatus;
    use tower::ServiceExt;

    use super::*;

    fn sample_verdict() -> Verdict {
        Verdict {
            task_id: TaskId::new("t-1").unwrap(),
            status: VerdictStatus::Pass,
            units_expected: 1,
            units_verified: 1,
            per_unit: vec![Unit {
                task_id: TaskId::new("t-1").unwrap(),
                unit_id: UnitId::new("a.md"),
                unit_type: UnitType::File,
                claimed: true,
                verified: true,
                reason: None,
            }],
            reasons: vec![],
            metrics: BTreeMap::new(),
            policy: VerdictPolicy {
                profile: "content_default".to_string(),
                thresholds: BTreeMap::new(),
            },
            timestamp: Timestamp::now(),
        }
    }

    #[tokio::test]
    async fn health_returns_ok() {
        let app = build_router(EvidenceDb::open_in_memory().unwrap());
        let response =
            app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn push_then_fetch_task_round_trips() {
        let evidence = EvidenceDb::open_in_memory().unwrap();
        evidence.persist_verdict(&sample_verdict()).unwrap();
        let app = build_router(evidence);

        let response = app
            .oneshot(Request::builder().uri("/api/tasks/t-1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_task_returns_404() {
        let app = build_router(EvidenceDb::open_in_memory().unwrap());
        let response = app
            .oneshot(Request::builder().uri("/api/tasks/missing").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
