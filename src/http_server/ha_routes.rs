//! HA HTTP Routes
//!
//! Admin endpoints for the orchestrator, nested under `/api/ha`.
//!
//! Orchestrator calls block (status reads, protocol calls, confirmation
//! polling, fsync) and run on the blocking pool.

use std::sync::Arc;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::errors::{HaError, HaResult};
use crate::ledger::OperationLogEntry;
use crate::observability::MetricsSnapshot;
use crate::orchestrator::{OperationOutcome, Orchestrator};
use crate::pair::PairConfig;
use crate::report::{AvailabilityReport, DateRange};
use crate::status::PairStatus;
use crate::transition::{PersistedState, TransitionState};

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetResponse {
    pub transition_state: TransitionState,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeQuery {
    pub start_date: String,
    pub end_date: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

fn error_response(err: HaError) -> ApiError {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code: err.code().to_string(),
        }),
    )
}

/// A query string that does not deserialize is a bad range.
fn range_from_query(
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> Result<DateRange, ApiError> {
    let Query(range) = query.map_err(|e| error_response(HaError::InvalidRange(e.body_text())))?;
    DateRange::parse(&range.start_date, &range.end_date).map_err(error_response)
}

async fn run_blocking<T, F>(state: Arc<Orchestrator>, f: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Orchestrator) -> HaResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || f(&state)).await {
        Ok(result) => result.map(Json).map_err(error_response),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("worker task failed: {}", e),
                code: "HA_INTERNAL".to_string(),
            }),
        )),
    }
}

// ==================
// HA Routes
// ==================

/// Create HA routes
pub fn ha_routes(state: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/state", get(state_handler))
        .route("/configure", post(configure_handler))
        .route("/failover", post(failover_handler))
        .route("/switchback", post(switchback_handler))
        .route("/reset", post(reset_handler))
        .route("/report", get(report_handler))
        .route("/operations", get(operations_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

// ==================
// Read Handlers
// ==================

async fn status_handler(State(state): State<Arc<Orchestrator>>) -> ApiResult<PairStatus> {
    run_blocking(state, |o| o.status()).await
}

async fn state_handler(State(state): State<Arc<Orchestrator>>) -> ApiResult<PersistedState> {
    run_blocking(state, |o| o.state()).await
}

async fn report_handler(
    State(state): State<Arc<Orchestrator>>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> ApiResult<AvailabilityReport> {
    let range = range_from_query(query)?;
    run_blocking(state, move |o| o.availability_report(range)).await
}

async fn operations_handler(
    State(state): State<Arc<Orchestrator>>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> ApiResult<Vec<OperationLogEntry>> {
    let range = range_from_query(query)?;
    run_blocking(state, move |o| o.operations(range)).await
}

async fn metrics_handler(State(state): State<Arc<Orchestrator>>) -> Json<MetricsSnapshot> {
    Json(state.metrics())
}

// ==================
// Mutating Handlers
// ==================

/// A body that does not deserialize (wrong type, missing field, negative
/// port) is an invalid configuration like any other.
async fn configure_handler(
    State(state): State<Arc<Orchestrator>>,
    body: Result<Json<PairConfig>, JsonRejection>,
) -> ApiResult<PairConfig> {
    let Json(config) =
        body.map_err(|e| error_response(HaError::InvalidConfig(e.body_text())))?;
    run_blocking(state, move |o| o.configure(config)).await
}

/// Always 200 with the outcome once an attempt started; failure is in the body.
async fn failover_handler(State(state): State<Arc<Orchestrator>>) -> ApiResult<OperationOutcome> {
    run_blocking(state, |o| o.failover()).await
}

async fn switchback_handler(
    State(state): State<Arc<Orchestrator>>,
) -> ApiResult<OperationOutcome> {
    run_blocking(state, |o| o.switchback()).await
}

async fn reset_handler(State(state): State<Arc<Orchestrator>>) -> ApiResult<ResetResponse> {
    run_blocking(state, |o| {
        let transition_state = o.reset()?;
        Ok(ResetResponse {
            transition_state,
            message: "Transition state reset".to_string(),
        })
    })
    .await
}
