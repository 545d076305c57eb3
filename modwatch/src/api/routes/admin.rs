//! Privileged operator routes.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::catalog::ModId;
use crate::database::models::ReleaseDbModel;
use crate::scheduler::{CycleReport, CycleTrigger};

const DEFAULT_RELEASES_LIMIT: i64 = 10;
const MAX_RELEASES_LIMIT: i64 = 100;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/force-check", post(force_check))
        .route("/test-release", post(test_release))
        .route("/releases", get(recent_releases))
}

#[derive(Debug, Serialize)]
pub struct ForceCheckResponse {
    /// `completed`, `completed_with_errors` or `interrupted`.
    pub status: &'static str,
    #[serde(flatten)]
    pub report: CycleReport,
}

/// Run a cycle now, waiting for a running one to finish first.
///
/// The cycle runs on its own task: a client that disconnects must not cut
/// a mod off between delivery and recording.
async fn force_check(State(state): State<AppState>) -> ApiResult<Json<ForceCheckResponse>> {
    tracing::info!("Manual update check requested");
    let scanner = state.scanner.clone();
    let cancel = state.cancel_token.clone();
    let report = tokio::spawn(async move { scanner.run_cycle(CycleTrigger::Manual, &cancel).await })
        .await
        .map_err(|e| ApiError::internal(format!("Update check failed: {}", e)))?;

    let status = if report.interrupted {
        "interrupted"
    } else if report.has_errors() {
        "completed_with_errors"
    } else {
        "completed"
    };

    Ok(Json(ForceCheckResponse { status, report }))
}

#[derive(Debug, Default, Deserialize)]
pub struct TestReleaseRequest {
    /// Target channel; the first mod's routed channel when absent.
    pub channel_id: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct TestReleaseResponse {
    pub mod_id: ModId,
    pub mod_name: String,
    pub version: String,
    pub channel_id: u64,
}

/// Send the first mod's newest release without recording it.
async fn test_release(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<TestReleaseResponse>> {
    let request: TestReleaseRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TestReleaseRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))?
    };

    tracing::info!(channel_id = ?request.channel_id, "Test release requested");
    let sent = state.scanner.send_test_release(request.channel_id).await?;

    Ok(Json(TestReleaseResponse {
        mod_id: sent.mod_id,
        mod_name: sent.mod_name,
        version: sent.version,
        channel_id: sent.channel_id,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ReleasesQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub mod_id: String,
    pub version: String,
    pub released_at: DateTime<Utc>,
}

impl From<ReleaseDbModel> for ReleaseResponse {
    fn from(model: ReleaseDbModel) -> Self {
        Self {
            released_at: model.released_at_datetime(),
            mod_id: model.mod_id,
            version: model.version,
        }
    }
}

/// Most recently recorded releases, newest first.
async fn recent_releases(
    State(state): State<AppState>,
    Query(query): Query<ReleasesQuery>,
) -> ApiResult<Json<Vec<ReleaseResponse>>> {
    let limit = clamp_limit(query.limit);
    let releases = state.scanner.ledger().get_recent(limit).await?;
    Ok(Json(releases.into_iter().map(Into::into).collect()))
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(DEFAULT_RELEASES_LIMIT)
        .clamp(1, MAX_RELEASES_LIMIT)
}
