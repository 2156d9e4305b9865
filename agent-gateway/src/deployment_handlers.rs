use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use common_problem::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use crate::app::AppState;
use crate::github::RepoInfo;
use crate::guard::CurrentUser;
use crate::queue::{QUEUE_GITHUB_API, TASK_CHECK_REPO};

const NEXT_STEP: &str =
    "Repository validated successfully. Grant deployment credentials before rolling out.";

#[derive(Debug, Deserialize)]
pub struct RepoRequest {
    pub repo: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct RepoInfoResponse {
    #[serde(flatten)]
    pub info: RepoInfo,
    pub next_step: String,
}

#[derive(Debug, Serialize)]
pub struct RepoCheckQueued {
    pub task_id: String,
    pub queue: String,
    pub status: String,
}

pub async fn repo_info(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<RepoRequest>,
) -> ApiResult<Json<RepoInfoResponse>> {
    info!(user_id = %user.id, repo = %body.repo, "repo-info request");

    let info = state
        .github
        .fetch_repo(body.repo.trim(), body.token.trim())
        .await?;

    Ok(Json(RepoInfoResponse {
        info,
        next_step: NEXT_STEP.to_string(),
    }))
}

/// Offload the repository check to the worker pool instead of running it on
/// the request path.
pub async fn repo_check(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<RepoRequest>,
) -> Result<(StatusCode, Json<RepoCheckQueued>), ApiError> {
    if body.repo.trim().is_empty() {
        return Err(ApiError::validation(
            "github/invalid-identifier",
            "Repository identifier cannot be empty",
        ));
    }
    if body.token.trim().is_empty() {
        return Err(ApiError::validation(
            "github/missing-token",
            "GitHub token is required",
        ));
    }

    let task_id = state
        .queue
        .enqueue(
            TASK_CHECK_REPO,
            json!({ "repo": body.repo.trim(), "token": body.token.trim() }),
            QUEUE_GITHUB_API,
            8,
        )
        .await?;
    state.metrics.task_enqueued(QUEUE_GITHUB_API);

    info!(user_id = %user.id, task_id = %task_id, "repo check queued");

    Ok((
        StatusCode::ACCEPTED,
        Json(RepoCheckQueued {
            task_id,
            queue: QUEUE_GITHUB_API.to_string(),
            status: "queued".to_string(),
        }),
    ))
}

pub async fn repo_check_result(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    match state.queue.result(&task_id).await? {
        Some(result) => Ok(Json(result)),
        None => Ok(Json(json!({ "task_id": task_id, "status": "pending" }))),
    }
}

pub async fn deployments_health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "deployment_service",
        "endpoints": [
            "POST /deployments/repo-info",
            "POST /deployments/repo-check",
        ],
    }))
}
