use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::jobs::JobStatus;

#[derive(Serialize)]
pub struct JobResponse {
    pub id: Uuid,
    #[serde(flatten)]
    pub status: JobStatus,
}

/// `GET /jobs/:id`: progress of a queued analysis.
///
/// Jobs no longer tracked in memory are reported done when their record exists.
pub async fn status(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let not_found = || ApiError::NotFound("Job not found".into());
    let id = Uuid::parse_str(&id).map_err(|_| not_found())?;

    if let Some(status) = ctx.queue.status(&id) {
        return Ok(Json(JobResponse { id, status }));
    }

    let service = ctx.service.clone();
    let record = tokio::task::spawn_blocking(move || service.get_result(&id)).await??;
    match record {
        Some(_) => Ok(Json(JobResponse {
            id,
            status: JobStatus::Done,
        })),
        None => Err(not_found()),
    }
}
