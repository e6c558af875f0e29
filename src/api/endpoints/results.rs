use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::AnalysisRecord;

#[derive(Serialize)]
pub struct ResultResponse {
    pub status: &'static str,
    pub data: AnalysisRecord,
}

/// `GET /results/:id`: a stored analysis record.
pub async fn get(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    let not_found = || ApiError::NotFound("Result not found".into());
    // Ids are always v4 UUIDs, so anything else cannot exist.
    let id = Uuid::parse_str(&id).map_err(|_| not_found())?;

    let service = ctx.service.clone();
    let record = tokio::task::spawn_blocking(move || service.get_result(&id)).await??;

    record
        .map(|data| {
            Json(ResultResponse {
                status: "success",
                data,
            })
        })
        .ok_or_else(not_found)
}
