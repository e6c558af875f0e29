use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::config::DEFAULT_QUERY;
use crate::jobs::AnalysisJob;
use crate::models::{AnalysisRequest, AnalysisResult};

/// Parsed `file` + `query` form fields.
#[derive(Debug)]
pub struct Submission {
    pub filename: String,
    pub query: String,
    pub bytes: Vec<u8>,
}

#[derive(Serialize)]
pub struct AnalyzeResponse {
    pub status: &'static str,
    pub id: Uuid,
    pub filename: String,
    pub query: String,
    pub result: String,
    pub stages: AnalysisResult,
}

#[derive(Serialize)]
pub struct QueuedResponse {
    pub status: &'static str,
    pub id: Uuid,
    pub filename: String,
    pub query: String,
}

/// `POST /analyze`: run the full pipeline and answer with the result.
pub async fn analyze(
    State(ctx): State<ApiContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let submission = read_submission(multipart.map_err(rejection)?).await?;
    let request = AnalysisRequest::new(submission.filename, submission.query);

    let service = ctx.service.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let upload = service.stage_upload(&submission.bytes)?;
        service.analyze(&request, upload)
    })
    .await??;

    Ok(Json(AnalyzeResponse {
        status: "success",
        id: outcome.request.id,
        filename: outcome.request.filename,
        query: outcome.request.query,
        result: outcome.combined,
        stages: outcome.result,
    }))
}

/// `POST /analyze/async`: stage the upload and queue the analysis.
pub async fn analyze_async(
    State(ctx): State<ApiContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<QueuedResponse>), ApiError> {
    let submission = read_submission(multipart.map_err(rejection)?).await?;
    let request = AnalysisRequest::new(submission.filename, submission.query);

    let service = ctx.service.clone();
    let bytes = submission.bytes;
    let upload = tokio::task::spawn_blocking(move || service.stage_upload(&bytes)).await??;

    let response = QueuedResponse {
        status: "queued",
        id: request.id,
        filename: request.filename.clone(),
        query: request.query.clone(),
    };
    ctx.queue.submit(AnalysisJob { request, upload })?;

    Ok((StatusCode::ACCEPTED, Json(response)))
}

/// Collect the form fields. A blank or missing query becomes the default.
pub async fn read_submission(mut multipart: Multipart) -> Result<Submission, ApiError> {
    let mut query: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "query" => {
                query = Some(field.text().await.map_err(multipart_error)?);
            }
            "file" => {
                let filename = field.file_name().unwrap_or("document").to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| ApiError::BadRequest("No file uploaded".into()))?;
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".into()));
    }

    Ok(Submission {
        filename,
        query: normalize_query(query.as_deref()),
        bytes,
    })
}

fn normalize_query(query: Option<&str>) -> String {
    match query.map(str::trim) {
        Some(q) if !q.is_empty() => q.to_string(),
        _ => DEFAULT_QUERY.to_string(),
    }
}

fn rejection(err: MultipartRejection) -> ApiError {
    ApiError::BadRequest(err.body_text())
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge
    } else {
        ApiError::BadRequest(err.body_text())
    }
}
