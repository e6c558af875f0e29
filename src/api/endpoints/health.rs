use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct RootResponse {
    pub message: &'static str,
}

/// `GET /`: liveness check.
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Financial Document Analyzer API is running",
    })
}
