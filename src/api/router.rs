//! Route table. Path params use `:param` syntax (matchit 0.7 / axum 0.7).

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the HTTP router with request tracing and the upload size limit.
pub fn api_router(ctx: ApiContext) -> Router {
    let body_limit = ctx.max_upload_bytes;

    Router::new()
        .route("/", get(endpoints::health::root))
        .route("/analyze", post(endpoints::analyze::analyze))
        .route("/analyze/async", post(endpoints::analyze::analyze_async))
        .route("/jobs/:id", get(endpoints::jobs::status))
        .route("/results/:id", get(endpoints::results::get))
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
}
