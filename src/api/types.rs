use std::sync::Arc;

use crate::jobs::JobQueue;
use crate::service::AnalysisService;

/// Shared state for every route.
#[derive(Clone)]
pub struct ApiContext {
    pub service: Arc<AnalysisService>,
    pub queue: Arc<JobQueue>,
    /// Upper bound on a request body, multipart overhead included.
    pub max_upload_bytes: usize,
}

impl ApiContext {
    pub fn new(service: Arc<AnalysisService>, queue: Arc<JobQueue>, max_upload_bytes: usize) -> Self {
        Self {
            service,
            queue,
            max_upload_bytes,
        }
    }
}
