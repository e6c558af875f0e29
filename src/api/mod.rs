//! HTTP surface: health, synchronous and queued analysis, job status and
//! stored results. `api_router()` returns a composable `Router`.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{bind, serve, shutdown_signal};
pub use types::ApiContext;
