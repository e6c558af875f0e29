pub mod extraction;
pub mod agents;
pub mod crew;

pub use crew::{AnalysisPipeline, PipelineError, PipelineOutput};
