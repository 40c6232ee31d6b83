//! Message triage pipeline.

mod processor;
mod types;

pub use processor::TriagePipeline;
pub use types::{InboundMessage, PipelineOutcome};
