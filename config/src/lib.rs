mod pipeline;

pub use pipeline::{OutputConfig, OutputFormat, OutputTarget, PipelineConfig};
