mod converter;
mod pipeline;
mod verifier;

pub use converter::{ConverterConfig, DEFAULT_TOOL_ARGS};
pub use pipeline::PipelineConfig;
pub use verifier::VerifierConfig;
