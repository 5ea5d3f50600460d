pub mod analyzer;
pub mod parser;
pub mod types;

pub use analyzer::*;
pub use parser::*;
pub use types::*;

use thiserror::Error;

use crate::pipeline::ollama::OllamaError;

/// Analysis of one image failed. Carries no partial structured data.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Image payload is not valid base64: {0}")]
    InvalidPayload(String),

    #[error("Only images can be analyzed, got {0}")]
    UnsupportedMime(String),

    #[error("Vision analysis failed: {0}")]
    Upstream(#[from] OllamaError),

    #[error("Vision model returned no readable text")]
    EmptyResponse,
}
