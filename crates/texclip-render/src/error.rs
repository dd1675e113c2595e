//! Error types for the render pipeline

use std::time::Duration;

use thiserror::Error;

use crate::compiler::Pass;

/// Result type for render operations
pub type Result<T> = std::result::Result<T, RenderError>;

/// Errors that can occur while turning a document into an image
///
/// Every variant is terminal for the current render: no partial image is
/// ever produced.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The formula text is empty or whitespace-only
    #[error("Formula text is empty")]
    EmptySource,

    /// The formula text exceeds the defensive length limit
    #[error("Formula text too long: {len} bytes (limit {max})")]
    SourceTooLarge { len: usize, max: usize },

    /// The temporary workspace could not be created or written
    #[error("Workspace error: {0}")]
    Workspace(String),

    /// The compiler executable could not be started
    #[error("Compiler `{compiler}` unavailable: {source}")]
    CompilerUnavailable {
        compiler: String,
        #[source]
        source: std::io::Error,
    },

    /// The compiler reported a failure on one of its passes
    #[error("LaTeX compilation failed ({compiler}, {pass} pass): {diagnostic}")]
    Compilation {
        compiler: String,
        pass: Pass,
        diagnostic: String,
    },

    /// A compiler pass exceeded the configured timeout and was killed
    #[error("Compiler `{compiler}` timed out after {timeout:?} ({pass} pass)")]
    Timeout {
        compiler: String,
        pass: Pass,
        timeout: Duration,
    },

    /// The compiled PDF could not be opened or has no pages
    #[error("Rasterization failed: {0}")]
    Rasterization(String),

    /// The padded canvas could not be allocated or encoded
    #[error("Image encoding failed: {0}")]
    Encoding(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RenderError {
    /// Raw compiler diagnostic, if this is a compilation failure
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::Compilation { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }
}
