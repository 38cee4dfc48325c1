use crate::link::Representation;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while wiring or running a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Two adjacent stages share no chunk representation
    #[error("No common representation between '{provider}' and '{consumer}'")]
    NoCommonRepresentation { provider: String, consumer: String },

    /// A buffer cannot be split into whole units of the negotiated representation
    #[error("Stage '{stage}': {len} bytes is not a whole number of {representation:?} units")]
    Misaligned {
        stage: String,
        representation: Representation,
        len: usize,
    },

    /// Reading the external input or writing the external output failed
    #[error("Stage '{stage}' I/O failure: {source}")]
    Io {
        stage: String,
        #[source]
        source: std::io::Error,
    },

    /// The encoded stream is structurally invalid
    #[error("Stage '{stage}' received a malformed stream: {reason}")]
    MalformedStream { stage: String, reason: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pipeline has already been run
    #[error("Pipeline has already been run")]
    AlreadyRun,
}

impl PipelineError {
    pub(crate) fn io(stage: &str, source: std::io::Error) -> Self {
        PipelineError::Io {
            stage: stage.to_string(),
            source,
        }
    }

    pub(crate) fn malformed(stage: &str, reason: impl Into<String>) -> Self {
        PipelineError::MalformedStream {
            stage: stage.to_string(),
            reason: reason.into(),
        }
    }

    /// Name of the stage the failure originated in, when there is one
    pub fn stage(&self) -> Option<&str> {
        match self {
            PipelineError::Misaligned { stage, .. }
            | PipelineError::Io { stage, .. }
            | PipelineError::MalformedStream { stage, .. } => Some(stage),
            PipelineError::NoCommonRepresentation { consumer, .. } => Some(consumer),
            PipelineError::Config(_) | PipelineError::AlreadyRun => None,
        }
    }
}
