//! Failure taxonomy for the generation pipeline.
//!
//! Render-tool failures are the only class eligible for automated
//! repair-and-retry; everything else surfaces to the caller immediately.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Empty or missing request. Terminal, user-facing.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Generation output had no extractable code. Terminal for that attempt.
    #[error("could not parse generation output: {0}")]
    Parse(String),

    /// Zero or ambiguous scene declarations in generated code. The design
    /// mandates exactly one scene per generation, so this is always a
    /// generation-quality defect, never retried.
    #[error("scene detection failed: {0}")]
    SceneNotFound(String),

    /// Render-tool failure carrying the tool's diagnostic stream. Drives the
    /// repair loop until retries are exhausted.
    #[error("render failed: {diagnostic}")]
    Render { diagnostic: String },

    /// The repair call errored or returned unparseable text. Terminal;
    /// there is no repair-of-repair.
    #[error("repair exhausted: {diagnostic}")]
    RepairExhausted { diagnostic: String },

    /// Probe or mux failure. Terminal for that attempt.
    #[error("media processing failed: {0}")]
    Media(String),

    /// Generation or speech service error (HTTP, auth, empty response).
    #[error(transparent)]
    Service(#[from] anyhow::Error),
}

impl PipelineError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PipelineError::Render { .. })
    }

    /// The text handed to the repair prompt. For render failures this is the
    /// raw diagnostic stream rather than the formatted error message.
    pub fn diagnostic_text(&self) -> String {
        match self {
            PipelineError::Render { diagnostic } => diagnostic.clone(),
            other => other.to_string(),
        }
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_render_errors_are_recoverable() {
        assert!(PipelineError::Render {
            diagnostic: "ValueError".into()
        }
        .is_recoverable());
        assert!(!PipelineError::Parse("no code block".into()).is_recoverable());
        assert!(!PipelineError::SceneNotFound("none".into()).is_recoverable());
        assert!(!PipelineError::Media("probe failed".into()).is_recoverable());
        assert!(!PipelineError::InvalidInput("empty".into()).is_recoverable());
    }

    #[test]
    fn test_diagnostic_text_prefers_raw_render_output() {
        let err = PipelineError::Render {
            diagnostic: "Traceback (most recent call last)".into(),
        };
        assert_eq!(err.diagnostic_text(), "Traceback (most recent call last)");

        let err = PipelineError::Media("mux failed".into());
        assert!(err.diagnostic_text().contains("media processing failed"));
    }
}
