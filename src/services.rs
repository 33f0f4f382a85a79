//! Contracts for the external collaborators.
//!
//! The pipeline is generic over these four traits so the state machine can be
//! exercised with fakes instead of real network calls and subprocesses.

use crate::error::PipelineResult;
use std::path::{Path, PathBuf};

/// A code-generation model: system + user prompt in, free text out.
pub trait TextGenerator {
    /// `temperature == None` uses the service default.
    fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: Option<f32>,
    ) -> impl std::future::Future<Output = anyhow::Result<String>> + Send;
}

/// A text-to-speech service that writes an audio artifact to `output`.
pub trait SpeechSynthesizer {
    fn synthesize(
        &self,
        script: &str,
        output: &Path,
    ) -> impl std::future::Future<Output = anyhow::Result<PathBuf>> + Send;
}

/// The render engine: source code in, path to a rendered video out.
///
/// Failures must distinguish render-tool diagnostics (recoverable, fed to the
/// repair loop) from everything else via `PipelineError::is_recoverable`.
pub trait SceneRenderer {
    fn render(&self, code: &str) -> PipelineResult<PathBuf>;
}

/// Aligns audio and video durations and combines them into one file.
///
/// `audio == None` (or a missing file) returns the video unchanged; a silent
/// video is an accepted degraded outcome, never an error.
pub trait MediaReconciler {
    fn reconcile(&self, video: &Path, audio: Option<&Path>) -> PipelineResult<PathBuf>;
}
