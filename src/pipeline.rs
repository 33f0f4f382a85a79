//! The generation orchestrator: a small explicit state machine that drives an
//! idea through script/code generation, audio synthesis, a bounded
//! render-retry loop with conditional repair and conditional audio resync,
//! and final audio/video reconciliation.
//!
//! One logical flow per request, no internal parallelism: each external call
//! blocks the pipeline until it completes. All temporary files created during
//! a run are removed on every terminal state.

use crate::error::{PipelineError, PipelineResult};
use crate::llm::generate::{generate_scene, GenerationRequest};
use crate::llm::parse::GenerationResult;
use crate::llm::repair::request_repair;
use crate::services::{MediaReconciler, SceneRenderer, SpeechSynthesizer, TextGenerator};
use crate::util::hash_str;
use std::fs;
use std::path::PathBuf;

/// The only state externalized to the caller on success.
#[derive(Debug, Clone)]
pub struct FinalArtifact {
    pub video_path: PathBuf,
    pub script: String,
    pub code: String,
}

/// Snapshot of one render cycle. Superseded by the next attempt's values on
/// repair, discarded once the loop ends.
#[derive(Debug)]
struct Attempt {
    index: u32,
    code: String,
    narration: String,
    audio: Option<PathBuf>,
}

/// Orchestrator states. `Success`/`Failed` are expressed as early returns
/// from the transition loop.
enum State {
    Generating,
    Synthesizing(GenerationResult),
    Rendering(Attempt),
    Repairing { attempt: Attempt, diagnostic: String },
    Resyncing(Attempt),
}

/// Files owned by the orchestrator (per-attempt audio). Removed at every
/// terminal state; `Drop` is the backstop if the run unwinds.
#[derive(Default)]
struct TempFiles {
    paths: Vec<PathBuf>,
}

impl TempFiles {
    fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    fn cleanup(&mut self) {
        for path in self.paths.drain(..) {
            if path.exists() {
                match fs::remove_file(&path) {
                    Ok(()) => tracing::debug!("removed temporary file {}", path.display()),
                    Err(e) => tracing::warn!("failed to remove {}: {}", path.display(), e),
                }
            }
        }
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        self.cleanup();
    }
}

pub struct Pipeline<G, S, R, M> {
    generator: G,
    speech: Option<S>,
    renderer: R,
    media: M,
    workdir: PathBuf,
    max_retries: u32,
}

impl<G, S, R, M> Pipeline<G, S, R, M>
where
    G: TextGenerator,
    S: SpeechSynthesizer,
    R: SceneRenderer,
    M: MediaReconciler,
{
    pub fn new(
        generator: G,
        speech: Option<S>,
        renderer: R,
        media: M,
        workdir: impl Into<PathBuf>,
        max_retries: u32,
    ) -> Self {
        Self {
            generator,
            speech,
            renderer,
            media,
            workdir: workdir.into(),
            max_retries,
        }
    }

    /// Run the full pipeline for one request. Exactly one terminal outcome:
    /// a `FinalArtifact`, or the most specific failure captured.
    pub async fn run(&self, request: &GenerationRequest) -> PipelineResult<FinalArtifact> {
        let mut temps = TempFiles::default();
        let result = self.drive(request, &mut temps).await;
        temps.cleanup();
        result
    }

    async fn drive(
        &self,
        request: &GenerationRequest,
        temps: &mut TempFiles,
    ) -> PipelineResult<FinalArtifact> {
        let mut state = State::Generating;

        loop {
            state = match state {
                State::Generating => {
                    let result = generate_scene(&self.generator, request, &self.workdir).await?;
                    State::Synthesizing(result)
                }

                State::Synthesizing(result) => {
                    // Unique per-script name so stale audio from an earlier
                    // run is never picked up.
                    let filename = format!("initial_audio_{}.mp3", hash_str(&result.narration));
                    let audio = self.synthesize_audio(&result.narration, &filename, temps).await;
                    State::Rendering(Attempt {
                        index: 0,
                        code: result.code,
                        narration: result.narration,
                        audio,
                    })
                }

                State::Rendering(attempt) => {
                    tracing::info!("render attempt {}", attempt.index + 1);
                    match self.renderer.render(&attempt.code) {
                        Ok(video) => {
                            let video_path =
                                self.media.reconcile(&video, attempt.audio.as_deref())?;
                            tracing::info!("video generated at {}", video_path.display());
                            return Ok(FinalArtifact {
                                video_path,
                                script: attempt.narration,
                                code: attempt.code,
                            });
                        }
                        Err(e) if e.is_recoverable() && attempt.index < self.max_retries => {
                            tracing::warn!(
                                "render attempt {} failed; requesting code repair",
                                attempt.index + 1
                            );
                            State::Repairing {
                                diagnostic: e.diagnostic_text(),
                                attempt,
                            }
                        }
                        // Covers both recoverable failures with no retries
                        // left (surfacing the last diagnostic) and fatal
                        // non-render errors (no retry at all).
                        Err(e) => return Err(e),
                    }
                }

                State::Repairing { attempt, diagnostic } => {
                    let fixed = match request_repair(
                        &self.generator,
                        &attempt.code,
                        &diagnostic,
                        &request.intent_text(),
                    )
                    .await
                    {
                        Ok(fixed) => fixed,
                        Err(e) => {
                            tracing::error!("repair failed to produce usable code: {}", e);
                            return Err(PipelineError::RepairExhausted {
                                diagnostic: e.to_string(),
                            });
                        }
                    };

                    let narration_changed =
                        fixed.narration.trim() != attempt.narration.trim();
                    let next = Attempt {
                        index: attempt.index + 1,
                        code: fixed.code,
                        narration: if narration_changed {
                            fixed.narration
                        } else {
                            attempt.narration
                        },
                        audio: attempt.audio,
                    };

                    if narration_changed {
                        tracing::info!("narration was updated; regenerating audio");
                        State::Resyncing(next)
                    } else {
                        State::Rendering(next)
                    }
                }

                State::Resyncing(mut attempt) => {
                    let filename = format!("fixed_audio_{}.mp3", attempt.index - 1);
                    // Best-effort: on failure the previous audio is kept and
                    // the retry proceeds.
                    if let Some(path) =
                        self.synthesize_audio(&attempt.narration, &filename, temps).await
                    {
                        attempt.audio = Some(path);
                    }
                    State::Rendering(attempt)
                }
            };
        }
    }

    /// Best-effort audio synthesis. Returns `None` when no speech service is
    /// configured, the narration is empty, or the call fails.
    async fn synthesize_audio(
        &self,
        narration: &str,
        filename: &str,
        temps: &mut TempFiles,
    ) -> Option<PathBuf> {
        let speech = self.speech.as_ref()?;
        if narration.trim().is_empty() {
            tracing::warn!("narration is empty; skipping audio");
            return None;
        }

        let output = self.workdir.join(filename);
        match speech.synthesize(narration, &output).await {
            Ok(path) => {
                temps.track(path.clone());
                Some(path)
            }
            Err(e) => {
                tracing::warn!("could not generate audio: {}; proceeding without audio", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::parse::NARRATION_DELIMITER;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn delimited(code_body: &str, narration: &str) -> String {
        format!(
            "```python\nfrom manim import *\nimport numpy as np\n{}\n```\n{}\n{}",
            code_body, NARRATION_DELIMITER, narration
        )
    }

    struct FakeGenerator {
        responses: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl FakeGenerator {
        fn new(responses: Vec<String>) -> Self {
            let mut responses = responses;
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl TextGenerator for FakeGenerator {
        async fn complete(
            &self,
            _system: &str,
            _user: &str,
            _temperature: Option<f32>,
        ) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| anyhow::anyhow!("generation service unavailable"))
        }
    }

    struct FakeSpeech {
        fail_from_call: usize,
        calls: AtomicUsize,
    }

    impl FakeSpeech {
        fn working() -> Self {
            Self {
                fail_from_call: usize::MAX,
                calls: AtomicUsize::new(0),
            }
        }

        fn broken() -> Self {
            Self {
                fail_from_call: 0,
                calls: AtomicUsize::new(0),
            }
        }

        /// Succeeds for the first `n` calls, fails from then on.
        fn failing_after(n: usize) -> Self {
            Self {
                fail_from_call: n,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SpeechSynthesizer for FakeSpeech {
        async fn synthesize(&self, _script: &str, output: &Path) -> anyhow::Result<PathBuf> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.fail_from_call {
                return Err(anyhow::anyhow!("speech service down"));
            }
            fs::write(output, b"mp3")?;
            Ok(output.to_path_buf())
        }
    }

    enum FakeRenderOutcome {
        Video(PathBuf),
        RenderError(String),
        Fatal(String),
    }

    struct FakeRenderer {
        outcomes: Mutex<Vec<FakeRenderOutcome>>,
        calls: AtomicUsize,
    }

    impl FakeRenderer {
        fn new(outcomes: Vec<FakeRenderOutcome>) -> Self {
            let mut outcomes = outcomes;
            outcomes.reverse();
            Self {
                outcomes: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl SceneRenderer for FakeRenderer {
        fn render(&self, _code: &str) -> PipelineResult<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.outcomes.lock().unwrap().pop() {
                Some(FakeRenderOutcome::Video(path)) => Ok(path),
                Some(FakeRenderOutcome::RenderError(diagnostic)) => {
                    Err(PipelineError::Render { diagnostic })
                }
                Some(FakeRenderOutcome::Fatal(msg)) => Err(PipelineError::SceneNotFound(msg)),
                None => panic!("renderer called more times than scripted"),
            }
        }
    }

    #[derive(Default)]
    struct FakeMedia {
        calls: AtomicUsize,
        saw_audio: Mutex<Option<bool>>,
        last_audio: Mutex<Option<PathBuf>>,
    }

    impl MediaReconciler for FakeMedia {
        fn reconcile(&self, video: &Path, audio: Option<&Path>) -> PipelineResult<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.saw_audio.lock().unwrap() = Some(audio.is_some());
            *self.last_audio.lock().unwrap() = audio.map(Path::to_path_buf);
            Ok(video.to_path_buf())
        }
    }

    fn pipeline(
        generator: FakeGenerator,
        speech: Option<FakeSpeech>,
        renderer: FakeRenderer,
        workdir: &Path,
        max_retries: u32,
    ) -> Pipeline<FakeGenerator, FakeSpeech, FakeRenderer, FakeMedia> {
        Pipeline::new(
            generator,
            speech,
            renderer,
            FakeMedia::default(),
            workdir,
            max_retries,
        )
    }

    #[tokio::test]
    async fn test_happy_path_first_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("scene.mp4");
        let p = pipeline(
            FakeGenerator::new(vec![delimited(
                "class Pythagoras(Scene): pass",
                "A right triangle has a special property.",
            )]),
            Some(FakeSpeech::working()),
            FakeRenderer::new(vec![FakeRenderOutcome::Video(video.clone())]),
            dir.path(),
            1,
        );

        let request = GenerationRequest::Idea("explain the Pythagorean theorem".to_string());
        let artifact = p.run(&request).await.unwrap();

        assert_eq!(artifact.video_path, video);
        assert!(artifact.code.contains("class Pythagoras(Scene)"));
        assert!(artifact.script.contains("special property"));
        assert_eq!(p.generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(p.speech.as_ref().unwrap().calls.load(Ordering::SeqCst), 1);
        assert_eq!(p.media.saw_audio.lock().unwrap().unwrap(), true);
    }

    #[tokio::test]
    async fn test_audio_files_removed_after_success() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("scene.mp4");
        let p = pipeline(
            FakeGenerator::new(vec![delimited("class A(Scene): pass", "Narration.")]),
            Some(FakeSpeech::working()),
            FakeRenderer::new(vec![FakeRenderOutcome::Video(video)]),
            dir.path(),
            1,
        );

        let request = GenerationRequest::Idea("idea".to_string());
        p.run(&request).await.unwrap();

        let leftover_audio: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".mp3"))
            .collect();
        assert!(leftover_audio.is_empty());
    }

    #[tokio::test]
    async fn test_audio_files_removed_after_failed_run() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            FakeGenerator::new(vec![
                delimited("class A(Scene): broken()", "Words."),
                delimited("class A(Scene): still_broken()", "Words."),
            ]),
            Some(FakeSpeech::working()),
            FakeRenderer::new(vec![
                FakeRenderOutcome::RenderError("first failure".to_string()),
                FakeRenderOutcome::RenderError("second failure".to_string()),
            ]),
            dir.path(),
            1,
        );

        let request = GenerationRequest::Idea("idea".to_string());
        let err = p.run(&request).await.unwrap_err();
        assert!(matches!(err, PipelineError::Render { .. }));

        let leftover_audio: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".mp3"))
            .collect();
        assert!(leftover_audio.is_empty());
    }

    #[tokio::test]
    async fn test_repair_with_identical_narration_skips_resync() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("scene.mp4");
        let p = pipeline(
            FakeGenerator::new(vec![
                delimited("class A(Scene): broken()", "Same words."),
                delimited("class A(Scene): fixed()", "Same words."),
            ]),
            Some(FakeSpeech::working()),
            FakeRenderer::new(vec![
                FakeRenderOutcome::RenderError("NameError: broken".to_string()),
                FakeRenderOutcome::Video(video),
            ]),
            dir.path(),
            1,
        );

        let request = GenerationRequest::Idea("idea".to_string());
        let artifact = p.run(&request).await.unwrap();

        assert!(artifact.code.contains("fixed()"));
        assert_eq!(p.renderer.calls.load(Ordering::SeqCst), 2);
        // No audio resynthesis when the narration is textually identical.
        assert_eq!(p.speech.as_ref().unwrap().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repair_with_changed_narration_resynthesizes_audio() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("scene.mp4");
        let p = pipeline(
            FakeGenerator::new(vec![
                delimited("class A(Scene): broken()", "Old words."),
                delimited("class A(Scene): fixed()", "New words."),
            ]),
            Some(FakeSpeech::working()),
            FakeRenderer::new(vec![
                FakeRenderOutcome::RenderError("ValueError".to_string()),
                FakeRenderOutcome::Video(video),
            ]),
            dir.path(),
            1,
        );

        let request = GenerationRequest::Idea("idea".to_string());
        let artifact = p.run(&request).await.unwrap();

        assert!(artifact.script.contains("New words."));
        assert_eq!(p.speech.as_ref().unwrap().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_resync_keeps_previous_audio() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("scene.mp4");
        let p = pipeline(
            FakeGenerator::new(vec![
                delimited("class A(Scene): broken()", "Old words."),
                delimited("class A(Scene): fixed()", "New words."),
            ]),
            // Initial synthesis succeeds; the resynthesis after the
            // narration change fails.
            Some(FakeSpeech::failing_after(1)),
            FakeRenderer::new(vec![
                FakeRenderOutcome::RenderError("ValueError".to_string()),
                FakeRenderOutcome::Video(video.clone()),
            ]),
            dir.path(),
            1,
        );

        let request = GenerationRequest::Idea("idea".to_string());
        let artifact = p.run(&request).await.unwrap();

        assert_eq!(artifact.video_path, video);
        assert!(artifact.script.contains("New words."));
        assert_eq!(p.speech.as_ref().unwrap().calls.load(Ordering::SeqCst), 2);

        // Reconciliation still ran with the audio from the first synthesis.
        let last_audio = p.media.last_audio.lock().unwrap().clone().unwrap();
        let name = last_audio.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("initial_audio_"));
    }

    #[tokio::test]
    async fn test_retries_exhausted_surfaces_last_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            FakeGenerator::new(vec![
                delimited("class A(Scene): broken()", "Words."),
                delimited("class A(Scene): still_broken()", "Words."),
            ]),
            Some(FakeSpeech::working()),
            FakeRenderer::new(vec![
                FakeRenderOutcome::RenderError("first failure".to_string()),
                FakeRenderOutcome::RenderError("second failure".to_string()),
            ]),
            dir.path(),
            1,
        );

        let request = GenerationRequest::Idea("idea".to_string());
        let err = p.run(&request).await.unwrap_err();

        match err {
            PipelineError::Render { diagnostic } => assert_eq!(diagnostic, "second failure"),
            other => panic!("expected render error, got {:?}", other),
        }
        // max_retries + 1 render attempts, and no repair after the final one.
        assert_eq!(p.renderer.calls.load(Ordering::SeqCst), 2);
        assert_eq!(p.generator.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unparseable_repair_is_repair_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            FakeGenerator::new(vec![
                delimited("class A(Scene): broken()", "Words."),
                "I'm sorry, I can't fix this.".to_string(),
            ]),
            Some(FakeSpeech::working()),
            FakeRenderer::new(vec![FakeRenderOutcome::RenderError("boom".to_string())]),
            dir.path(),
            1,
        );

        let request = GenerationRequest::Idea("idea".to_string());
        let err = p.run(&request).await.unwrap_err();
        assert!(matches!(err, PipelineError::RepairExhausted { .. }));
    }

    #[tokio::test]
    async fn test_fatal_render_error_is_never_retried() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            FakeGenerator::new(vec![delimited("class A(Scene): pass", "Words.")]),
            Some(FakeSpeech::working()),
            FakeRenderer::new(vec![FakeRenderOutcome::Fatal(
                "no Scene class found".to_string(),
            )]),
            dir.path(),
            3,
        );

        let request = GenerationRequest::Idea("idea".to_string());
        let err = p.run(&request).await.unwrap_err();

        assert!(matches!(err, PipelineError::SceneNotFound(_)));
        assert_eq!(p.renderer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(p.generator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_speech_failure_degrades_to_silent_video() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("scene.mp4");
        let p = pipeline(
            FakeGenerator::new(vec![delimited("class A(Scene): pass", "Words.")]),
            Some(FakeSpeech::broken()),
            FakeRenderer::new(vec![FakeRenderOutcome::Video(video.clone())]),
            dir.path(),
            1,
        );

        let request = GenerationRequest::Idea("idea".to_string());
        let artifact = p.run(&request).await.unwrap();

        assert_eq!(artifact.video_path, video);
        assert_eq!(p.media.saw_audio.lock().unwrap().unwrap(), false);
    }

    #[tokio::test]
    async fn test_no_speech_service_renders_silent_video() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("scene.mp4");
        let p = pipeline(
            FakeGenerator::new(vec![delimited("class A(Scene): pass", "Words.")]),
            None,
            FakeRenderer::new(vec![FakeRenderOutcome::Video(video)]),
            dir.path(),
            1,
        );

        let request = GenerationRequest::Idea("idea".to_string());
        let artifact = p.run(&request).await.unwrap();
        assert_eq!(p.media.saw_audio.lock().unwrap().unwrap(), false);
        assert!(!artifact.script.is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_is_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(
            FakeGenerator::new(vec![]),
            Some(FakeSpeech::working()),
            FakeRenderer::new(vec![]),
            dir.path(),
            1,
        );

        let request = GenerationRequest::Idea("idea".to_string());
        let err = p.run(&request).await.unwrap_err();
        assert!(matches!(err, PipelineError::Service(_)));
        assert_eq!(p.renderer.calls.load(Ordering::SeqCst), 0);
    }
}
