//! Invokes the Manim render engine on generated scene code.
//!
//! The working file name, quality flag, and output path convention are fixed:
//! code is written to `generated_video.py` in the working directory, rendered
//! with `manim -qh`, and the result is expected at
//! `media/videos/generated_video/1080p60/<SceneName>.mp4`. Single-slot: at
//! most one generation may be in flight per working directory.

use crate::error::{PipelineError, PipelineResult};
use crate::services::SceneRenderer;
use crate::util::{run_command, tail_chars};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const SCENE_FILE: &str = "generated_video.py";
const QUALITY_FLAG: &str = "-qh";
const QUALITY_DIR: &str = "1080p60";
const RENDER_PROGRAM: &str = "manim";

/// How much of the render tool's stderr to keep in diagnostics.
const DIAGNOSTIC_TAIL_CHARS: usize = 8_000;

fn scene_class_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"class\s+(\w+)\s*\(\s*Scene\s*\)").expect("scene class regex"))
}

/// Locate the unique scene-class declaration in generated code.
///
/// Zero or multiple matches fail: the design mandates exactly one scene per
/// generation, so either case is a defect in the generated code and is never
/// sent through the repair loop for the ambiguity itself.
pub fn extract_scene_name(code: &str) -> PipelineResult<String> {
    let mut names = scene_class_re()
        .captures_iter(code)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let first = names
        .next()
        .ok_or_else(|| PipelineError::SceneNotFound("no Scene class found in generated code".to_string()))?;

    if let Some(second) = names.next() {
        return Err(PipelineError::SceneNotFound(format!(
            "multiple Scene classes found in generated code ('{}', '{}', ...); expected exactly one",
            first, second
        )));
    }

    Ok(first)
}

/// Deterministic location of the rendered video for a scene, derived from the
/// working file stem and the fixed quality profile.
pub fn rendered_video_path(workdir: &Path, scene_name: &str) -> PathBuf {
    let stem = Path::new(SCENE_FILE)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("generated_video");
    workdir
        .join("media")
        .join("videos")
        .join(stem)
        .join(QUALITY_DIR)
        .join(format!("{}.mp4", scene_name))
}

/// Render adapter backed by the `manim` CLI.
pub struct ManimRenderer {
    workdir: PathBuf,
}

impl ManimRenderer {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    fn render_scene(&self, scene_name: &str) -> PipelineResult<PathBuf> {
        tracing::info!("rendering scene '{}' with {}", scene_name, RENDER_PROGRAM);

        let output = run_command(
            RENDER_PROGRAM,
            &[QUALITY_FLAG, SCENE_FILE, scene_name],
            &self.workdir,
        )?;

        if !output.success {
            let diagnostic = if output.stderr.trim().is_empty() {
                tail_chars(&output.stdout, DIAGNOSTIC_TAIL_CHARS)
            } else {
                tail_chars(&output.stderr, DIAGNOSTIC_TAIL_CHARS)
            };
            tracing::error!(
                "render process exited with {:?}",
                output.exit_code
            );
            return Err(PipelineError::Render { diagnostic });
        }

        let video = rendered_video_path(&self.workdir, scene_name);
        if !video.exists() {
            // A zero exit without the expected artifact still goes through
            // the repair loop: some code-level defects (bad object
            // construction) surface this way instead of a nonzero exit.
            tracing::error!("no rendered video found at {}", video.display());
            return Err(PipelineError::Render {
                diagnostic: format!(
                    "render reported success but no video was produced at {}",
                    video.display()
                ),
            });
        }

        tracing::info!("rendered video at {}", video.display());
        Ok(video)
    }
}

impl SceneRenderer for ManimRenderer {
    fn render(&self, code: &str) -> PipelineResult<PathBuf> {
        let scene_name = extract_scene_name(code)?;

        let scene_path = self.workdir.join(SCENE_FILE);
        fs::write(&scene_path, code).map_err(|e| {
            PipelineError::Service(anyhow::anyhow!(
                "failed to write scene file {}: {}",
                scene_path.display(),
                e
            ))
        })?;

        // The working file is removed on every exit path; a stale scene file
        // would corrupt the next run.
        let outcome = self.render_scene(&scene_name);
        if let Err(e) = fs::remove_file(&scene_path) {
            tracing::warn!("failed to remove {}: {}", scene_path.display(), e);
        }
        outcome
    }
}
