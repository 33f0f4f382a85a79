//! Extracts a (code, narration) pair from the generation service's raw text.
//!
//! Responses are expected to separate code and narration with a literal
//! `### NARRATION:` marker. When the marker is missing we fall back to the
//! first fenced Python block, treating everything after it as narration.

use crate::error::{PipelineError, PipelineResult};
use regex::Regex;
use std::sync::OnceLock;

pub const NARRATION_DELIMITER: &str = "### NARRATION:";
pub const CODE_LABEL: &str = "### MANIM CODE:";

const MANIM_IMPORT: &str = "from manim import *";
const NUMPY_IMPORT: &str = "import numpy as np";

/// The parsed output of one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    pub code: String,
    pub narration: String,
}

/// The recognized shapes of a raw generation response.
#[derive(Debug)]
enum ResponseShape<'a> {
    /// Code and narration separated by the literal delimiter.
    Delimited { code: &'a str, narration: &'a str },
    /// No delimiter; a fenced code block with trailing narration text.
    FencedBlock { code: &'a str, narration: &'a str },
}

fn fenced_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```python(.*?)```").expect("fenced block regex"))
}

/// Classify the raw response. The delimiter always wins over fence scanning,
/// even if both patterns are present; only the first delimiter occurrence
/// splits, so a delimiter-looking string inside the code cannot shift it.
fn classify(raw: &str) -> Option<ResponseShape<'_>> {
    if let Some((code, narration)) = raw.split_once(NARRATION_DELIMITER) {
        return Some(ResponseShape::Delimited { code, narration });
    }

    let captures = fenced_block_re().captures(raw)?;
    let code = captures.get(1)?.as_str();
    let narration = &raw[captures.get(0)?.end()..];
    Some(ResponseShape::FencedBlock { code, narration })
}

/// Parse a raw generation response into code and narration.
///
/// Fails only when no delimiter and no fenced code block exist. An empty
/// narration is accepted (logged, not an error).
pub fn parse_generation(raw: &str) -> PipelineResult<GenerationResult> {
    let shape = classify(raw).ok_or_else(|| {
        tracing::error!(
            "no code block in generation response: {}",
            crate::util::truncate(raw, 200)
        );
        PipelineError::Parse("no code block in response".to_string())
    })?;

    let (code_part, narration_part) = match shape {
        ResponseShape::Delimited { code, narration } => {
            tracing::info!("parsed response using '{}' delimiter", NARRATION_DELIMITER);
            (code, narration)
        }
        ResponseShape::FencedBlock { code, narration } => {
            tracing::warn!("delimiter not found; extracted first fenced code block");
            (code, narration)
        }
    };

    let code = normalize_imports(&strip_code_markers(code_part));
    let narration = narration_part.trim().to_string();

    if narration.is_empty() {
        tracing::warn!("narration extraction yielded empty text");
    }

    Ok(GenerationResult { code, narration })
}

/// Remove fence markers and the `### MANIM CODE:` section label from a code
/// part. The label survives a delimiter split and must not reach the renderer.
fn strip_code_markers(code: &str) -> String {
    code.replace("```python", "")
        .replace("```", "")
        .replace(CODE_LABEL, "")
        .trim()
        .to_string()
}

/// Ensure the animation and numeric library imports are present.
///
/// Idempotent: already-normalized code passes through unchanged. If the manim
/// import is missing both imports are prepended; if only numpy is missing it
/// is inserted directly after the manim import line.
pub fn normalize_imports(code: &str) -> String {
    if !code.contains(MANIM_IMPORT) {
        tracing::warn!("adding missing '{}'", MANIM_IMPORT);
        return format!("{}\n{}\n{}", MANIM_IMPORT, NUMPY_IMPORT, code);
    }

    if code.contains(NUMPY_IMPORT) {
        return code.to_string();
    }

    tracing::warn!("adding missing '{}'", NUMPY_IMPORT);
    let mut lines: Vec<&str> = code.lines().collect();
    if let Some(pos) = lines.iter().position(|line| line.contains(MANIM_IMPORT)) {
        lines.insert(pos + 1, NUMPY_IMPORT);
    }
    lines.join("\n")
}
