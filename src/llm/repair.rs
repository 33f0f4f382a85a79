//! Automated code repair after a failed render.
//!
//! Builds a prompt from the faulty code, the render diagnostic, and the
//! original intent, then delegates parsing to the response parser. A failure
//! here is terminal for the current render cycle; there is no nested
//! repair-of-repair.

use crate::error::PipelineResult;
use crate::llm::parse::{parse_generation, GenerationResult};
use crate::llm::prompts::{BASE_PROMPT_INSTRUCTIONS, SYSTEM_PROMPT};
use crate::services::TextGenerator;
use crate::util::tail_chars;

/// Lower than the generation default; fixes favor determinism over creativity.
const REPAIR_TEMPERATURE: f32 = 0.4;

/// Render diagnostics can run to tens of kilobytes of traceback; keep the
/// tail, where the actual error lives.
const MAX_DIAGNOSTIC_CHARS: usize = 8_000;

fn build_repair_prompt(faulty_code: &str, diagnostic: &str, original_intent: &str) -> String {
    format!(
        "The following Manim code, intended to '{}', failed with an error.\n\n\
         ### FAULTY CODE:\n\
         ```python\n{}\n```\n\n\
         ### ERROR MESSAGE:\n\
         ```\n{}\n```\n\n\
         ### INSTRUCTIONS:\n\
         1. Analyze the error message and the faulty code.\n\
         2. Correct the code to fix the specific error reported.\n\
         3. Ensure the corrected code still fulfills the original request and adheres strictly to *all* the requirements listed below.\n\
         4. Pay close attention to vector dimensions, matrix operations, allowed Manim methods, and total duration (30 seconds).\n\
         5. If the code logic changes significantly, update the narration accordingly.\n\
         6. Return *only* the corrected code and narration using the '### MANIM CODE:' and '### NARRATION:' delimiters, just like the original request.\n\n\
         ### REQUIREMENTS (Apply these to the corrected code):\n{}",
        original_intent,
        faulty_code,
        tail_chars(diagnostic, MAX_DIAGNOSTIC_CHARS),
        BASE_PROMPT_INSTRUCTIONS
    )
}

/// Ask the generation service to fix faulty code. Import normalization is
/// applied by the shared parser, same as for initial generation.
pub async fn request_repair<G: TextGenerator>(
    generator: &G,
    faulty_code: &str,
    diagnostic: &str,
    original_intent: &str,
) -> PipelineResult<GenerationResult> {
    tracing::info!("attempting to fix scene code via generation service");

    let user = build_repair_prompt(faulty_code, diagnostic, original_intent);
    let raw = generator
        .complete(SYSTEM_PROMPT, &user, Some(REPAIR_TEMPERATURE))
        .await?;

    let fixed = parse_generation(&raw)?;
    tracing::info!("parsed fixed code and narration from repair response");
    Ok(fixed)
}
