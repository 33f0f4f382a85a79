//! Initial script/code generation from an idea or a document.

use crate::error::{PipelineError, PipelineResult};
use crate::llm::parse::{parse_generation, GenerationResult};
use crate::llm::prompts::{format_examples_section, BASE_PROMPT_INSTRUCTIONS, SYSTEM_PROMPT};
use crate::services::TextGenerator;
use crate::util::truncate;
use std::fs;
use std::path::{Path, PathBuf};

/// Optional curated renderer examples used to prime the model.
const EXAMPLES_FILE: &str = "rules.md";

/// What the user asked to animate. Idea and document are mutually exclusive;
/// the document takes precedence when both are supplied.
#[derive(Debug, Clone)]
pub enum GenerationRequest {
    Idea(String),
    Document(PathBuf),
}

impl GenerationRequest {
    /// Validate and build a request from CLI parts. An empty idea and no
    /// document is invalid; both given discards the idea with a warning.
    pub fn from_parts(
        idea: Option<String>,
        document: Option<PathBuf>,
    ) -> PipelineResult<Self> {
        let idea = idea.map(|i| i.trim().to_string()).filter(|i| !i.is_empty());

        match (idea, document) {
            (Some(_), Some(doc)) => {
                tracing::warn!("both idea and document provided; using the document");
                Ok(GenerationRequest::Document(doc))
            }
            (None, Some(doc)) => Ok(GenerationRequest::Document(doc)),
            (Some(idea), None) => Ok(GenerationRequest::Idea(idea)),
            (None, None) => Err(PipelineError::InvalidInput(
                "please enter an idea or a document to generate a video".to_string(),
            )),
        }
    }

    /// Short human-readable description of the original intent, embedded in
    /// repair prompts.
    pub fn intent_text(&self) -> String {
        match self {
            GenerationRequest::Idea(idea) => idea.clone(),
            GenerationRequest::Document(path) => {
                format!("summarize the document at {}", path.display())
            }
        }
    }
}

/// Load the curated examples file next to the working directory, if present.
fn load_reference_examples(workdir: &Path) -> Option<String> {
    let path = workdir.join(EXAMPLES_FILE);
    match fs::read_to_string(&path) {
        Ok(content) if !content.trim().is_empty() => {
            tracing::info!("loaded renderer examples from {}", path.display());
            Some(content)
        }
        _ => {
            tracing::debug!("no renderer examples at {}", path.display());
            None
        }
    }
}

fn request_text(request: &GenerationRequest) -> PipelineResult<String> {
    match request {
        GenerationRequest::Idea(idea) => {
            tracing::info!("generating video for idea: {}", truncate(idea, 50));
            Ok(format!(
                "Create a 30-second Manim video script about '{}'. {}",
                idea, BASE_PROMPT_INSTRUCTIONS
            ))
        }
        GenerationRequest::Document(path) => {
            let content = fs::read_to_string(path).map_err(|e| {
                PipelineError::InvalidInput(format!(
                    "could not read document {}: {}",
                    path.display(),
                    e
                ))
            })?;
            if content.trim().is_empty() {
                return Err(PipelineError::InvalidInput(format!(
                    "document {} is empty",
                    path.display()
                )));
            }
            tracing::info!("generating video from document: {}", path.display());
            Ok(format!(
                "Create a 30-second Manim video script summarizing the key points or illustrating a core concept from the document content below.\n\n--- DOCUMENT CONTENT ---\n{}\n--- END DOCUMENT CONTENT ---\n\n{}",
                content, BASE_PROMPT_INSTRUCTIONS
            ))
        }
    }
}

/// Generate the initial scene code and narration. Any failure here is
/// terminal; the repair loop only applies to render-time failures.
pub async fn generate_scene<G: TextGenerator>(
    generator: &G,
    request: &GenerationRequest,
    workdir: &Path,
) -> PipelineResult<GenerationResult> {
    let mut prompt_parts = Vec::new();

    if let Some(examples) = load_reference_examples(workdir) {
        prompt_parts.push(format_examples_section(&examples));
    }

    prompt_parts.push(request_text(request)?);
    let user_prompt = prompt_parts.join("\n\n");

    let raw = generator.complete(SYSTEM_PROMPT, &user_prompt, None).await?;
    parse_generation(&raw)
}
