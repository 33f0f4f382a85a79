//! Animyst library crate
//!
//! Exposes the generation pipeline so tests and external tooling can drive
//! it without going through CLI startup.

pub mod config;
pub mod error;
pub mod llm;
pub mod media;
pub mod pipeline;
pub mod render;
pub mod services;
pub mod speech;
pub mod util;

pub use error::{PipelineError, PipelineResult};
pub use llm::{GenerationRequest, GenerationResult};
pub use pipeline::{FinalArtifact, Pipeline};
