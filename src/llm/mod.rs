pub mod client;
pub mod generate;
pub mod parse;
pub mod prompts;
pub mod repair;

pub use client::GenerationClient;
pub use generate::{generate_scene, GenerationRequest};
pub use parse::{parse_generation, GenerationResult};
pub use repair::request_repair;
