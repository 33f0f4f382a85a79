//! HTTP client for the generation service (OpenAI-compatible chat API).

use crate::config::Config;
use crate::services::TextGenerator;
use crate::util::truncate;
use serde::{Deserialize, Serialize};

/// Rate limit retry configuration
const MAX_HTTP_RETRIES: u32 = 3;
const INITIAL_BACKOFF_SECS: u64 = 2;
const BACKOFF_MULTIPLIER: u64 = 2;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    content: String,
}

/// Client for the Alchemyst generation endpoint.
pub struct GenerationClient {
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl GenerationClient {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let api_key = config.generation_api_key().ok_or_else(|| {
            anyhow::anyhow!(
                "ALCHEMYST_API_KEY not configured. Set the environment variable or add it to {}.",
                Config::config_location()
            )
        })?;
        Ok(Self {
            api_key,
            base_url: config.generation_base_url.clone(),
            model: config.generation_model.clone(),
            client: reqwest::Client::new(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

impl TextGenerator for GenerationClient {
    async fn complete(
        &self,
        system: &str,
        user: &str,
        temperature: Option<f32>,
    ) -> anyhow::Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature,
        };

        let mut retry_count = 0;

        loop {
            tracing::info!("sending request to generation service");
            let response = self
                .client
                .post(self.endpoint())
                .header("Content-Type", "application/json")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            let text = response.text().await?;

            if status.is_success() {
                let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
                    anyhow::anyhow!(
                        "Failed to parse generation response: {}\n{}",
                        e,
                        truncate(&text, 200)
                    )
                })?;

                let content = parsed
                    .choices
                    .first()
                    .map(|c| c.message.content.clone())
                    .unwrap_or_default();

                if content.trim().is_empty() {
                    return Err(anyhow::anyhow!("The generation service returned an empty response."));
                }

                tracing::info!("received response from generation service");
                return Ok(content);
            }

            if status.as_u16() == 429 && retry_count < MAX_HTTP_RETRIES {
                retry_count += 1;
                let backoff =
                    INITIAL_BACKOFF_SECS * BACKOFF_MULTIPLIER.pow(retry_count - 1);
                tracing::warn!(
                    "generation service rate limited; retrying in {}s (attempt {}/{})",
                    backoff,
                    retry_count,
                    MAX_HTTP_RETRIES
                );
                tokio::time::sleep(tokio::time::Duration::from_secs(backoff)).await;
                continue;
            }

            let error_msg = match status.as_u16() {
                401 => "Invalid generation API key. Check ALCHEMYST_API_KEY.".to_string(),
                429 => format!(
                    "Rate limited by the generation service after {} retries. Try again in a few minutes.",
                    retry_count
                ),
                500..=599 => format!(
                    "Generation service error ({}). The service may be temporarily unavailable.",
                    status
                ),
                _ => format!("Generation API error {}: {}", status, truncate(&text, 200)),
            };
            return Err(anyhow::anyhow!("{}", error_msg));
        }
    }
}
