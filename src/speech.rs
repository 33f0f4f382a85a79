//! Narration audio synthesis via the ElevenLabs HTTP API.
//!
//! Audio is a best-effort enhancement: the pipeline logs synthesis failures
//! and proceeds with a silent video rather than aborting.

use crate::config::Config;
use crate::services::SpeechSynthesizer;
use crate::util::truncate;
use serde::Serialize;
use std::path::{Path, PathBuf};

const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io/v1/text-to-speech";
const TTS_MODEL_ID: &str = "eleven_multilingual_v2";

#[derive(Serialize)]
struct TtsRequest {
    text: String,
    model_id: String,
}

/// Client for the ElevenLabs text-to-speech endpoint.
pub struct ElevenLabsClient {
    api_key: String,
    voice_id: String,
    client: reqwest::Client,
}

impl ElevenLabsClient {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let api_key = config.speech_api_key().ok_or_else(|| {
            anyhow::anyhow!(
                "ELEVENLABS_API_KEY not configured. Set the environment variable or add it to {}.",
                Config::config_location()
            )
        })?;
        Ok(Self {
            api_key,
            voice_id: config.voice_id.clone(),
            client: reqwest::Client::new(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}", ELEVENLABS_API_BASE, self.voice_id)
    }
}

impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, script: &str, output: &Path) -> anyhow::Result<PathBuf> {
        if script.trim().is_empty() {
            return Err(anyhow::anyhow!("script cannot be empty for audio generation"));
        }

        tracing::info!("generating audio for script: '{}'", truncate(script, 50));

        let request = TtsRequest {
            text: script.to_string(),
            model_id: TTS_MODEL_ID.to_string(),
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("xi-api-key", &self.api_key)
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "speech service error {}: {}",
                status,
                truncate(&text, 200)
            ));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Err(anyhow::anyhow!("speech service returned no audio data"));
        }

        std::fs::write(output, &bytes)
            .map_err(|e| anyhow::anyhow!("failed to write audio file {}: {}", output.display(), e))?;

        tracing::info!("audio saved to {}", output.display());
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_includes_voice_id() {
        let client = ElevenLabsClient {
            api_key: "key".to_string(),
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
            client: reqwest::Client::new(),
        };
        assert_eq!(
            client.endpoint(),
            "https://api.elevenlabs.io/v1/text-to-speech/21m00Tcm4TlvDq8ikWAM"
        );
    }

    #[tokio::test]
    async fn test_empty_script_is_rejected_before_any_request() {
        let client = ElevenLabsClient {
            api_key: "key".to_string(),
            voice_id: "voice".to_string(),
            client: reqwest::Client::new(),
        };
        let err = client
            .synthesize("   ", Path::new("out.mp3"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
