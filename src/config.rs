//! Configuration management for animyst
//!
//! Stores settings in ~/.config/animyst/config.json. API keys come from the
//! environment first (`ALCHEMYST_API_KEY`, `ELEVENLABS_API_KEY`), then the
//! config file. Components receive their settings at construction; nothing
//! re-reads globals mid-run.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// One repair attempt by default, so at most two renders per run.
pub const DEFAULT_MAX_RETRIES: u32 = 1;

fn default_generation_base_url() -> String {
    "https://platform-backend.getalchemystai.com/api/v1/proxy/default".to_string()
}

fn default_generation_model() -> String {
    "alchemyst-ai/alchemyst-c1".to_string()
}

fn default_voice_id() -> String {
    // ElevenLabs voice "Rachel"
    "21m00Tcm4TlvDq8ikWAM".to_string()
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub alchemyst_api_key: Option<String>,
    pub elevenlabs_api_key: Option<String>,
    /// OpenAI-compatible chat-completions endpoint base URL
    #[serde(default = "default_generation_base_url")]
    pub generation_base_url: String,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    /// Voice used for narration audio
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    /// How many repair attempts to make after a failed render
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            alchemyst_api_key: None,
            elevenlabs_api_key: None,
            generation_base_url: default_generation_base_url(),
            generation_model: default_generation_model(),
            voice_id: default_voice_id(),
            max_retries: default_max_retries(),
        }
    }
}

impl Config {
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("animyst"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|p| p.join("config.json"))
    }

    /// Load config from disk, or return default
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            if let Ok(content) = fs::read_to_string(&path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(err) => {
                        preserve_corrupt_config(&path, &content);
                        tracing::warn!(
                            "config file was corrupted ({}); a backup was saved and defaults were loaded",
                            err
                        );
                    }
                }
            }
        }
        Self::default()
    }

    /// Save config to disk
    pub fn save(&self) -> anyhow::Result<()> {
        let dir = Self::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;

        fs::create_dir_all(&dir)
            .map_err(|e| anyhow::anyhow!("Failed to create config directory: {}", e))?;

        let path = dir.join("config.json");
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {}", e))?;

        fs::write(&path, content).map_err(|e| anyhow::anyhow!("Failed to write config: {}", e))?;
        Ok(())
    }

    /// Generation service API key (environment takes precedence)
    pub fn generation_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var("ALCHEMYST_API_KEY") {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }
        self.alchemyst_api_key.clone()
    }

    /// Speech service API key (environment takes precedence)
    pub fn speech_api_key(&self) -> Option<String> {
        if let Ok(key) = std::env::var("ELEVENLABS_API_KEY") {
            if !key.trim().is_empty() {
                return Some(key);
            }
        }
        self.elevenlabs_api_key.clone()
    }

    /// Config file location for display
    pub fn config_location() -> String {
        Self::config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "~/.config/animyst/config.json".to_string())
    }
}

fn preserve_corrupt_config(path: &std::path::Path, content: &str) {
    let corrupt_path = path.with_extension("json.corrupt");
    if fs::rename(path, &corrupt_path).is_err() {
        let _ = fs::write(&corrupt_path, content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.alchemyst_api_key.is_none());
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.generation_base_url.starts_with("https://"));
    }

    #[test]
    fn test_config_deserializes_partial_file() {
        let json = r#"{"alchemyst_api_key": "sk-test"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.alchemyst_api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.voice_id, default_voice_id());
        assert_eq!(config.max_retries, 1);
    }
}
