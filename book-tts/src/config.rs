//! book-tts configuration management.

use crate::batch::DEFAULT_RATE_LIMIT_SLEEP;
use crate::text::splitter::DEFAULT_MAX_CHARS;
use crate::tts::client::DEFAULT_TIMEOUT;
use crate::tts::{Container, RetryPolicy, VoiceOptions};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_MAX_CONTENT_TOKENS: usize = 9500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookTtsConfig {
    /// Raw book text for the clean stage
    #[serde(default = "default_book_path")]
    pub book_path: PathBuf,

    /// Root of cleaned text, piece files and audio
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,

    /// LLM preset name from llm.toml. None uses its default preset.
    #[serde(default)]
    pub model_preset: Option<String>,

    /// Token budget per cleaning request
    #[serde(default = "default_max_content_tokens")]
    pub max_content_tokens: usize,

    /// Character budget per TTS piece
    #[serde(default = "default_tts_chunk_size")]
    pub tts_chunk_size: usize,

    /// Hugging Face tokenizer.json for exact token counts
    #[serde(default)]
    pub tokenizer_path: Option<PathBuf>,

    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default)]
    pub role: Option<String>,

    #[serde(default = "default_speed")]
    pub speed: f32,

    #[serde(default = "default_container")]
    pub container: Container,

    /// Seconds to pause after each synthesis call
    #[serde(default = "default_rate_limit_sleep")]
    pub rate_limit_sleep: f64,

    /// Total attempts per piece
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Override for the synthesis endpoint
    #[serde(default)]
    pub speechkit_url: Option<String>,
}

fn default_book_path() -> PathBuf {
    PathBuf::from("./data/book.txt")
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("./out")
}

fn default_max_content_tokens() -> usize {
    DEFAULT_MAX_CONTENT_TOKENS
}

fn default_tts_chunk_size() -> usize {
    DEFAULT_MAX_CHARS
}

fn default_voice() -> String {
    VoiceOptions::default().voice
}

fn default_speed() -> f32 {
    VoiceOptions::default().speed
}

fn default_container() -> Container {
    VoiceOptions::default().container
}

fn default_rate_limit_sleep() -> f64 {
    DEFAULT_RATE_LIMIT_SLEEP.as_secs_f64()
}

fn default_retries() -> u32 {
    RetryPolicy::default().attempts
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl Default for BookTtsConfig {
    fn default() -> Self {
        Self {
            book_path: default_book_path(),
            out_dir: default_out_dir(),
            model_preset: None,
            max_content_tokens: default_max_content_tokens(),
            tts_chunk_size: default_tts_chunk_size(),
            tokenizer_path: None,
            voice: default_voice(),
            role: None,
            speed: default_speed(),
            container: default_container(),
            rate_limit_sleep: default_rate_limit_sleep(),
            retries: default_retries(),
            timeout_secs: default_timeout_secs(),
            speechkit_url: None,
        }
    }
}

impl BookTtsConfig {
    /// Get the config file path: ~/.config/book-tts/book-tts.toml
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(".config").join("book-tts").join("book-tts.toml"))
    }

    /// Load config from file, returning default if file doesn't exist
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let config: BookTtsConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(&path, content)?;
        Ok(())
    }

    /// Apply `BOOK_PATH`, `OUT_DIR` and `MAX_CONTENT_TOKENS` over the file
    /// values. Blank variables are ignored.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(path) = get("BOOK_PATH") {
            self.book_path = PathBuf::from(path);
        }
        if let Some(dir) = get("OUT_DIR") {
            self.out_dir = PathBuf::from(dir);
        }
        if let Some(tokens) = get("MAX_CONTENT_TOKENS") {
            self.max_content_tokens = tokens
                .parse()
                .with_context(|| format!("Invalid MAX_CONTENT_TOKENS: {}", tokens))?;
        }
        Ok(self)
    }

    pub fn pieces_dir(&self) -> PathBuf {
        self.out_dir.join(crate::clean::PIECES_DIR)
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.out_dir.join("audio")
    }

    pub fn voice_options(&self) -> VoiceOptions {
        VoiceOptions::new()
            .with_voice(self.voice.clone())
            .with_role(self.role.as_deref())
            .with_speed(self.speed)
            .with_container(self.container)
    }

    /// Pause after each synthesis call; negative values count as zero.
    pub fn rate_limit(&self) -> Duration {
        Duration::try_from_secs_f64(self.rate_limit_sleep).unwrap_or(Duration::ZERO)
    }
}
