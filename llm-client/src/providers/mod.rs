//! LLM provider implementations

mod fallback;
pub mod mock;
mod openai;

pub use fallback::FallbackProvider;
pub use mock::MockProvider;
pub use openai::{OPENAI_BASE_URL, OpenAIChatProvider, OpenAIResponsesProvider};

use crate::config::{ModelPreset, ProviderConfig};
use crate::error::{LlmError, Result};
use crate::provider::LlmProvider;

/// Supported provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// api.openai.com: chat completions with responses-API fallback
    OpenAI,
    /// Any server speaking the chat completions API
    OpenAICompatible,
}

impl ProviderKind {
    /// Parse provider kind from string
    pub fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "openai-compatible" | "openai_compatible" | "compatible" => Ok(Self::OpenAICompatible),
            _ => Err(LlmError::ConfigError(format!("Unknown provider: {}", s))),
        }
    }

    /// Get the environment variable name for this provider's API key
    pub fn env_var(&self) -> &'static str {
        match self {
            Self::OpenAI => "OPENAI_API_KEY",
            Self::OpenAICompatible => "OPENAI_COMPATIBLE_API_KEY",
        }
    }
}

/// Create a provider instance from a preset and optional config
pub fn get_provider(
    preset: &ModelPreset,
    provider_config: Option<&ProviderConfig>,
) -> Result<Box<dyn LlmProvider>> {
    let kind = ProviderKind::from_str(&preset.provider)?;
    let api_key = get_api_key(provider_config, kind.env_var(), &preset.provider)?;

    match kind {
        ProviderKind::OpenAI => {
            let base_url = provider_config
                .and_then(|c| c.base_url.as_deref())
                .unwrap_or(OPENAI_BASE_URL);
            let chat = OpenAIChatProvider::new(&preset.model, base_url, api_key.clone(), "OpenAI chat");
            let responses = OpenAIResponsesProvider::new(&preset.model, base_url, api_key);
            Ok(Box::new(FallbackProvider::new(
                Box::new(chat),
                Box::new(responses),
            )))
        }
        ProviderKind::OpenAICompatible => {
            let base_url = provider_config
                .and_then(|c| c.base_url.as_deref())
                .ok_or_else(|| {
                    LlmError::ConfigError(
                        "openai-compatible provider needs base_url in [providers.openai-compatible]"
                            .into(),
                    )
                })?;
            Ok(Box::new(OpenAIChatProvider::new(
                &preset.model,
                base_url,
                api_key,
                "OpenAI-compatible",
            )))
        }
    }
}

/// Get API key from config or environment variable; blank values count as missing
fn get_api_key(
    config: Option<&ProviderConfig>,
    env_var: &str,
    provider_name: &str,
) -> Result<String> {
    if let Some(key) = config
        .and_then(|c| c.api_key.clone())
        .filter(|k| !k.trim().is_empty())
    {
        return Ok(key);
    }

    std::env::var(env_var)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| LlmError::MissingApiKey {
            provider: provider_name.to_string(),
            env_var: env_var.to_string(),
        })
}
