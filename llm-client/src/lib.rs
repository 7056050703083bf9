//! LLM client library for the book-tts workspace
//!
//! Provides a unified interface for the text-cleaning collaborator:
//! - OpenAI (chat completions, falling back to the responses API)
//! - OpenAI-compatible servers (chat completions only)

pub mod config;
pub mod error;
pub mod provider;
pub mod providers;

pub use config::{Config, ModelPreset, ProviderConfig};
pub use error::{LlmError, Result};
pub use provider::{LlmProvider, LlmRequest, LlmResponse, TokenUsage};
pub use providers::{FallbackProvider, MockProvider, ProviderKind, get_provider};
