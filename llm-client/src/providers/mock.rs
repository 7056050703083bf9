//! Mock LLM provider for testing
//!
//! Simulates failures, fallbacks and successful responses, and records every
//! request it receives.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{LlmError, Result};
use crate::provider::{LlmProvider, LlmRequest, LlmResponse};

/// How a successful call builds its reply
enum Reply {
    Fixed(String),
    Echo,
}

/// A mock provider for testing retry and fallback behavior
pub struct MockProvider {
    /// Number of times to fail before succeeding (0 = always succeed)
    fail_count: usize,
    call_count: AtomicUsize,
    fail_with: Option<LlmError>,
    reply: Reply,
    requests: Mutex<Vec<LlmRequest>>,
    name: &'static str,
}

impl MockProvider {
    fn build(fail_count: usize, fail_with: Option<LlmError>, reply: Reply) -> Self {
        Self {
            fail_count,
            call_count: AtomicUsize::new(0),
            fail_with,
            reply,
            requests: Mutex::new(Vec::new()),
            name: "mock",
        }
    }

    /// Create a provider that fails `n` times with the given error, then succeeds
    pub fn fails_then_succeeds(n: usize, error: LlmError, response: &str) -> Self {
        Self::build(n, Some(error), Reply::Fixed(response.to_string()))
    }

    /// Create a provider that always fails with the given error
    pub fn always_fails(error: LlmError) -> Self {
        Self::build(usize::MAX, Some(error), Reply::Fixed(String::new()))
    }

    /// Create a provider that always succeeds
    pub fn always_succeeds(response: &str) -> Self {
        Self::build(0, None, Reply::Fixed(response.to_string()))
    }

    /// Create a provider that answers with the prompt it was given
    pub fn echo() -> Self {
        Self::build(0, None, Reply::Echo)
    }

    /// Get the number of times complete() was called
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Requests received so far, in call order
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Set a custom provider name (useful for testing fallback scenarios)
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.requests.lock() {
            seen.push(request.clone());
        }

        if call_num < self.fail_count {
            if let Some(err) = &self.fail_with {
                return Err(clone_error(err));
            }
        }

        let content = match &self.reply {
            Reply::Fixed(text) => text.clone(),
            Reply::Echo => request.prompt,
        };

        Ok(LlmResponse {
            content,
            model: "mock-model".to_string(),
            usage: None,
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Clone an LlmError (needed because LlmError doesn't implement Clone)
fn clone_error(err: &LlmError) -> LlmError {
    match err {
        LlmError::ServerOverloaded { message } => LlmError::ServerOverloaded {
            message: message.clone(),
        },
        LlmError::BadRequest { message } => LlmError::BadRequest {
            message: message.clone(),
        },
        LlmError::MissingApiKey { provider, env_var } => LlmError::MissingApiKey {
            provider: provider.clone(),
            env_var: env_var.clone(),
        },
        LlmError::RateLimited { retry_after } => LlmError::RateLimited {
            retry_after: *retry_after,
        },
        LlmError::ApiError {
            message,
            status_code,
        } => LlmError::ApiError {
            message: message.clone(),
            status_code: *status_code,
        },
        LlmError::EmptyCompletion(s) => LlmError::EmptyCompletion(s.clone()),
        LlmError::ConfigError(s) => LlmError::ConfigError(s.clone()),
        LlmError::InvalidPreset(s) => LlmError::InvalidPreset(s.clone()),
        // Io and Toml errors can't be cloned
        LlmError::Io(_) => LlmError::ConfigError("IO error (mock)".to_string()),
        LlmError::TomlParse(_) => LlmError::ConfigError("TOML parse error (mock)".to_string()),
        LlmError::TomlSerialize(_) => {
            LlmError::ConfigError("TOML serialize error (mock)".to_string())
        }
    }
}
