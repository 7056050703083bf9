use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlmError {
    #[error(
        "API key not found for {provider}. Set {env_var} environment variable or add to config."
    )]
    MissingApiKey { provider: String, env_var: String },

    /// The endpoint rejected the shape of the request (HTTP 400).
    #[error("Request rejected (HTTP 400): {message}")]
    BadRequest { message: String },

    #[error("Rate limit exceeded{}", .retry_after.map(|s| format!(". Retry after {} seconds", s)).unwrap_or_default())]
    RateLimited { retry_after: Option<u64> },

    #[error("Server overloaded (HTTP 503): {message}")]
    ServerOverloaded { message: String },

    #[error("API error{}: {message}", status_code.map(|c| format!(" (HTTP {})", c)).unwrap_or_default())]
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Empty completion from {0}")]
    EmptyCompletion(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid model preset: {0}")]
    InvalidPreset(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl LlmError {
    /// Whether an alternate request shape against the same service may succeed.
    pub fn is_request_rejected(&self) -> bool {
        matches!(self, LlmError::BadRequest { .. })
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_bad_request_is_rejected_shape() {
        let rejected = LlmError::BadRequest {
            message: "unsupported parameter".to_string(),
        };
        assert!(rejected.is_request_rejected());

        let overloaded = LlmError::ServerOverloaded {
            message: "busy".to_string(),
        };
        assert!(!overloaded.is_request_rejected());
        assert!(!LlmError::RateLimited { retry_after: None }.is_request_rejected());
    }

    #[test]
    fn test_error_messages() {
        let err = LlmError::ApiError {
            message: "boom".to_string(),
            status_code: Some(500),
        };
        assert_eq!(err.to_string(), "API error (HTTP 500): boom");

        let err = LlmError::RateLimited {
            retry_after: Some(7),
        };
        assert_eq!(err.to_string(), "Rate limit exceeded. Retry after 7 seconds");
    }
}
