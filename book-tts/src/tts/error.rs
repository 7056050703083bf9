//! Synthesis error taxonomy.

use thiserror::Error;

/// Failures of a synthesis call or of the configuration feeding it.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Missing credential, missing folder id, unsupported container.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP {status} from SpeechKit (retryable)")]
    RetryableStatus { status: u16 },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("TTS error HTTP {status}: {detail}")]
    Permanent { status: u16, detail: String },

    #[error("HTTP 200 but empty audio response (no audioChunk.data)")]
    EmptyResponse,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Synthesis failed after {attempts} attempts{}", .last.as_ref().map(|e| format!(": {}", e)).unwrap_or_default())]
    RetriesExhausted {
        attempts: u32,
        last: Option<Box<SynthesisError>>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SynthesisError {
    /// HTTP statuses worth another attempt.
    pub fn is_retryable_status(status: u16) -> bool {
        matches!(status, 429 | 500 | 502 | 503 | 504)
    }

    /// Whether the client should try the request again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SynthesisError::RetryableStatus { .. }
                | SynthesisError::Timeout(_)
                | SynthesisError::Connect(_)
        )
    }
}

impl From<reqwest::Error> for SynthesisError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SynthesisError::Timeout(e.to_string())
        } else if e.is_connect() {
            SynthesisError::Connect(e.to_string())
        } else {
            SynthesisError::Network(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert!(SynthesisError::is_retryable_status(status), "{}", status);
        }
        for status in [200, 400, 401, 403, 404, 501] {
            assert!(!SynthesisError::is_retryable_status(status), "{}", status);
        }
    }

    #[test]
    fn test_timeouts_are_retryable() {
        assert!(SynthesisError::Timeout("read".into()).is_retryable());
        assert!(SynthesisError::Connect("refused".into()).is_retryable());
        assert!(!SynthesisError::EmptyResponse.is_retryable());
        assert!(
            !SynthesisError::Permanent {
                status: 404,
                detail: "not found".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_exhausted_message_includes_last_error() {
        let err = SynthesisError::RetriesExhausted {
            attempts: 3,
            last: Some(Box::new(SynthesisError::RetryableStatus { status: 503 })),
        };
        assert_eq!(
            err.to_string(),
            "Synthesis failed after 3 attempts: HTTP 503 from SpeechKit (retryable)"
        );
    }
}
