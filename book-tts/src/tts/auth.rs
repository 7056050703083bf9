//! SpeechKit authentication: API key, or IAM token plus folder id.

use super::SynthesisError;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::fmt;

const FOLDER_HEADER: &str = "x-folder-id";

/// The single authentication scheme selected for a run.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    ApiKey(String),
    Iam { token: String, folder_id: String },
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl Credentials {
    /// Pick the scheme: an API key wins; an IAM token needs a folder id.
    pub fn resolve(
        api_key: Option<&str>,
        iam_token: Option<&str>,
        folder_id: Option<&str>,
    ) -> Result<Self, SynthesisError> {
        if let Some(key) = present(api_key) {
            return Ok(Credentials::ApiKey(key.to_string()));
        }

        if let Some(token) = present(iam_token) {
            let folder_id = present(folder_id).ok_or_else(|| {
                SynthesisError::Config(
                    "An IAM token needs FOLDER_ID (sent as x-folder-id)".to_string(),
                )
            })?;
            return Ok(Credentials::Iam {
                token: token.to_string(),
                folder_id: folder_id.to_string(),
            });
        }

        Err(SynthesisError::Config(
            "Set SPEECHKIT_API_KEY, or IAM_TOKEN together with FOLDER_ID".to_string(),
        ))
    }

    /// Request headers for this scheme, including the JSON content type.
    pub fn headers(&self) -> Result<HeaderMap, SynthesisError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        match self {
            Credentials::ApiKey(key) => {
                headers.insert(AUTHORIZATION, header_value(&format!("Api-Key {}", key))?);
            }
            Credentials::Iam { token, folder_id } => {
                headers.insert(AUTHORIZATION, header_value(&format!("Bearer {}", token))?);
                headers.insert(HeaderName::from_static(FOLDER_HEADER), header_value(folder_id)?);
            }
        }

        Ok(headers)
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            Credentials::ApiKey(_) => "api-key",
            Credentials::Iam { .. } => "iam",
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue, SynthesisError> {
    let mut value = HeaderValue::from_str(value)
        .map_err(|_| SynthesisError::Config("Credential contains invalid header characters".into()))?;
    value.set_sensitive(true);
    Ok(value)
}

// Secrets stay out of logs
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ApiKey(_) => f.write_str("Credentials::ApiKey(***)"),
            Credentials::Iam { folder_id, .. } => f
                .debug_struct("Credentials::Iam")
                .field("token", &"***")
                .field("folder_id", folder_id)
                .finish(),
        }
    }
}
