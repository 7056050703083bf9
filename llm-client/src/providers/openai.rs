//! OpenAI API providers
//!
//! Two request shapes against the same service:
//! - chat completions (`/chat/completions`), also spoken by OpenAI-compatible servers
//! - responses (`/responses`), accepted by models that reject the chat shape

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::error::{LlmError, Result};
use crate::provider::{LlmProvider, LlmRequest, LlmResponse, TokenUsage};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Provider for the chat completions endpoint
pub struct OpenAIChatProvider {
    model: String,
    base_url: String,
    api_key: String,
    name: &'static str,
    client: Client,
}

impl OpenAIChatProvider {
    /// Create a chat provider against any OpenAI-compatible base URL
    pub fn new(model: &str, base_url: &str, api_key: String, name: &'static str) -> Self {
        Self {
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            name,
            client: Client::new(),
        }
    }
}

/// Provider for the responses endpoint
pub struct OpenAIResponsesProvider {
    model: String,
    base_url: String,
    api_key: String,
    client: Client,
}

impl OpenAIResponsesProvider {
    pub fn new(model: &str, base_url: &str, api_key: String) -> Self {
        Self {
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }
}

// Chat completions request/response types

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

// Responses request/response types

#[derive(Debug, Serialize)]
struct ResponsesRequest {
    model: String,
    input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ResponsesResponse {
    #[serde(default)]
    output_text: Option<String>,
    #[serde(default)]
    output: Vec<OutputItem>,
    usage: Option<ResponsesUsage>,
}

#[derive(Debug, Deserialize)]
struct OutputItem {
    #[serde(default)]
    content: Vec<OutputContent>,
}

#[derive(Debug, Deserialize)]
struct OutputContent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponsesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl ResponsesResponse {
    /// Text of the reply: the aggregated `output_text` when present, else every
    /// `output_text` content part in order
    fn text(&self) -> String {
        if let Some(text) = &self.output_text {
            return text.clone();
        }
        self.output
            .iter()
            .flat_map(|item| item.content.iter())
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// POST a JSON body and map non-success statuses onto `LlmError`
async fn post_json<T: Serialize>(
    client: &Client,
    url: &str,
    api_key: &str,
    body: &T,
) -> Result<Response> {
    let response = client
        .post(url)
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(body)
        .send()
        .await
        .map_err(|e| LlmError::ApiError {
            message: format!("Request failed: {}", e),
            status_code: None,
        })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let error_text = response.text().await.unwrap_or_default();
    let message = if let Ok(error_response) = serde_json::from_str::<ErrorResponse>(&error_text) {
        error_response.error.message
    } else {
        error_text
    };

    Err(match status.as_u16() {
        400 => LlmError::BadRequest { message },
        429 => LlmError::RateLimited { retry_after },
        503 => LlmError::ServerOverloaded { message },
        code => LlmError::ApiError {
            message,
            status_code: Some(code),
        },
    })
}

fn parse_error(e: reqwest::Error) -> LlmError {
    LlmError::ApiError {
        message: format!("Failed to parse response: {}", e),
        status_code: None,
    }
}

#[async_trait]
impl LlmProvider for OpenAIChatProvider {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let mut messages = Vec::new();

        if let Some(system) = request.system_prompt {
            messages.push(Message {
                role: "system",
                content: system,
            });
        }

        messages.push(Message {
            role: "user",
            content: request.prompt,
        });

        let chat_request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_completion_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = post_json(&self.client, &url, &self.api_key, &chat_request).await?;
        let chat_response: ChatCompletionResponse = response.json().await.map_err(parse_error)?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LlmError::EmptyCompletion(self.name.to_string()))?;

        let usage = chat_response.usage.map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        });

        Ok(LlmResponse {
            content,
            model: self.model.clone(),
            usage,
        })
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[async_trait]
impl LlmProvider for OpenAIResponsesProvider {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let responses_request = ResponsesRequest {
            model: self.model.clone(),
            input: request.prompt,
            instructions: request.system_prompt,
            max_output_tokens: request.max_tokens,
        };

        let url = format!("{}/responses", self.base_url);
        let response = post_json(&self.client, &url, &self.api_key, &responses_request).await?;
        let api_response: ResponsesResponse = response.json().await.map_err(parse_error)?;

        let content = api_response.text();
        let usage = api_response.usage.map(|u| TokenUsage {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        });

        Ok(LlmResponse {
            content,
            model: self.model.clone(),
            usage,
        })
    }

    fn name(&self) -> &'static str {
        "OpenAI responses"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_omits_temperature() {
        let request = ChatCompletionRequest {
            model: "gpt-5-nano".to_string(),
            messages: vec![
                Message {
                    role: "system",
                    content: "clean".to_string(),
                },
                Message {
                    role: "user",
                    content: "text".to_string(),
                },
            ],
            max_completion_tokens: None,
            temperature: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("temperature").is_none());
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "text");
    }

    #[test]
    fn test_responses_request_shape() {
        let request = ResponsesRequest {
            model: "gpt-5-nano".to_string(),
            input: "raw text".to_string(),
            instructions: Some("clean it".to_string()),
            max_output_tokens: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["input"], "raw text");
        assert_eq!(json["instructions"], "clean it");
        assert!(json.get("max_output_tokens").is_none());
    }

    #[test]
    fn test_responses_text_from_output_parts() {
        let body = r#"{
            "output": [
                {"type": "reasoning", "content": []},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "Clean "},
                    {"type": "output_text", "text": "text."}
                ]}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 3}
        }"#;
        let response: ResponsesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.text(), "Clean text.");
    }

    #[test]
    fn test_responses_text_prefers_output_text() {
        let body = r#"{"output_text": "joined", "output": []}"#;
        let response: ResponsesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.text(), "joined");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let provider = OpenAIChatProvider::new("m", "http://localhost:8080/v1/", "k".into(), "local");
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }
}
