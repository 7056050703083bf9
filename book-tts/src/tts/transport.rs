//! HTTP layer for the synthesis client.

use super::{Credentials, SynthesisBody, SynthesisError};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::Client;
use reqwest::header::HeaderMap;
use std::time::Duration;

pub const SPEECHKIT_URL: &str = "https://tts.api.cloud.yandex.net/tts/v3/utteranceSynthesis";

/// Response body delivered chunk by chunk.
pub type BodyStream = BoxStream<'static, Result<Bytes, SynthesisError>>;

/// Status line and streaming body of one HTTP exchange.
pub struct Reply {
    pub status: u16,
    pub body: BodyStream,
}

/// Sends one synthesis request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, body: &SynthesisBody, timeout: Duration) -> Result<Reply, SynthesisError>;
}

/// reqwest-backed transport for the SpeechKit REST endpoint.
pub struct HttpTransport {
    client: Client,
    url: String,
    headers: HeaderMap,
}

impl HttpTransport {
    pub fn new(credentials: &Credentials, url: Option<&str>) -> Result<Self, SynthesisError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SynthesisError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.unwrap_or(SPEECHKIT_URL).to_string(),
            headers: credentials.headers()?,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, body: &SynthesisBody, timeout: Duration) -> Result<Reply, SynthesisError> {
        let response = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(SynthesisError::from))
            .boxed();

        Ok(Reply { status, body })
    }
}

/// Read a body to the end, returning what arrived before any read error.
pub async fn read_to_end(mut body: BodyStream) -> (Vec<u8>, Option<SynthesisError>) {
    let mut raw = Vec::new();
    while let Some(chunk) = body.next().await {
        match chunk {
            Ok(bytes) => raw.extend_from_slice(&bytes),
            Err(e) => return (raw, Some(e)),
        }
    }
    (raw, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn test_read_to_end_collects_chunks() {
        let body: BodyStream = stream::iter(vec![
            Ok(Bytes::from_static(b"ab")),
            Ok(Bytes::from_static(b"cd")),
        ])
        .boxed();
        let (raw, error) = read_to_end(body).await;
        assert_eq!(raw, b"abcd");
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn test_read_to_end_keeps_partial_body() {
        let body: BodyStream = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(SynthesisError::Timeout("read".into())),
            Ok(Bytes::from_static(b"never")),
        ])
        .boxed();
        let (raw, error) = read_to_end(body).await;
        assert_eq!(raw, b"partial");
        assert!(matches!(error, Some(SynthesisError::Timeout(_))));
    }

    #[test]
    fn test_http_transport_uses_credentials() {
        let creds = Credentials::ApiKey("k".into());
        let transport = HttpTransport::new(&creds, None).unwrap();
        assert_eq!(transport.url, SPEECHKIT_URL);
        assert_eq!(transport.headers["authorization"], "Api-Key k");
    }
}
