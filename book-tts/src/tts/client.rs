//! Retrying SpeechKit client with streaming response decode.

use super::decode::{LineDecoder, ReceivedBody, decode_audio};
use super::transport::{BodyStream, HttpTransport, Transport, read_to_end};
use super::{SynthesisBody, SynthesisError, SynthesisRequest, Synthesizer};
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, warn};
use serde_json::Value;
use std::time::Duration;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(90);

/// Capped exponential backoff between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(attempts: u32) -> Self {
        Self {
            attempts,
            ..Self::default()
        }
    }

    /// Wait after failed attempt `attempt` (1-indexed): `base * 2^(attempt-1)`, capped.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

pub struct SpeechKitClient<T = HttpTransport> {
    transport: T,
    retry: RetryPolicy,
    timeout: Duration,
}

impl<T: Transport> SpeechKitClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            retry: RetryPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Synthesize one request, retrying 429/5xx and timeouts.
    pub async fn synthesize_with_retry(
        &self,
        request: &SynthesisRequest,
    ) -> Result<Vec<u8>, SynthesisError> {
        let body = request.body();
        let attempts = self.retry.attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.attempt(&body).await {
                Ok(audio) => return Ok(audio),
                Err(e) if e.is_retryable() => {
                    if attempt < attempts {
                        let wait = self.retry.delay(attempt);
                        warn!(
                            "{}, retry {}/{} in {:?}",
                            e, attempt, attempts, wait
                        );
                        tokio::time::sleep(wait).await;
                    } else {
                        warn!("{}, attempt {}/{}", e, attempt, attempts);
                    }
                    last_error = Some(Box::new(e));
                }
                Err(e) => return Err(e),
            }
        }

        Err(SynthesisError::RetriesExhausted {
            attempts,
            last: last_error,
        })
    }

    /// One request/response cycle.
    async fn attempt(&self, body: &SynthesisBody) -> Result<Vec<u8>, SynthesisError> {
        let reply = self.transport.post(body, self.timeout).await?;

        match reply.status {
            200 => {
                let received = receive(reply.body).await?;
                debug!(
                    "Received {} bytes, {} JSON records",
                    received.raw.len(),
                    received.records
                );
                decode_audio(&received).ok_or(SynthesisError::EmptyResponse)
            }
            status if SynthesisError::is_retryable_status(status) => {
                Err(SynthesisError::RetryableStatus { status })
            }
            status => {
                let (raw, _) = read_to_end(reply.body).await;
                Err(SynthesisError::Permanent {
                    status,
                    detail: error_detail(&raw),
                })
            }
        }
    }
}

#[async_trait]
impl<T: Transport> Synthesizer for SpeechKitClient<T> {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, SynthesisError> {
        self.synthesize_with_retry(request).await
    }
}

/// Consume a 200 body, decoding lines as chunks arrive.
async fn receive(mut body: BodyStream) -> Result<ReceivedBody, SynthesisError> {
    let mut decoder = LineDecoder::default();
    let mut raw = Vec::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        decoder.feed(&chunk);
        raw.extend_from_slice(&chunk);
    }
    decoder.finish();

    Ok(ReceivedBody::new(decoder, raw))
}

/// Error body as compact JSON when it parses, else as trimmed text.
fn error_detail(raw: &[u8]) -> String {
    match serde_json::from_slice::<Value>(raw) {
        Ok(value) => value.to_string(),
        Err(_) => String::from_utf8_lossy(raw).trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::transport::Reply;
    use crate::tts::VoiceOptions;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use bytes::Bytes;
    use futures_util::stream;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Scripted {
        Reply { status: u16, chunks: Vec<Vec<u8>> },
        Fail(SynthesisError),
    }

    /// Transport that plays back a fixed script of replies
    struct MockTransport {
        script: Mutex<VecDeque<Scripted>>,
        calls: AtomicUsize,
        bodies: Mutex<Vec<Value>>,
    }

    impl MockTransport {
        fn new(script: Vec<Scripted>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                bodies: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn post(
            &self,
            body: &SynthesisBody,
            _timeout: Duration,
        ) -> Result<Reply, SynthesisError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.bodies
                .lock()
                .unwrap()
                .push(serde_json::to_value(body).unwrap());

            match self.script.lock().unwrap().pop_front() {
                Some(Scripted::Reply { status, chunks }) => Ok(Reply {
                    status,
                    body: stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from(c)))).boxed(),
                }),
                Some(Scripted::Fail(e)) => Err(e),
                None => Err(SynthesisError::Network("script exhausted".into())),
            }
        }
    }

    fn reply(status: u16, body: &[u8]) -> Scripted {
        Scripted::Reply {
            status,
            chunks: vec![body.to_vec()],
        }
    }

    fn audio_line(data: &[u8], wrapped: bool) -> String {
        let chunk = format!(r#"{{"audioChunk":{{"data":"{}"}}}}"#, BASE64.encode(data));
        if wrapped {
            format!(r#"{{"result":{}}}"#, chunk)
        } else {
            chunk
        }
    }

    fn request() -> SynthesisRequest {
        SynthesisRequest::new("Привет, мир.", &VoiceOptions::default())
    }

    fn client(script: Vec<Scripted>, attempts: u32) -> SpeechKitClient<MockTransport> {
        SpeechKitClient::new(MockTransport::new(script))
            .with_retry(RetryPolicy::with_attempts(attempts))
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (1..=6).map(|a| policy.delay(a).as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 8, 8]);
        assert_eq!(policy.delay(40), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_streamed_chunks_concatenate_in_order() {
        let body = format!("{}\n{}\n", audio_line(b"AB", false), audio_line(b"CD", true));
        // Split mid-record so lines straddle chunk boundaries
        let (head, tail) = body.as_bytes().split_at(10);
        let client = client(
            vec![Scripted::Reply {
                status: 200,
                chunks: vec![head.to_vec(), tail.to_vec()],
            }],
            3,
        );

        let audio = client.synthesize(&request()).await.unwrap();
        assert_eq!(audio, b"ABCD");
        assert_eq!(client.transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_request_body_is_sent() {
        let body = audio_line(b"x", false);
        let client = client(vec![reply(200, body.as_bytes())], 3);
        client.synthesize(&request()).await.unwrap();

        let sent = client.transport.bodies.lock().unwrap();
        assert_eq!(sent[0]["text"], "Привет, мир.");
        assert_eq!(sent[0]["loudnessNormalizationType"], "LUFS");
    }

    #[tokio::test(start_paused = true)]
    async fn test_three_503_then_success() {
        let ok = audio_line(b"audio", false);
        let client = client(
            vec![
                reply(503, b"busy"),
                reply(503, b"busy"),
                reply(503, b"busy"),
                reply(200, ok.as_bytes()),
            ],
            4,
        );

        let started = tokio::time::Instant::now();
        let audio = client.synthesize(&request()).await.unwrap();
        assert_eq!(audio, b"audio");
        assert_eq!(client.transport.calls(), 4);
        // 1s + 2s + 4s of backoff
        assert_eq!(started.elapsed().as_secs(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted() {
        let client = client(
            vec![reply(429, b""), reply(500, b""), reply(502, b"")],
            3,
        );

        let started = tokio::time::Instant::now();
        let err = client.synthesize(&request()).await.unwrap_err();
        assert_eq!(client.transport.calls(), 3);
        match err {
            SynthesisError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(
                    last.as_deref(),
                    Some(SynthesisError::RetryableStatus { status: 502 })
                ));
            }
            other => panic!("unexpected error: {other}"),
        }
        // No wait after the final attempt
        assert_eq!(started.elapsed().as_secs(), 3);
    }

    #[tokio::test]
    async fn test_404_is_fatal_after_one_attempt() {
        let client = client(
            vec![reply(404, br#"{"error": "voice not found"}"#)],
            3,
        );

        let err = client.synthesize(&request()).await.unwrap_err();
        assert_eq!(client.transport.calls(), 1);
        match err {
            SynthesisError::Permanent { status, detail } => {
                assert_eq!(status, 404);
                assert_eq!(detail, r#"{"error":"voice not found"}"#);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_permanent_error_with_text_body() {
        let client = client(vec![reply(401, b"Unauthorized\n")], 3);
        let err = client.synthesize(&request()).await.unwrap_err();
        assert_eq!(err.to_string(), "TTS error HTTP 401: Unauthorized");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_retried() {
        let ok = audio_line(b"late", true);
        let client = client(
            vec![
                Scripted::Fail(SynthesisError::Timeout("deadline".into())),
                reply(200, ok.as_bytes()),
            ],
            3,
        );

        assert_eq!(client.synthesize(&request()).await.unwrap(), b"late");
        assert_eq!(client.transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_200_is_not_retried() {
        let client = client(vec![reply(200, b"")], 3);
        let err = client.synthesize(&request()).await.unwrap_err();
        assert!(matches!(err, SynthesisError::EmptyResponse));
        assert_eq!(client.transport.calls(), 1);
    }

    #[tokio::test]
    async fn test_single_json_fallback() {
        let body = format!(
            "{{\n  \"result\": {{\"audioChunk\": {{\"data\": \"{}\"}}}}\n}}",
            BASE64.encode(b"one-shot")
        );
        let client = client(vec![reply(200, body.as_bytes())], 3);
        assert_eq!(client.synthesize(&request()).await.unwrap(), b"one-shot");
    }

    #[tokio::test]
    async fn test_raw_binary_fallback() {
        let client = client(vec![reply(200, b"OggS\x00\x02raw-opus")], 3);
        assert_eq!(
            client.synthesize(&request()).await.unwrap(),
            b"OggS\x00\x02raw-opus"
        );
    }

    #[tokio::test]
    async fn test_noise_lines_are_skipped() {
        let body = format!(
            "\n{}\ngarbage\n{{\"result\":{{\"textChunk\":{{}}}}}}\n{}",
            audio_line(b"12", false),
            audio_line(b"34", true)
        );
        let client = client(vec![reply(200, body.as_bytes())], 3);
        assert_eq!(client.synthesize(&request()).await.unwrap(), b"1234");
    }

    #[tokio::test]
    async fn test_fatal_network_error_is_not_retried() {
        let client = client(
            vec![Scripted::Fail(SynthesisError::Network("bad url".into()))],
            3,
        );
        let err = client.synthesize(&request()).await.unwrap_err();
        assert!(matches!(err, SynthesisError::Network(_)));
        assert_eq!(client.transport.calls(), 1);
    }
}
