//! Decoding of SpeechKit responses into audio bytes.
//!
//! A 200 response is normally newline-delimited JSON, each record carrying a
//! base64 `audioChunk.data` (optionally under `result`). Some deployments send
//! one JSON object or the raw audio instead, so the collected body is run
//! through an ordered chain of strategies and the first one that yields bytes
//! wins.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::debug;
use serde_json::Value;

/// One decoded line of a streamed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Audio(Vec<u8>),
    /// A JSON record with no usable audio (metadata, progress, bad base64).
    Record,
    /// Blank or unparseable line.
    Ignored,
}

/// Pull `audioChunk.data` out of a record, looking under `result` first.
fn audio_from_value(value: &Value) -> Option<Vec<u8>> {
    let node = value.get("result").unwrap_or(value);
    let data = node.get("audioChunk")?.get("data")?.as_str()?;
    if data.is_empty() {
        return None;
    }
    BASE64.decode(data).ok()
}

/// Decode one response line.
pub fn parse_line(line: &[u8]) -> StreamEvent {
    let Ok(line) = std::str::from_utf8(line) else {
        return StreamEvent::Ignored;
    };
    let line = line.trim();
    if line.is_empty() {
        return StreamEvent::Ignored;
    }

    match serde_json::from_str::<Value>(line) {
        Ok(value) if value.is_object() => match audio_from_value(&value) {
            Some(audio) => StreamEvent::Audio(audio),
            None => StreamEvent::Record,
        },
        _ => StreamEvent::Ignored,
    }
}

/// Incremental line splitter fed with body chunks as they arrive.
///
/// Lines may straddle chunk boundaries; audio is appended in arrival order.
#[derive(Debug, Default)]
pub struct LineDecoder {
    pending: Vec<u8>,
    audio: Vec<u8>,
    records: usize,
}

impl LineDecoder {
    pub fn feed(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.handle(&line);
        }
    }

    /// Flush a final line that had no trailing newline.
    pub fn finish(&mut self) {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.handle(&line);
        }
    }

    fn handle(&mut self, line: &[u8]) {
        match parse_line(line) {
            StreamEvent::Audio(bytes) => {
                self.records += 1;
                self.audio.extend_from_slice(&bytes);
            }
            StreamEvent::Record => self.records += 1,
            StreamEvent::Ignored => {}
        }
    }

    #[cfg(test)]
    pub fn audio(&self) -> &[u8] {
        &self.audio
    }

    /// JSON object lines seen so far, with or without audio.
    #[cfg(test)]
    pub fn records(&self) -> usize {
        self.records
    }
}

/// A fully received 200 body plus what the line decoder already extracted.
#[derive(Debug, Default)]
pub struct ReceivedBody {
    pub streamed: Vec<u8>,
    pub records: usize,
    pub raw: Vec<u8>,
}

impl ReceivedBody {
    /// Decode a complete body in one go.
    #[cfg(test)]
    pub fn from_raw(raw: Vec<u8>) -> Self {
        let mut decoder = LineDecoder::default();
        decoder.feed(&raw);
        decoder.finish();
        Self::new(decoder, raw)
    }

    pub fn new(decoder: LineDecoder, raw: Vec<u8>) -> Self {
        Self {
            streamed: decoder.audio,
            records: decoder.records,
            raw,
        }
    }
}

/// Ways of recovering audio from a 200 body, tried in `CHAIN` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    LineDelimited,
    SingleJson,
    RawBinary,
}

impl DecodeStrategy {
    pub const CHAIN: [DecodeStrategy; 3] = [
        DecodeStrategy::LineDelimited,
        DecodeStrategy::SingleJson,
        DecodeStrategy::RawBinary,
    ];

    /// Audio bytes, or `None` when this strategy does not apply.
    pub fn decode(&self, body: &ReceivedBody) -> Option<Vec<u8>> {
        match self {
            DecodeStrategy::LineDelimited => {
                (!body.streamed.is_empty()).then(|| body.streamed.clone())
            }
            DecodeStrategy::SingleJson => serde_json::from_slice::<Value>(&body.raw)
                .ok()
                .and_then(|value| audio_from_value(&value)),
            DecodeStrategy::RawBinary => {
                // Any JSON body, including NDJSON records without audio, is an
                // empty answer. Raw fallback only takes bodies that are not JSON.
                let blank = body.raw.iter().all(u8::is_ascii_whitespace);
                let json = body.records > 0 || serde_json::from_slice::<Value>(&body.raw).is_ok();
                (!blank && !json).then(|| body.raw.clone())
            }
        }
    }
}

/// Run the strategy chain; `None` means the response carried no audio.
pub fn decode_audio(body: &ReceivedBody) -> Option<Vec<u8>> {
    DecodeStrategy::CHAIN.iter().find_map(|strategy| {
        let audio = strategy.decode(body)?;
        debug!("Decoded {} bytes via {:?}", audio.len(), strategy);
        Some(audio)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b64(data: &[u8]) -> String {
        BASE64.encode(data)
    }

    #[test]
    fn test_parse_plain_and_wrapped_records() {
        let plain = format!(r#"{{"audioChunk":{{"data":"{}"}}}}"#, b64(b"AB"));
        let wrapped = format!(r#"{{"result":{{"audioChunk":{{"data":"{}"}}}}}}"#, b64(b"CD"));
        assert_eq!(parse_line(plain.as_bytes()), StreamEvent::Audio(b"AB".to_vec()));
        assert_eq!(parse_line(wrapped.as_bytes()), StreamEvent::Audio(b"CD".to_vec()));
    }

    #[test]
    fn test_parse_skips_noise() {
        assert_eq!(parse_line(b"   \r"), StreamEvent::Ignored);
        assert_eq!(parse_line(b"not json"), StreamEvent::Ignored);
        assert_eq!(parse_line(b"42"), StreamEvent::Ignored);
        assert_eq!(parse_line(&[0xff, 0xfe]), StreamEvent::Ignored);
        assert_eq!(
            parse_line(br#"{"result":{"textChunk":{"text":"hi"}}}"#),
            StreamEvent::Record
        );
        assert_eq!(
            parse_line(br#"{"audioChunk":{"data":"@@not-base64@@"}}"#),
            StreamEvent::Record
        );
    }

    #[test]
    fn test_line_decoder_handles_split_lines() {
        let body = format!(
            "{{\"audioChunk\":{{\"data\":\"{}\"}}}}\n\n{{\"result\":{{\"audioChunk\":{{\"data\":\"{}\"}}}}}}",
            b64(b"AB"),
            b64(b"CD")
        );
        let bytes = body.as_bytes();

        let mut decoder = LineDecoder::default();
        for chunk in bytes.chunks(7) {
            decoder.feed(chunk);
        }
        decoder.finish();

        assert_eq!(decoder.audio(), b"ABCD");
        assert_eq!(decoder.records(), 2);
    }

    #[test]
    fn test_chain_prefers_streamed_audio() {
        let body = format!("{{\"audioChunk\":{{\"data\":\"{}\"}}}}\n", b64(b"xyz"));
        let received = ReceivedBody::from_raw(body.into_bytes());
        assert_eq!(decode_audio(&received), Some(b"xyz".to_vec()));
    }

    #[test]
    fn test_chain_single_pretty_json() {
        let body = format!(
            "{{\n  \"result\": {{\n    \"audioChunk\": {{\n      \"data\": \"{}\"\n    }}\n  }}\n}}",
            b64(b"whole")
        );
        let received = ReceivedBody::from_raw(body.into_bytes());
        assert!(received.streamed.is_empty());
        assert_eq!(
            DecodeStrategy::SingleJson.decode(&received),
            Some(b"whole".to_vec())
        );
        assert_eq!(decode_audio(&received), Some(b"whole".to_vec()));
    }

    #[test]
    fn test_chain_raw_binary() {
        let raw = b"ID3\x04\x00\x00fake-mp3-frames".to_vec();
        let received = ReceivedBody::from_raw(raw.clone());
        assert_eq!(decode_audio(&received), Some(raw));
    }

    #[test]
    fn test_chain_json_without_audio_is_empty() {
        let received = ReceivedBody::from_raw(br#"{"result":{"status":"ok"}}"#.to_vec());
        assert_eq!(decode_audio(&received), None);

        let pretty = ReceivedBody::from_raw(b"{\n  \"status\": \"ok\"\n}".to_vec());
        assert_eq!(decode_audio(&pretty), None);
    }

    #[test]
    fn test_chain_records_without_audio_are_empty() {
        let body = b"{\"result\":{\"status\":\"a\"}}\n{\"result\":{\"status\":\"b\"}}\n".to_vec();
        let received = ReceivedBody::from_raw(body);
        assert_eq!(received.records, 2);
        assert_eq!(DecodeStrategy::RawBinary.decode(&received), None);
        assert_eq!(decode_audio(&received), None);
    }

    #[test]
    fn test_chain_blank_body_is_empty() {
        assert_eq!(decode_audio(&ReceivedBody::from_raw(Vec::new())), None);
        assert_eq!(decode_audio(&ReceivedBody::from_raw(b"\n\n".to_vec())), None);
    }
}
