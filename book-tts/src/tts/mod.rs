//! SpeechKit v3 synthesis: request types, streaming decode and the retrying client.

pub mod auth;
pub mod client;
pub mod decode;
pub mod error;
pub mod transport;

pub use auth::Credentials;
pub use client::{RetryPolicy, SpeechKitClient};
pub use error::SynthesisError;
pub use transport::HttpTransport;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Audio container requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Container {
    Wav,
    OggOpus,
    Mp3,
}

impl Container {
    /// Wire name used in `containerAudioType`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Container::Wav => "WAV",
            Container::OggOpus => "OGG_OPUS",
            Container::Mp3 => "MP3",
        }
    }

    /// File extension for saved audio.
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Wav => "wav",
            Container::OggOpus => "ogg",
            Container::Mp3 => "mp3",
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Container {
    type Err = SynthesisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "WAV" => Ok(Container::Wav),
            "OGG_OPUS" | "OGG" | "OPUS" => Ok(Container::OggOpus),
            "MP3" => Ok(Container::Mp3),
            other => Err(SynthesisError::Config(format!(
                "Unsupported container '{}'. Use WAV, OGG_OPUS or MP3",
                other
            ))),
        }
    }
}

/// Voice settings shared by every piece of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceOptions {
    /// SpeechKit voice name
    pub voice: String,
    /// Optional speaking role; not every voice supports one
    pub role: Option<String>,
    /// Speed multiplier (1.0 = normal)
    pub speed: f32,
    pub container: Container,
}

impl Default for VoiceOptions {
    fn default() -> Self {
        Self {
            voice: "filipp".to_string(),
            role: None,
            speed: 1.1,
            container: Container::Mp3,
        }
    }
}

impl VoiceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// Set the role; a blank role means none.
    pub fn with_role(mut self, role: Option<&str>) -> Self {
        self.role = role
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_container(mut self, container: Container) -> Self {
        self.container = container;
        self
    }
}

/// One piece of text to synthesize with its voice settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub text: String,
    pub options: VoiceOptions,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, options: &VoiceOptions) -> Self {
        Self {
            text: text.into(),
            options: options.clone(),
        }
    }

    /// Wire body for `utteranceSynthesis`.
    pub fn body(&self) -> SynthesisBody {
        let options = &self.options;
        let mut hints = vec![Hint::Voice(options.voice.clone())];
        if let Some(role) = &options.role {
            hints.push(Hint::Role(role.clone()));
        }
        hints.push(Hint::Speed(format_speed(options.speed)));

        SynthesisBody {
            text: self.text.clone(),
            hints,
            output_audio_spec: OutputAudioSpec {
                container_audio: ContainerAudio {
                    container_audio_type: options.container,
                },
            },
            loudness_normalization_type: "LUFS",
        }
    }
}

/// Decimal string form of the speed hint, always with a fractional part.
fn format_speed(speed: f32) -> String {
    if speed.fract() == 0.0 {
        format!("{:.1}", speed)
    } else {
        speed.to_string()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisBody {
    pub text: String,
    pub hints: Vec<Hint>,
    pub output_audio_spec: OutputAudioSpec,
    pub loudness_normalization_type: &'static str,
}

/// Each hint serializes as a single-key object, e.g. `{"voice": "filipp"}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Hint {
    Voice(String),
    Role(String),
    Speed(String),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputAudioSpec {
    pub container_audio: ContainerAudio,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerAudio {
    pub container_audio_type: Container,
}

/// Anything that can turn a request into a complete audio payload.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, SynthesisError>;
}
