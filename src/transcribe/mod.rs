pub mod speech;

pub use speech::SpeechClient;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::TranscriptionError;
use crate::media::AudioStream;

/// A timestamped span of recognized speech, before cue formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSegment {
    pub text: String,
    pub start: Duration,
    pub end: Duration,
    pub confidence: f32,
}

#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe the audio. Segments come back sorted by start time,
    /// non-overlapping; empty audio yields an empty vector.
    async fn transcribe(
        &self,
        audio: &AudioStream,
        language_code: &str,
    ) -> Result<Vec<RawSegment>, TranscriptionError>;

    fn name(&self) -> &'static str;
}

/// Language tags the recognition backend accepts.
///
/// Both `de-DE` and `de_DE` spellings are tolerated at the boundary; the
/// normalized form is sent on the wire.
const SUPPORTED_LANGUAGE_TAGS: [&str; 24] = [
    "ar-SA", "cs-CZ", "da-DK", "de-DE", "el-GR", "en-AU", "en-GB", "en-US", "es-ES", "es-MX",
    "fi-FI", "fr-FR", "hi-IN", "it-IT", "ja-JP", "ko-KR", "nl-NL", "pl-PL", "pt-BR", "pt-PT",
    "ru-RU", "sv-SE", "tr-TR", "zh-CN",
];

/// Normalize a language tag to the backend's `xx-YY` spelling, or reject it.
pub fn normalize_language_tag(tag: &str) -> Result<String, TranscriptionError> {
    let candidate = tag.replace('_', "-");
    SUPPORTED_LANGUAGE_TAGS
        .iter()
        .find(|t| t.eq_ignore_ascii_case(&candidate))
        .map(|t| t.to_string())
        .ok_or_else(|| TranscriptionError::UnsupportedLanguage(tag.to_string()))
}
