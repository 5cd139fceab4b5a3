//! REST client for the speech-recognition backend.
//!
//! Short audio goes through the synchronous `speech:recognize` call; anything
//! longer is submitted as a long-running operation and polled until done. The
//! whole transcription is bounded by an overall deadline, and a timeout
//! returns no partial result.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::TranscriptionError;
use crate::media::AudioStream;
use crate::retry::RetryPolicy;
use crate::transcribe::{normalize_language_tag, RawSegment, Transcriber};

const DEFAULT_BASE_URL: &str = "https://speech.googleapis.com";

pub struct SpeechClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
    /// Deadline for the entire transcription, polling included.
    overall_timeout: Duration,
    /// Audio at or under this duration uses the synchronous call.
    sync_threshold: Duration,
    poll_interval: Duration,
}

impl SpeechClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
            overall_timeout: Duration::from_secs(600),
            sync_threshold: Duration::from_secs(60),
            poll_interval: Duration::from_secs(2),
        }
    }

    /// Point the client at a different backend (tests use a local mock).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }

    pub fn with_sync_threshold(mut self, threshold: Duration) -> Self {
        self.sync_threshold = threshold;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn build_request(
        &self,
        audio: &AudioStream,
        language: &str,
    ) -> Result<RecognizeRequest, TranscriptionError> {
        let audio_bytes = fs::read(&audio.path).await?;
        let content = base64::engine::general_purpose::STANDARD.encode(&audio_bytes);

        Ok(RecognizeRequest {
            config: RecognitionConfig {
                language_code: language.to_string(),
                encoding: "LINEAR16",
                sample_rate_hertz: audio.sample_rate,
                audio_channel_count: audio.channels as u32,
                enable_word_time_offsets: true,
                enable_automatic_punctuation: true,
            },
            audio: RecognitionAudio { content },
        })
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, TranscriptionError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = format!("{}{}?key={}", self.base_url, path, self.api_key);
        let response = self.client.post(&url).json(body).send().await?;
        Self::read_response(response).await
    }

    async fn get_json<R>(&self, path: &str) -> Result<R, TranscriptionError>
    where
        R: DeserializeOwned,
    {
        let url = format!("{}{}?key={}", self.base_url, path, self.api_key);
        let response = self.client.get(&url).send().await?;
        Self::read_response(response).await
    }

    async fn read_response<R>(response: reqwest::Response) -> Result<R, TranscriptionError>
    where
        R: DeserializeOwned,
    {
        let status = response.status();
        debug!("Speech API response status: {}", status);

        let body = response.text().await?;
        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }

        Err(classify_status(status.as_u16(), &body))
    }

    /// One synchronous recognize call.
    async fn recognize_sync(
        &self,
        request: &RecognizeRequest,
    ) -> Result<RecognizeResponse, TranscriptionError> {
        self.retry
            .run(TranscriptionError::is_transient, || {
                self.post_json("/v1/speech:recognize", request)
            })
            .await
    }

    /// Submit a long-running operation and poll until it completes.
    async fn recognize_long_running(
        &self,
        request: &RecognizeRequest,
    ) -> Result<RecognizeResponse, TranscriptionError> {
        let operation: Operation = self
            .retry
            .run(TranscriptionError::is_transient, || {
                self.post_json("/v1/speech:longrunningrecognize", request)
            })
            .await?;

        info!("Recognition operation {} submitted, polling", operation.name);
        let path = format!("/v1/operations/{}", operation.name);

        loop {
            let operation: Operation = self
                .retry
                .run(TranscriptionError::is_transient, || {
                    self.get_json(&path)
                })
                .await?;

            if operation.done {
                if let Some(err) = operation.error {
                    return Err(TranscriptionError::Fatal(format!(
                        "Recognition operation failed ({}): {}",
                        err.code, err.message
                    )));
                }
                return Ok(operation.response.unwrap_or_default());
            }

            debug!("Operation {} not done, polling again", operation.name);
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl Transcriber for SpeechClient {
    async fn transcribe(
        &self,
        audio: &AudioStream,
        language_code: &str,
    ) -> Result<Vec<RawSegment>, TranscriptionError> {
        // Validated before any network traffic
        let language = normalize_language_tag(language_code)?;

        if audio.is_empty() {
            debug!("Audio stream is empty, skipping recognition");
            return Ok(Vec::new());
        }

        let request = self.build_request(audio, &language).await?;

        let recognition = async {
            if audio.duration <= self.sync_threshold {
                debug!(
                    "Audio is {:.1}s, using synchronous recognition",
                    audio.duration.as_secs_f64()
                );
                self.recognize_sync(&request).await
            } else {
                debug!(
                    "Audio is {:.1}s, using long-running recognition",
                    audio.duration.as_secs_f64()
                );
                self.recognize_long_running(&request).await
            }
        };

        let response = tokio::time::timeout(self.overall_timeout, recognition)
            .await
            .map_err(|_| TranscriptionError::Timeout(self.overall_timeout))??;

        let segments = segments_from_results(response.results.unwrap_or_default());
        info!(
            "Recognition returned {} segments for {:.1}s of audio",
            segments.len(),
            audio.duration.as_secs_f64()
        );

        Ok(segments)
    }

    fn name(&self) -> &'static str {
        "Cloud Speech"
    }
}

fn classify_status(status: u16, body: &str) -> TranscriptionError {
    match status {
        401 | 403 => TranscriptionError::Fatal(format!(
            "Authentication failed ({}): {}",
            status, body
        )),
        429 => TranscriptionError::Backend {
            status,
            message: body.to_string(),
        },
        s if s >= 500 => TranscriptionError::Backend {
            status,
            message: body.to_string(),
        },
        _ => TranscriptionError::Fatal(format!("Recognition rejected ({}): {}", status, body)),
    }
}

/// Build segments from recognition results, one per result, timed by its
/// word offsets. Results without usable timings are dropped.
fn segments_from_results(results: Vec<SpeechResult>) -> Vec<RawSegment> {
    let mut segments = Vec::new();

    for result in results {
        let Some(alternative) = result.alternatives.into_iter().next() else {
            continue;
        };
        let text = alternative.transcript.trim().to_string();
        if text.is_empty() {
            continue;
        }

        let words = alternative.words.unwrap_or_default();
        let timing = words.first().zip(words.last()).and_then(|(first, last)| {
            parse_offset(&first.start_time).zip(parse_offset(&last.end_time))
        });

        let Some((start, end)) = timing else {
            warn!("Dropping recognition result without word timings: {}", text);
            continue;
        };

        segments.push(RawSegment {
            text,
            start,
            end,
            confidence: alternative.confidence.unwrap_or(1.0),
        });
    }

    segments.sort_by_key(|s| s.start);
    segments
}

/// Parse a wire duration like `"3.500s"`.
fn parse_offset(value: &str) -> Option<Duration> {
    let seconds: f64 = value.strip_suffix('s').unwrap_or(value).parse().ok()?;
    (seconds >= 0.0).then(|| Duration::from_secs_f64(seconds))
}

// Wire types

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognizeRequest {
    config: RecognitionConfig,
    audio: RecognitionAudio,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig {
    language_code: String,
    encoding: &'static str,
    sample_rate_hertz: u32,
    audio_channel_count: u32,
    enable_word_time_offsets: bool,
    enable_automatic_punctuation: bool,
}

#[derive(Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct RecognizeResponse {
    results: Option<Vec<SpeechResult>>,
}

#[derive(Debug, Deserialize)]
struct SpeechResult {
    #[serde(default)]
    alternatives: Vec<SpeechAlternative>,
}

#[derive(Debug, Deserialize)]
struct SpeechAlternative {
    transcript: String,
    confidence: Option<f32>,
    words: Option<Vec<WordInfo>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WordInfo {
    #[allow(dead_code)]
    word: String,
    start_time: String,
    end_time: String,
}

#[derive(Debug, Deserialize)]
struct Operation {
    name: String,
    #[serde(default)]
    done: bool,
    response: Option<RecognizeResponse>,
    error: Option<OperationStatus>,
}

#[derive(Debug, Deserialize)]
struct OperationStatus {
    code: i32,
    message: String,
}
