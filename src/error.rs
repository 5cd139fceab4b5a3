use std::time::Duration;

use thiserror::Error;

/// Errors from video acquisition and audio extraction.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Unreadable source: {0}")]
    UnreadableSource(String),

    #[error("Audio resampling failed: {0}")]
    ResampleFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the speech-recognition stage.
#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("Unsupported language tag: {0}")]
    UnsupportedLanguage(String),

    #[error("Transcription timed out after {0:?}")]
    Timeout(Duration),

    #[error("Recognition backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Transcription failed: {0}")]
    Fatal(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscriptionError {
    /// Whether this error is worth retrying (rate limit, server error,
    /// connection failure). Auth, quota, and malformed-audio errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            TranscriptionError::Backend { status, .. } => *status == 429 || *status >= 500,
            TranscriptionError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}

/// Errors from the translation stage.
#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("Translation returned {actual} texts for {expected} inputs")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Translation backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    #[error("Translation failed: {0}")]
    Fatal(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TranslationError {
    /// Same transient classification as the transcription client.
    pub fn is_transient(&self) -> bool {
        match self {
            TranslationError::Backend { status, .. } => *status == 429 || *status >= 500,
            TranslationError::Http(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }
}

/// Errors from subtitle persistence.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("Failed to persist subtitle artifact: {0}")]
    PersistFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pipeline stages, used to tag errors with where they occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Transcribing,
    BuildingCues,
    Translating,
    Writing,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Extracting => write!(f, "extraction"),
            Stage::Transcribing => write!(f, "transcription"),
            Stage::BuildingCues => write!(f, "cue building"),
            Stage::Translating => write!(f, "translation"),
            Stage::Writing => write!(f, "writing"),
        }
    }
}

/// Union of per-stage errors.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Media(#[from] MediaError),

    #[error(transparent)]
    Transcription(#[from] TranscriptionError),

    #[error(transparent)]
    Translation(#[from] TranslationError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error("Pipeline cancelled")]
    Cancelled,
}

/// A stage failure as surfaced to the caller: which stage, and what went wrong.
#[derive(Error, Debug)]
#[error("{stage} stage failed: {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: StageError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: impl Into<StageError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
