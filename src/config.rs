use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cue::CueConfig;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Srt,
    Vtt,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Srt => write!(f, "srt"),
            OutputFormat::Vtt => write!(f, "vtt"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "srt" => Ok(OutputFormat::Srt),
            "vtt" => Ok(OutputFormat::Vtt),
            _ => Err(format!("Unknown format: {}. Use 'srt' or 'vtt'", s)),
        }
    }
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Srt => "srt",
            OutputFormat::Vtt => "vtt",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for the speech-recognition backend.
    pub speech_api_key: Option<String>,
    /// API key for the translation backend.
    pub translate_api_key: Option<String>,
    /// Base URL of the speech-recognition backend.
    pub speech_endpoint: String,
    /// Base URL of the translation backend.
    pub translate_endpoint: String,

    /// Retry attempts for transient backend errors (includes the first try).
    pub max_attempts: u32,
    /// Base retry delay in milliseconds.
    pub base_delay_ms: u64,
    /// Exponential backoff multiplier.
    pub backoff_multiplier: u32,

    /// Overall transcription deadline in seconds.
    pub transcribe_timeout_secs: u64,
    /// Audio at or under this duration uses the synchronous recognize call.
    pub sync_threshold_secs: u64,
    /// Long-running operation poll interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Maximum characters per subtitle cue.
    pub max_chars_per_cue: usize,
    /// Maximum cue duration in seconds.
    pub max_cue_duration_secs: u64,
    /// Adjacent cues with combined duration under this merge, in milliseconds.
    pub merge_threshold_ms: u64,

    /// Character budget per translation request.
    pub translation_char_budget: usize,

    pub default_format: OutputFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speech_api_key: None,
            translate_api_key: None,
            speech_endpoint: "https://speech.googleapis.com".to_string(),
            translate_endpoint: "https://translation.googleapis.com".to_string(),
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff_multiplier: 2,
            transcribe_timeout_secs: 600,
            sync_threshold_secs: 60,
            poll_interval_ms: 2000,
            max_chars_per_cue: 80,
            max_cue_duration_secs: 7,
            merge_threshold_ms: 1000,
            translation_char_budget: 4000,
            default_format: OutputFormat::default(),
        }
    }
}

impl Config {
    pub fn load() -> std::io::Result<Self> {
        let mut config = Self::default();

        // Load from config file if it exists
        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                if let Ok(file_config) = toml::from_str::<Config>(&contents) {
                    config = file_config;
                }
            }
        }

        // Override with environment variables
        if let Ok(key) = std::env::var("SPEECH_API_KEY") {
            config.speech_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("TRANSLATE_API_KEY") {
            config.translate_api_key = Some(key);
        }
        if let Ok(endpoint) = std::env::var("SUBGEN_SPEECH_ENDPOINT") {
            config.speech_endpoint = endpoint;
        }
        if let Ok(endpoint) = std::env::var("SUBGEN_TRANSLATE_ENDPOINT") {
            config.translate_endpoint = endpoint;
        }
        if let Ok(format) = std::env::var("SUBGEN_DEFAULT_FORMAT") {
            if let Ok(f) = format.parse() {
                config.default_format = f;
            }
        }

        Ok(config)
    }

    /// Check the configuration for a run; `translating` indicates whether the
    /// translation stage will execute.
    pub fn validate(&self, translating: bool) -> std::result::Result<(), String> {
        if self.speech_api_key.is_none() {
            return Err(
                "SPEECH_API_KEY not set. Export it with: export SPEECH_API_KEY=...".to_string(),
            );
        }
        if translating && self.translate_api_key.is_none() {
            return Err(
                "TRANSLATE_API_KEY not set. Export it with: export TRANSLATE_API_KEY=..."
                    .to_string(),
            );
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be greater than 0".to_string());
        }
        if self.max_chars_per_cue == 0 {
            return Err("max_chars_per_cue must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            multiplier: self.backoff_multiplier,
        }
    }

    pub fn cue_config(&self) -> CueConfig {
        CueConfig {
            max_chars: self.max_chars_per_cue,
            max_duration: Duration::from_secs(self.max_cue_duration_secs),
            merge_threshold: Duration::from_millis(self.merge_threshold_ms),
        }
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("subgen").join("config.toml"))
    }
}
