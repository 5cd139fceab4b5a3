//! REST client for the translation backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::TranslationError;
use crate::retry::RetryPolicy;
use crate::translate::Translator;

const DEFAULT_BASE_URL: &str = "https://translation.googleapis.com";

pub struct TranslateClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    retry: RetryPolicy,
}

impl TranslateClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
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

    async fn call_api(&self, request: &TranslateRequest) -> Result<Vec<String>, TranslationError> {
        let url = format!(
            "{}/language/translate/v2?key={}",
            self.base_url, self.api_key
        );

        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();
        debug!("Translate API response status: {}", status);

        let body = response.text().await?;
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body));
        }

        let parsed: TranslateResponse = serde_json::from_str(&body)?;
        Ok(parsed
            .data
            .translations
            .into_iter()
            .map(|t| t.translated_text)
            .collect())
    }
}

#[async_trait]
impl Translator for TranslateClient {
    async fn translate_batch(
        &self,
        texts: &[&str],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>, TranslationError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Translating {} text(s) from {} to {}",
            texts.len(),
            source_language,
            target_language
        );

        let request = TranslateRequest {
            q: texts.iter().map(|t| t.to_string()).collect(),
            source: source_language.to_string(),
            target: target_language.to_string(),
            format: "text",
        };

        let results = self
            .retry
            .run(TranslationError::is_transient, || self.call_api(&request))
            .await?;

        if results.len() != texts.len() {
            return Err(TranslationError::CountMismatch {
                expected: texts.len(),
                actual: results.len(),
            });
        }

        Ok(results)
    }

    fn name(&self) -> &'static str {
        "Cloud Translate"
    }
}

fn classify_status(status: u16, body: &str) -> TranslationError {
    match status {
        401 | 403 => TranslationError::Fatal(format!(
            "Authentication failed ({}): {}",
            status, body
        )),
        429 => TranslationError::Backend {
            status,
            message: body.to_string(),
        },
        s if s >= 500 => TranslationError::Backend {
            status,
            message: body.to_string(),
        },
        _ => TranslationError::Fatal(format!("Translation rejected ({}): {}", status, body)),
    }
}

// Wire types

#[derive(Serialize)]
struct TranslateRequest {
    q: Vec<String>,
    source: String,
    target: String,
    format: &'static str,
}

#[derive(Deserialize)]
struct TranslateResponse {
    data: TranslationData,
}

#[derive(Deserialize)]
struct TranslationData {
    translations: Vec<Translation>,
}

#[derive(Deserialize)]
struct Translation {
    #[serde(rename = "translatedText")]
    translated_text: String,
}
