pub mod client;

pub use client::TranslateClient;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::error::TranslationError;
use crate::subtitle::Cue;

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate a batch of texts. The result has the same length and order
    /// as the input, or the call fails.
    async fn translate_batch(
        &self,
        texts: &[&str],
        source_language: &str,
        target_language: &str,
    ) -> Result<Vec<String>, TranslationError>;

    fn name(&self) -> &'static str;
}

/// Translate cue texts, preserving count, order, timing, and indices.
///
/// Equal source and target languages make this an identity pass. Cues are
/// batched under `char_budget` per request; any failed batch fails the whole
/// call so the output is never mixed-language.
pub async fn translate_cues(
    translator: &dyn Translator,
    cues: Vec<Cue>,
    source_language: &str,
    target_language: &str,
    char_budget: usize,
) -> Result<Vec<Cue>, TranslationError> {
    if source_language == target_language {
        debug!("Source and target language match, returning cues unchanged");
        return Ok(cues);
    }
    if cues.is_empty() {
        return Ok(cues);
    }

    let expected = cues.len();
    let mut translated: Vec<String> = Vec::with_capacity(expected);

    for batch in plan_batches(&cues, char_budget) {
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let results = translator
            .translate_batch(&texts, source_language, target_language)
            .await?;

        if results.len() != texts.len() {
            return Err(TranslationError::CountMismatch {
                expected: texts.len(),
                actual: results.len(),
            });
        }
        translated.extend(results);
    }

    if translated.len() != expected {
        return Err(TranslationError::CountMismatch {
            expected,
            actual: translated.len(),
        });
    }

    info!(
        "Translated {} cues from {} to {} with {}",
        expected,
        source_language,
        target_language,
        translator.name()
    );

    // Timing and index are immutable; only text changes
    Ok(cues
        .into_iter()
        .zip(translated)
        .map(|(cue, text)| Cue { text, ..cue })
        .collect())
}

/// Group consecutive cues into batches under the character budget. A cue
/// larger than the budget still travels alone rather than being dropped.
fn plan_batches(cues: &[Cue], char_budget: usize) -> Vec<&[Cue]> {
    let mut batches = Vec::new();
    let mut batch_start = 0;
    let mut batch_chars = 0;

    for (i, cue) in cues.iter().enumerate() {
        let len = cue.text.chars().count();
        if i > batch_start && batch_chars + len > char_budget {
            batches.push(&cues[batch_start..i]);
            batch_start = i;
            batch_chars = 0;
        }
        batch_chars += len;
    }
    batches.push(&cues[batch_start..]);

    batches
}
