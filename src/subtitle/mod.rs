pub mod srt;
pub mod vtt;

use std::time::Duration;

use tracing::info;

use crate::config::OutputFormat;
use crate::error::WriteError;
use crate::storage::{ArtifactRef, Storage};

/// One subtitle entry: index, display window, text.
#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

/// The serialization unit: ordered cues plus language metadata.
#[derive(Debug, Clone)]
pub struct SubtitleDocument {
    pub cues: Vec<Cue>,
    pub source_language: String,
    pub target_language: String,
}

pub trait SubtitleFormatter: Send + Sync {
    fn format(&self, cues: &[Cue]) -> String;
    fn extension(&self) -> &'static str;
}

pub fn create_formatter(format: OutputFormat) -> Box<dyn SubtitleFormatter> {
    match format {
        OutputFormat::Srt => Box::new(srt::SrtFormatter),
        OutputFormat::Vtt => Box::new(vtt::VttFormatter),
    }
}

/// Serialize the document and persist it through the storage backend.
/// Publication is atomic: on failure nothing is visible at the destination.
pub async fn write_document(
    doc: &SubtitleDocument,
    formatter: &dyn SubtitleFormatter,
    storage: &dyn Storage,
    destination: &str,
) -> Result<ArtifactRef, WriteError> {
    let content = formatter.format(&doc.cues);
    let artifact = storage.put(destination, content.as_bytes()).await?;
    info!(
        "Wrote {} cues ({} -> {}) to {}",
        doc.cues.len(),
        doc.source_language,
        doc.target_language,
        artifact
    );
    Ok(artifact)
}
