pub mod extract;

pub use extract::{check_ffmpeg, check_ffprobe, extract_audio, probe_duration};

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

use crate::acquire::{self, VideoSource};
use crate::error::MediaError;

/// Sample rate the recognition backend expects for LINEAR16 audio.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Extracted audio, ready for recognition: mono PCM WAV on disk.
///
/// The file lives inside the pipeline run's working directory and is removed
/// with it on every exit path.
#[derive(Debug, Clone)]
pub struct AudioStream {
    pub path: PathBuf,
    pub sample_rate: u32,
    pub channels: u16,
    pub duration: Duration,
}

impl AudioStream {
    pub fn is_empty(&self) -> bool {
        self.duration.is_zero()
    }
}

/// Turns a video source into recognizable audio.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    async fn extract(
        &self,
        source: &VideoSource,
        workdir: &Path,
    ) -> Result<AudioStream, MediaError>;
}

/// Default extractor: resolves the source (downloading links), then runs
/// ffmpeg to down-mix and resample.
pub struct FfmpegExtractor;

#[async_trait]
impl MediaExtractor for FfmpegExtractor {
    async fn extract(
        &self,
        source: &VideoSource,
        workdir: &Path,
    ) -> Result<AudioStream, MediaError> {
        let video = acquire::resolve(source, workdir).await?;
        extract_audio(&video, workdir).await
    }
}
