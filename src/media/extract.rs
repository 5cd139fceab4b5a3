use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info};

use crate::error::MediaError;

use super::{AudioStream, TARGET_SAMPLE_RATE};

/// Check if FFmpeg is installed and accessible.
pub fn check_ffmpeg() -> Result<(), MediaError> {
    let output = Command::new("ffmpeg").arg("-version").output().map_err(|e| {
        MediaError::ResampleFailed(format!(
            "FFmpeg not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
        ))
    })?;

    if !output.status.success() {
        return Err(MediaError::ResampleFailed("FFmpeg check failed".to_string()));
    }

    debug!("FFmpeg is available");
    Ok(())
}

/// Check if FFprobe is installed and accessible.
pub fn check_ffprobe() -> Result<(), MediaError> {
    let output = Command::new("ffprobe")
        .arg("-version")
        .output()
        .map_err(|e| {
            MediaError::ResampleFailed(format!(
                "FFprobe not found. Please install FFmpeg (includes FFprobe). Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(MediaError::ResampleFailed(
            "FFprobe check failed".to_string(),
        ));
    }

    debug!("FFprobe is available");
    Ok(())
}

/// Probe the container duration. An unreadable or corrupt container is an
/// `UnreadableSource` error.
pub fn probe_duration(input: &Path) -> Result<Duration, MediaError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .output()
        .map_err(|e| MediaError::UnreadableSource(format!("Failed to run FFprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaError::UnreadableSource(format!(
            "{}: {}",
            input.display(),
            stderr.trim()
        )));
    }

    let duration_str = String::from_utf8_lossy(&output.stdout);
    let duration_secs: f64 = duration_str.trim().parse().map_err(|_| {
        MediaError::UnreadableSource(format!(
            "{}: no parseable duration ('{}')",
            input.display(),
            duration_str.trim()
        ))
    })?;

    Ok(Duration::from_secs_f64(duration_secs.max(0.0)))
}

/// Extract the audio track as mono 16-bit PCM WAV at the recognition sample
/// rate. The output lands in `workdir` and is validated by reading its header.
pub async fn extract_audio(input: &Path, workdir: &Path) -> Result<AudioStream, MediaError> {
    check_ffmpeg()?;
    check_ffprobe()?;

    if !input.exists() {
        return Err(MediaError::SourceNotFound(input.display().to_string()));
    }

    info!("Extracting audio from {}", input.display());

    // Fails early on containers ffmpeg cannot read
    let container_duration = probe_duration(input)?;
    debug!("Input duration: {:?}", container_duration);

    let output = workdir.join("audio.wav");
    let rate = TARGET_SAMPLE_RATE.to_string();

    let status = Command::new("ffmpeg")
        .args(["-y", "-i"])
        .arg(input)
        .args(["-vn", "-acodec", "pcm_s16le", "-ar", &rate, "-ac", "1"])
        .arg(&output)
        .status()
        .map_err(|e| MediaError::ResampleFailed(format!("Failed to run FFmpeg: {e}")))?;

    if !status.success() {
        return Err(MediaError::ResampleFailed(
            "FFmpeg audio extraction failed".to_string(),
        ));
    }

    if !output.exists() {
        return Err(MediaError::ResampleFailed(
            "Output file was not created".to_string(),
        ));
    }

    let stream = read_wav_metadata(&output)?;
    info!(
        "Audio extracted to {} ({:.1}s)",
        output.display(),
        stream.duration.as_secs_f64()
    );

    Ok(stream)
}

/// Read sample rate, channel count, and duration from a WAV header.
pub fn read_wav_metadata(path: &Path) -> Result<AudioStream, MediaError> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| MediaError::ResampleFailed(format!("Invalid WAV output: {e}")))?;
    let spec = reader.spec();
    let duration = Duration::from_secs_f64(reader.duration() as f64 / spec.sample_rate as f64);

    Ok(AudioStream {
        path: PathBuf::from(path),
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        duration,
    })
}
