//! Video source resolution: local paths are validated, links are downloaded
//! into the run's working directory.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::MediaError;

/// Where the input video comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    Path(PathBuf),
    Url(String),
}

impl VideoSource {
    /// Interpret a CLI argument: anything with an http(s) scheme is a link.
    pub fn parse(input: &str) -> Self {
        if input.starts_with("http://") || input.starts_with("https://") {
            VideoSource::Url(input.to_string())
        } else {
            VideoSource::Path(PathBuf::from(input))
        }
    }
}

impl std::fmt::Display for VideoSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoSource::Path(p) => write!(f, "{}", p.display()),
            VideoSource::Url(u) => write!(f, "{}", u),
        }
    }
}

/// Resolve a source to a local, readable video file.
///
/// Local paths are checked for existence; URLs are streamed into
/// `workdir/video.<ext>` so the download shares the run's scoped cleanup.
pub async fn resolve(source: &VideoSource, workdir: &Path) -> Result<PathBuf, MediaError> {
    match source {
        VideoSource::Path(path) => {
            if !path.exists() {
                return Err(MediaError::SourceNotFound(path.display().to_string()));
            }
            Ok(path.clone())
        }
        VideoSource::Url(url) => download(url, workdir).await,
    }
}

async fn download(url: &str, workdir: &Path) -> Result<PathBuf, MediaError> {
    info!("Downloading video from {}", url);

    let response = reqwest::get(url)
        .await
        .map_err(|e| MediaError::DownloadFailed(format!("{}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(MediaError::DownloadFailed(format!(
            "{} returned {}",
            url,
            response.status()
        )));
    }

    let dest = workdir.join(format!("video.{}", url_extension(url)));
    let mut file = tokio::fs::File::create(&dest).await?;

    let mut stream = response.bytes_stream();
    let mut total: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| MediaError::DownloadFailed(e.to_string()))?;
        total += chunk.len() as u64;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    debug!("Downloaded {} bytes to {}", total, dest.display());
    Ok(dest)
}

/// Best-effort extension from the URL path; ffmpeg sniffs the container
/// anyway, so "mp4" is a safe default.
fn url_extension(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    match path.rsplit('.').next() {
        Some(ext @ ("mp4" | "mkv" | "webm" | "mov" | "avi" | "m4v")) => ext,
        _ => "mp4",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source() {
        assert_eq!(
            VideoSource::parse("https://example.com/v.mp4"),
            VideoSource::Url("https://example.com/v.mp4".to_string())
        );
        assert_eq!(
            VideoSource::parse("/data/video.mp4"),
            VideoSource::Path(PathBuf::from("/data/video.mp4"))
        );
        assert_eq!(
            VideoSource::parse("relative/clip.mkv"),
            VideoSource::Path(PathBuf::from("relative/clip.mkv"))
        );
    }

    #[test]
    fn test_url_extension() {
        assert_eq!(url_extension("https://example.com/a/b/clip.mkv"), "mkv");
        assert_eq!(url_extension("https://example.com/clip.webm?sig=abc"), "webm");
        assert_eq!(url_extension("https://example.com/watch?v=XJNO492juTE"), "mp4");
    }

    #[tokio::test]
    async fn test_resolve_missing_path() {
        let workdir = tempfile::tempdir().unwrap();
        let source = VideoSource::Path(PathBuf::from("/nonexistent/video.mp4"));

        let result = resolve(&source, workdir.path()).await;
        assert!(matches!(result, Err(MediaError::SourceNotFound(_))));
    }

    #[tokio::test]
    async fn test_resolve_existing_path() {
        let workdir = tempfile::tempdir().unwrap();
        let video = workdir.path().join("input.mp4");
        std::fs::write(&video, b"not really a video").unwrap();

        let source = VideoSource::Path(video.clone());
        let resolved = resolve(&source, workdir.path()).await.unwrap();
        assert_eq!(resolved, video);
    }
}
