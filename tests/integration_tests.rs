//! Integration tests for subgen
//!
//! These validate component interplay without external services: cue building
//! feeding the SRT formatter, translation count preservation, and full
//! pipeline runs over stub collaborators.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use subgen::acquire::VideoSource;
use subgen::config::OutputFormat;
use subgen::cue::{self, CueConfig};
use subgen::error::{MediaError, Stage, TranscriptionError, TranslationError};
use subgen::media::{AudioStream, MediaExtractor};
use subgen::pipeline::{Pipeline, PipelineRequest};
use subgen::storage::{LocalStorage, Storage};
use subgen::subtitle::srt::{self, SrtFormatter};
use subgen::subtitle::{Cue, SubtitleFormatter};
use subgen::transcribe::{RawSegment, Transcriber};
use subgen::translate::Translator;

fn segment(text: &str, start_ms: u64, end_ms: u64) -> RawSegment {
    RawSegment {
        text: text.to_string(),
        start: Duration::from_millis(start_ms),
        end: Duration::from_millis(end_ms),
        confidence: 0.9,
    }
}

// ============================================================================
// Cue building feeding the formatter
// ============================================================================

mod cue_to_srt_tests {
    use super::*;

    #[test]
    fn test_cue_invariants_hold_through_serialization() {
        let segments = vec![
            segment("Guten Tag, willkommen zu diesem Video.", 0, 3200),
            segment("Heute lernen wir etwas Neues.", 3400, 6100),
            segment("Los geht's!", 6100, 7000),
        ];

        let cues = cue::build(&segments, &CueConfig::default());

        for (i, cue) in cues.iter().enumerate() {
            assert_eq!(cue.index, i + 1);
            assert!(cue.start < cue.end);
        }

        let parsed = srt::parse(&SrtFormatter.format(&cues));
        assert_eq!(parsed, cues);
    }

    #[test]
    fn test_round_trip_preserves_millisecond_timing() {
        let segments = vec![segment("exactly timed", 1, 1199)];
        let cues = cue::build(&segments, &CueConfig::default());
        let parsed = srt::parse(&SrtFormatter.format(&cues));

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].start, Duration::from_millis(1));
        assert_eq!(parsed[0].end, Duration::from_millis(1199));
    }

    #[test]
    fn test_long_transcript_splits_into_bounded_cues() {
        let long_text = "Es war einmal ein kleines Dorf am Rande des Waldes, \
                         und in diesem Dorf lebte eine alte Uhrmacherin, die jeden \
                         Morgen vor Sonnenaufgang ihre Werkstatt öffnete, um die \
                         Uhren der Nachbarn zu richten, denn ohne sie wäre niemand \
                         rechtzeitig aufgewacht, und so verging Jahr um Jahr, bis \
                         eines Tages ein Fremder ein seltsames Uhrwerk brachte, das \
                         niemand im Dorf je zuvor gesehen hatte, und alles änderte sich.";
        assert!(long_text.chars().count() > 400);

        let config = CueConfig {
            max_chars: 80,
            max_duration: Duration::from_secs(7),
            merge_threshold: Duration::from_secs(1),
        };
        let cues = cue::build(&[segment(long_text, 0, 30_000)], &config);

        assert!(cues.len() >= 5);
        for cue in &cues {
            assert!(cue.text.chars().count() <= 80);
        }
        assert_eq!(cues.first().unwrap().start, Duration::ZERO);
        assert_eq!(cues.last().unwrap().end, Duration::from_secs(30));
    }
}

// ============================================================================
// Pipeline stubs
// ============================================================================

struct StubExtractor {
    duration: Duration,
}

#[async_trait]
impl MediaExtractor for StubExtractor {
    async fn extract(
        &self,
        _source: &VideoSource,
        workdir: &Path,
    ) -> Result<AudioStream, MediaError> {
        Ok(AudioStream {
            path: workdir.join("audio.wav"),
            sample_rate: 16_000,
            channels: 1,
            duration: self.duration,
        })
    }
}

struct StubTranscriber {
    segments: Vec<RawSegment>,
}

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(
        &self,
        _audio: &AudioStream,
        language_code: &str,
    ) -> Result<Vec<RawSegment>, TranscriptionError> {
        if language_code != "de-DE" {
            return Err(TranscriptionError::UnsupportedLanguage(
                language_code.to_string(),
            ));
        }
        Ok(self.segments.clone())
    }

    fn name(&self) -> &'static str {
        "Stub"
    }
}

struct GermanEnglishTranslator;

#[async_trait]
impl Translator for GermanEnglishTranslator {
    async fn translate_batch(
        &self,
        texts: &[&str],
        _source_language: &str,
        _target_language: &str,
    ) -> Result<Vec<String>, TranslationError> {
        Ok(texts
            .iter()
            .map(|t| match *t {
                "hallo welt" => "hello world".to_string(),
                other => format!("translated: {}", other),
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "GermanEnglish"
    }
}

struct BrokenTranslator;

#[async_trait]
impl Translator for BrokenTranslator {
    async fn translate_batch(
        &self,
        _texts: &[&str],
        _source_language: &str,
        _target_language: &str,
    ) -> Result<Vec<String>, TranslationError> {
        Err(TranslationError::Fatal("backend down".to_string()))
    }

    fn name(&self) -> &'static str {
        "Broken"
    }
}

fn request(storage_dest: &str, source_language: &str, target_language: &str) -> PipelineRequest {
    PipelineRequest {
        source: VideoSource::Path(PathBuf::from("/tmp/video.mp4")),
        language_code: "de-DE".to_string(),
        source_language: source_language.to_string(),
        target_language: target_language.to_string(),
        destination: storage_dest.to_string(),
        format: OutputFormat::Srt,
    }
}

// ============================================================================
// End-to-end pipeline over stubs
// ============================================================================

mod pipeline_tests {
    use super::*;

    #[tokio::test]
    async fn test_german_video_becomes_english_subtitles() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            Arc::new(StubExtractor {
                duration: Duration::from_millis(1200),
            }),
            Arc::new(StubTranscriber {
                segments: vec![segment("hallo welt", 0, 1200)],
            }),
            Arc::new(GermanEnglishTranslator),
            Arc::new(LocalStorage::new(dir.path())),
        );

        let result = pipeline
            .run(request("out/en.srt", "de", "en"))
            .await
            .unwrap();
        assert!(result.artifact.location.ends_with("en.srt"));

        let written = std::fs::read_to_string(dir.path().join("out/en.srt")).unwrap();
        assert_eq!(written, "1\n00:00:00,000 --> 00:00:01,200\nhello world\n\n");
    }

    #[tokio::test]
    async fn test_zero_duration_audio_completes_with_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            Arc::new(StubExtractor {
                duration: Duration::ZERO,
            }),
            Arc::new(StubTranscriber { segments: vec![] }),
            Arc::new(GermanEnglishTranslator),
            Arc::new(LocalStorage::new(dir.path())),
        );

        let result = pipeline
            .run(request("out/en.srt", "de", "en"))
            .await
            .unwrap();

        assert_eq!(result.stats.segments, 0);
        assert_eq!(result.stats.cues, 0);
        let written = std::fs::read_to_string(dir.path().join("out/en.srt")).unwrap();
        assert_eq!(written, "");
    }

    #[tokio::test]
    async fn test_unsupported_language_fails_in_transcription_stage() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(
            Arc::new(StubExtractor {
                duration: Duration::from_secs(1),
            }),
            Arc::new(StubTranscriber { segments: vec![] }),
            Arc::new(GermanEnglishTranslator),
            Arc::new(LocalStorage::new(dir.path())),
        );

        let mut req = request("out/en.srt", "de", "en");
        req.language_code = "xx-XX".to_string();

        let err = pipeline.run(req).await.unwrap_err();
        assert_eq!(err.stage, Stage::Transcribing);
        assert!(err.to_string().contains("xx-XX"));
    }

    #[tokio::test]
    async fn test_translation_failure_never_publishes_untranslated_output() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path());
        let pipeline = Pipeline::new(
            Arc::new(StubExtractor {
                duration: Duration::from_millis(1200),
            }),
            Arc::new(StubTranscriber {
                segments: vec![segment("hallo welt", 0, 1200)],
            }),
            Arc::new(BrokenTranslator),
            Arc::new(LocalStorage::new(dir.path())),
        );

        let err = pipeline
            .run(request("out/en.srt", "de", "en"))
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Translating);
        assert!(!storage.exists("out/en.srt").await.unwrap());
    }

    #[tokio::test]
    async fn test_matching_languages_skip_translation_entirely() {
        let dir = tempfile::tempdir().unwrap();
        // The broken translator proves the stage never runs
        let pipeline = Pipeline::new(
            Arc::new(StubExtractor {
                duration: Duration::from_millis(1200),
            }),
            Arc::new(StubTranscriber {
                segments: vec![segment("hallo welt", 0, 1200)],
            }),
            Arc::new(BrokenTranslator),
            Arc::new(LocalStorage::new(dir.path())),
        );

        let result = pipeline
            .run(request("out/de.srt", "de", "de"))
            .await
            .unwrap();
        assert_eq!(result.stats.cues, 1);

        let written = std::fs::read_to_string(dir.path().join("out/de.srt")).unwrap();
        assert!(written.contains("hallo welt"));
    }

    #[tokio::test]
    async fn test_concurrent_runs_do_not_interfere() {
        let dir = tempfile::tempdir().unwrap();
        let make_pipeline = |text: &str| {
            Pipeline::new(
                Arc::new(StubExtractor {
                    duration: Duration::from_millis(1200),
                }),
                Arc::new(StubTranscriber {
                    segments: vec![segment(text, 0, 1200)],
                }),
                Arc::new(GermanEnglishTranslator),
                Arc::new(LocalStorage::new(dir.path())),
            )
        };

        let first = make_pipeline("hallo welt");
        let second = make_pipeline("guten morgen");

        let (a, b) = tokio::join!(
            first.run(request("out/a.srt", "de", "en")),
            second.run(request("out/b.srt", "de", "en")),
        );
        a.unwrap();
        b.unwrap();

        let a_content = std::fs::read_to_string(dir.path().join("out/a.srt")).unwrap();
        let b_content = std::fs::read_to_string(dir.path().join("out/b.srt")).unwrap();
        assert!(a_content.contains("hello world"));
        assert!(b_content.contains("translated: guten morgen"));
    }
}

// ============================================================================
// Formatter surface
// ============================================================================

mod formatter_tests {
    use super::*;

    fn sample_cues() -> Vec<Cue> {
        vec![
            Cue {
                index: 1,
                start: Duration::from_millis(1500),
                end: Duration::from_millis(4000),
                text: "Hello, welcome to this video.".to_string(),
            },
            Cue {
                index: 2,
                start: Duration::from_millis(4500),
                end: Duration::from_millis(7000),
                text: "Today we're going to learn.".to_string(),
            },
        ]
    }

    #[test]
    fn test_srt_formatter_output_shape() {
        let output = SrtFormatter.format(&sample_cues());

        assert!(output.starts_with("1\n00:00:01,500 --> 00:00:04,000\n"));
        assert!(output.contains("\n\n2\n00:00:04,500 --> 00:00:07,000\n"));
        assert!(output.ends_with("Today we're going to learn.\n\n"));
    }

    #[test]
    fn test_vtt_formatter_output_shape() {
        let formatter = subgen::subtitle::vtt::VttFormatter;
        let output = formatter.format(&sample_cues());

        assert!(output.starts_with("WEBVTT\n\n"));
        assert!(output.contains("00:00:01.500 --> 00:00:04.000"));
    }
}
