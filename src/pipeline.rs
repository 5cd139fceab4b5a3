//! The pipeline orchestrator.
//!
//! One run walks an explicit state machine, each state carrying the data
//! accumulated so far:
//!
//! `Extracting -> Transcribing -> BuildingCues -> [Translating] -> Writing -> Done`
//!
//! Translation is skipped when source and target language match. Any stage
//! failure ends the run with a stage-tagged error; nothing is visible at the
//! destination unless the write completed, and the extraction workdir is
//! removed on every exit path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::acquire::VideoSource;
use crate::config::OutputFormat;
use crate::cue::{self, CueConfig};
use crate::error::{MediaError, PipelineError, Stage, StageError};
use crate::media::{AudioStream, MediaExtractor};
use crate::storage::{ArtifactRef, Storage};
use crate::subtitle::{create_formatter, write_document, Cue, SubtitleDocument};
use crate::transcribe::{RawSegment, Transcriber};
use crate::translate::{translate_cues, Translator};

/// Everything a single run needs. Consumed by [`Pipeline::run`].
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub source: VideoSource,
    /// Recognition language tag, e.g. `de-DE`.
    pub language_code: String,
    /// Translation source language, e.g. `de`.
    pub source_language: String,
    /// Translation target language, e.g. `en`.
    pub target_language: String,
    /// Storage path for the subtitle artifact.
    pub destination: String,
    pub format: OutputFormat,
}

/// Timings and counts from one run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub total_time: Duration,
    pub extraction_time: Duration,
    pub transcription_time: Duration,
    pub translation_time: Duration,
    pub audio_duration: Duration,
    pub segments: usize,
    pub cues: usize,
}

/// Successful outcome: where the artifact landed, and how the run went.
#[derive(Debug)]
pub struct PipelineResult {
    pub artifact: ArtifactRef,
    pub stats: PipelineStats,
}

enum State {
    Extracting {
        request: PipelineRequest,
    },
    Transcribing {
        request: PipelineRequest,
        audio: AudioStream,
    },
    BuildingCues {
        request: PipelineRequest,
        segments: Vec<RawSegment>,
    },
    Translating {
        request: PipelineRequest,
        cues: Vec<Cue>,
    },
    Writing {
        request: PipelineRequest,
        doc: SubtitleDocument,
    },
    Done {
        artifact: ArtifactRef,
    },
}

impl State {
    fn stage(&self) -> Option<Stage> {
        match self {
            State::Extracting { .. } => Some(Stage::Extracting),
            State::Transcribing { .. } => Some(Stage::Transcribing),
            State::BuildingCues { .. } => Some(Stage::BuildingCues),
            State::Translating { .. } => Some(Stage::Translating),
            State::Writing { .. } => Some(Stage::Writing),
            State::Done { .. } => None,
        }
    }
}

pub struct Pipeline {
    extractor: Arc<dyn MediaExtractor>,
    transcriber: Arc<dyn Transcriber>,
    translator: Arc<dyn Translator>,
    storage: Arc<dyn Storage>,
    cue_config: CueConfig,
    translation_char_budget: usize,
    cancelled: Arc<AtomicBool>,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        transcriber: Arc<dyn Transcriber>,
        translator: Arc<dyn Translator>,
        storage: Arc<dyn Storage>,
    ) -> Self {
        Self {
            extractor,
            transcriber,
            translator,
            storage,
            cue_config: CueConfig::default(),
            translation_char_budget: 4000,
            cancelled: Arc::new(AtomicBool::new(false)),
            show_progress: false,
        }
    }

    pub fn with_cue_config(mut self, config: CueConfig) -> Self {
        self.cue_config = config;
        self
    }

    pub fn with_translation_char_budget(mut self, budget: usize) -> Self {
        self.translation_char_budget = budget;
        self
    }

    /// Share a cancellation flag with the caller; set it to abort the run at
    /// the next stage boundary.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Drive one request through all stages.
    pub async fn run(&self, request: PipelineRequest) -> Result<PipelineResult, PipelineError> {
        let start = Instant::now();

        // Scoped workdir: downloaded video and extracted audio are removed on
        // every exit path, including failure and cancellation
        let workdir = TempDir::new()
            .map_err(|e| PipelineError::new(Stage::Extracting, MediaError::Io(e)))?;
        debug!("Using workdir {:?}", workdir.path());

        let spinner = self.show_progress.then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        });

        let mut stats = PipelineStats::default();
        let mut state = State::Extracting { request };

        loop {
            if let Some(stage) = state.stage() {
                if self.cancelled.load(Ordering::Relaxed) {
                    warn!("Pipeline cancelled during {}", stage);
                    return Err(PipelineError {
                        stage,
                        source: StageError::Cancelled,
                    });
                }
                info!("Stage: {}", stage);
                if let Some(pb) = &spinner {
                    pb.set_message(stage.to_string());
                }
            }

            state = match state {
                State::Extracting { request } => {
                    let stage_start = Instant::now();
                    let audio = self
                        .extractor
                        .extract(&request.source, workdir.path())
                        .await
                        .map_err(|e| PipelineError::new(Stage::Extracting, e))?;
                    stats.extraction_time = stage_start.elapsed();
                    stats.audio_duration = audio.duration;
                    State::Transcribing { request, audio }
                }

                State::Transcribing { request, audio } => {
                    let stage_start = Instant::now();
                    let segments = self
                        .transcriber
                        .transcribe(&audio, &request.language_code)
                        .await
                        .map_err(|e| PipelineError::new(Stage::Transcribing, e))?;
                    stats.transcription_time = stage_start.elapsed();
                    stats.segments = segments.len();
                    State::BuildingCues { request, segments }
                }

                State::BuildingCues { request, segments } => {
                    let cues = cue::build(&segments, &self.cue_config);
                    stats.cues = cues.len();

                    if request.source_language == request.target_language {
                        debug!("Languages match, skipping translation");
                        let doc = SubtitleDocument {
                            cues,
                            source_language: request.source_language.clone(),
                            target_language: request.target_language.clone(),
                        };
                        State::Writing { request, doc }
                    } else {
                        State::Translating { request, cues }
                    }
                }

                State::Translating { request, cues } => {
                    let stage_start = Instant::now();
                    let cues = translate_cues(
                        self.translator.as_ref(),
                        cues,
                        &request.source_language,
                        &request.target_language,
                        self.translation_char_budget,
                    )
                    .await
                    .map_err(|e| PipelineError::new(Stage::Translating, e))?;
                    stats.translation_time = stage_start.elapsed();

                    let doc = SubtitleDocument {
                        cues,
                        source_language: request.source_language.clone(),
                        target_language: request.target_language.clone(),
                    };
                    State::Writing { request, doc }
                }

                State::Writing { request, doc } => {
                    let formatter = create_formatter(request.format);
                    let artifact = write_document(
                        &doc,
                        formatter.as_ref(),
                        self.storage.as_ref(),
                        &request.destination,
                    )
                    .await
                    .map_err(|e| PipelineError::new(Stage::Writing, e))?;
                    State::Done { artifact }
                }

                State::Done { artifact } => {
                    stats.total_time = start.elapsed();
                    if let Some(pb) = spinner {
                        pb.finish_with_message(format!("Done: {}", artifact));
                    }
                    info!(
                        "Pipeline complete: {} cues in {:.2}s -> {}",
                        stats.cues,
                        stats.total_time.as_secs_f64(),
                        artifact
                    );
                    return Ok(PipelineResult { artifact, stats });
                }
            };
        }
    }
}

/// Print a summary of a finished run.
pub fn print_summary(result: &PipelineResult) {
    println!();
    println!("  Artifact:   {}", result.artifact);
    println!("  Cues:       {}", result.stats.cues);
    println!(
        "  Audio:      {:.1}s",
        result.stats.audio_duration.as_secs_f64()
    );
    println!();
    println!("  Timing:");
    println!(
        "    Extract:    {:.2}s",
        result.stats.extraction_time.as_secs_f64()
    );
    println!(
        "    Transcribe: {:.2}s ({} segments)",
        result.stats.transcription_time.as_secs_f64(),
        result.stats.segments
    );
    if result.stats.translation_time > Duration::ZERO {
        println!(
            "    Translate:  {:.2}s",
            result.stats.translation_time.as_secs_f64()
        );
    }
    println!(
        "    Total:      {:.2}s",
        result.stats.total_time.as_secs_f64()
    );
    println!();
}
