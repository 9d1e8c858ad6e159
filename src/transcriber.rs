//! High-level API: turn one media file into a transcript plus SRT/JSON exports.
//!
//! `Transcriber` wires the stages together in a fixed order:
//! normalize audio → obtain a model (with one CPU fallback) → resolve the quality profile →
//! recognize → post-process segments → write outputs.
//!
//! The model cache is owned by the caller and passed into each run, so one loaded model can
//! serve many runs (and many `Transcriber`s) without any process-global state.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use crate::audio_pipeline::TARGET_SAMPLE_RATE;
use crate::backend::{Backend, RecognitionParams};
use crate::error::{Error, OutputKind, Result};
use crate::metadata::write_metadata;
use crate::model_cache::{ModelCache, ModelKey};
use crate::normalizer::AudioNormalizer;
use crate::opts::Opts;
use crate::quality::{Quality, QualityProfile};
use crate::segments::{Segment, TranscriptionResult};
use crate::srt_encoder::write_srt;

/// Subdirectory (next to the input) used for intermediate files when no metadata path is given.
pub const CACHE_DIR_NAME: &str = "transcriber_cache";

/// Channel count of the normalized audio.
pub const NORMALIZED_CHANNELS: u16 = 1;

/// Outcome summary of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionSummary {
    pub language: String,
    pub duration: f64,
    pub segments_count: usize,
    /// Subtitle path as requested (even when absent).
    pub srt: Option<PathBuf>,
    /// Metadata path as requested (even when absent).
    pub json: Option<PathBuf>,
}

/// Everything a run produces in memory.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub result: TranscriptionResult,
    pub summary: TranscriptionSummary,
}

/// The transcription pipeline.
///
/// Typical usage:
/// - Construct once with a backend and a normalizer.
/// - Keep a [`ModelCache`] alongside it.
/// - Call `run` for each input.
pub struct Transcriber<B: Backend, N: AudioNormalizer> {
    backend: B,
    normalizer: N,
}

impl<B: Backend, N: AudioNormalizer> Transcriber<B, N> {
    pub fn new(backend: B, normalizer: N) -> Self {
        Self {
            backend,
            normalizer,
        }
    }

    /// Run the full pipeline for `opts.input_path`.
    ///
    /// Any fatal condition aborts the run and is reported as the [`Error`] variant of the stage
    /// that failed. Outputs are written only after recognition completes, subtitle first.
    pub fn run(&self, cache: &ModelCache<B::Model>, opts: &Opts) -> Result<RunOutput> {
        let input = opts.input_path.as_path();
        if !input.is_file() {
            return Err(Error::InputNotFound(input.to_path_buf()));
        }

        let workdir = working_dir(input, opts.output_json.as_deref());
        fs::create_dir_all(&workdir).map_err(|source| Error::Workdir {
            path: workdir.clone(),
            source,
        })?;
        let wav_path = workdir.join(normalized_file_name(input));

        info!(input = %input.display(), wav = %wav_path.display(), "extracting audio");
        let wav_path = self
            .normalizer
            .normalize(input, &wav_path, TARGET_SAMPLE_RATE, NORMALIZED_CHANNELS)
            .map_err(Error::Normalize)?;

        let model = self.load_model(cache, opts)?;

        let profile = QualityProfile::resolve(&opts.quality);
        if opts.quality.parse::<Quality>().is_err() {
            warn!(quality = %opts.quality, "unrecognized quality label; using balanced profile");
        }

        let params = RecognitionParams {
            task: opts.task,
            language: opts.language.clone(),
            profile,
        };

        info!(
            wav = %wav_path.display(),
            task = %opts.task,
            language = opts.language.as_deref().unwrap_or("auto"),
            quality = %opts.quality,
            "transcribing"
        );
        let result = self.recognize(&model, &wav_path, &params)?;

        info!(
            segments = result.segments.len(),
            language = %result.language,
            duration = result.duration,
            "recognition finished"
        );

        if let Some(path) = opts.output_srt.as_deref() {
            write_srt(&result.segments, path).map_err(|cause| Error::Output {
                kind: OutputKind::Subtitle,
                path: path.to_path_buf(),
                cause,
            })?;
            info!(path = %path.display(), "wrote subtitles");
        }

        if let Some(path) = opts.output_json.as_deref() {
            write_metadata(&result, path).map_err(|cause| Error::Output {
                kind: OutputKind::Metadata,
                path: path.to_path_buf(),
                cause,
            })?;
            info!(path = %path.display(), "wrote metadata");
        }

        let summary = TranscriptionSummary {
            language: result.language.clone(),
            duration: result.duration,
            segments_count: result.segments.len(),
            srt: opts.output_srt.clone(),
            json: opts.output_json.clone(),
        };

        Ok(RunOutput { result, summary })
    }

    /// Access the configured backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Access the configured normalizer.
    pub fn normalizer(&self) -> &N {
        &self.normalizer
    }

    /// Obtain a model for the requested key, retrying once on the fixed CPU/int8 key.
    fn load_model(&self, cache: &ModelCache<B::Model>, opts: &Opts) -> Result<Arc<B::Model>> {
        let primary_key = ModelKey::new(&opts.model_name, &opts.device, &opts.compute_type);
        let load = |key: &ModelKey| {
            info!(model = %key.model_name, device = %key.device, compute_type = %key.compute_type, "loading model");
            self.backend.load(key)
        };

        let primary = match cache.get_or_load(&primary_key, load) {
            Ok(model) => return Ok(model),
            Err(err) => err,
        };

        warn!(
            device = %opts.device,
            error = format!("{primary:#}"),
            "failed to load model; falling back to CPU"
        );

        let fallback_key = ModelKey::cpu_fallback(&opts.model_name);
        cache
            .get_or_load(&fallback_key, load)
            .map_err(|fallback| Error::ModelLoad { primary, fallback })
    }

    /// Run recognition and drain the engine's segment sequence exactly once.
    fn recognize(
        &self,
        model: &B::Model,
        wav_path: &Path,
        params: &RecognitionParams,
    ) -> Result<TranscriptionResult> {
        let recognition = self
            .backend
            .recognize(model, wav_path, params)
            .map_err(Error::Recognition)?;

        let mut segments = Vec::new();
        for raw in recognition.segments {
            let raw = raw.map_err(Error::Recognition)?;
            if let Some(segment) = Segment::from_raw(raw, &recognition.language) {
                segments.push(segment);
            }
        }

        Ok(TranscriptionResult {
            language: recognition.language,
            duration: recognition.duration,
            segments,
        })
    }
}

/// Directory for intermediate files: the metadata output's directory, or a cache directory
/// next to the input.
fn working_dir(input: &Path, output_json: Option<&Path>) -> PathBuf {
    let dir = match output_json {
        Some(json) => json.parent().map(Path::to_path_buf).unwrap_or_default(),
        None => input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
            .join(CACHE_DIR_NAME),
    };

    if dir.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        dir
    }
}

fn normalized_file_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_owned());
    format!("{stem}.normalized.wav")
}
