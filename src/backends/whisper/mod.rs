use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};
use whisper_rs::WhisperContext;

use crate::audio_pipeline::TARGET_SAMPLE_RATE;
use crate::backend::{Backend, Recognition, RecognitionParams};
use crate::model_cache::ModelKey;
use crate::segments::RawSegment;
use crate::wav::read_mono_samples;

mod ctx;
mod logging;
mod model_path;
mod segments;
mod vad;

pub use logging::init_whisper_logging;

use model_path::{parse_device, resolve_model_path};
use segments::{WhisperSegments, detected_language, run_whisper_full};

/// Language code reported when no hint was given and whisper cannot tell.
const UNDETERMINED_LANGUAGE: &str = "und";

/// Default directory searched for `ggml-<name>.bin` model files.
pub const DEFAULT_MODELS_DIR: &str = "./models";

/// Built-in backend powered by `whisper-rs` / `whisper.cpp`.
#[derive(Debug, Clone)]
pub struct WhisperBackend {
    models_dir: PathBuf,
    vad_model_path: Option<PathBuf>,
}

/// A whisper.cpp model loaded for one [`ModelKey`].
pub struct WhisperModel {
    ctx: WhisperContext,
    key: ModelKey,
    path: PathBuf,
}

impl WhisperModel {
    /// Access the underlying Whisper context.
    pub fn context(&self) -> &WhisperContext {
        &self.ctx
    }

    pub fn key(&self) -> &ModelKey {
        &self.key
    }

    /// The model file this handle was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for WhisperBackend {
    fn default() -> Self {
        Self::new(DEFAULT_MODELS_DIR)
    }
}

impl WhisperBackend {
    /// Create a backend that resolves model names inside `models_dir`.
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            vad_model_path: None,
        }
    }

    /// Use a Whisper-VAD model for profiles that ask for VAD filtering.
    ///
    /// Without one, VAD filtering is skipped with a warning.
    pub fn with_vad_model(mut self, path: impl Into<PathBuf>) -> Self {
        self.vad_model_path = Some(path.into());
        self
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn vad_model_path(&self) -> Option<&Path> {
        self.vad_model_path.as_deref()
    }
}

impl Backend for WhisperBackend {
    type Model = WhisperModel;

    fn load(&self, key: &ModelKey) -> Result<WhisperModel> {
        let device = parse_device(&key.device)?;
        let path = resolve_model_path(&self.models_dir, key)?;

        debug!(model = %path.display(), use_gpu = device.use_gpu, gpu_device = device.gpu_device, "loading whisper model");
        let ctx = ctx::load_context(&path, device)?;

        Ok(WhisperModel {
            ctx,
            key: key.clone(),
            path,
        })
    }

    fn recognize<'m>(
        &self,
        model: &'m WhisperModel,
        audio_path: &Path,
        params: &RecognitionParams,
    ) -> Result<Recognition<'m>> {
        let (mut samples, _spec) = read_mono_samples(audio_path, TARGET_SAMPLE_RATE)?;
        let duration = samples.len() as f64 / TARGET_SAMPLE_RATE as f64;

        let silent = |language: Option<&str>| Recognition {
            language: language.unwrap_or(UNDETERMINED_LANGUAGE).to_owned(),
            duration,
            segments: Box::new(std::iter::empty::<Result<RawSegment>>()),
        };

        if samples.is_empty() {
            return Ok(silent(params.language.as_deref()));
        }

        if params.profile.vad_filter {
            match self.vad_model_path.as_deref() {
                Some(vad_path) => {
                    let found_speech =
                        vad::to_speech_only(vad_path, TARGET_SAMPLE_RATE, &mut samples)
                            .context("voice activity detection failed")?;
                    if !found_speech {
                        debug!("VAD found no speech");
                        return Ok(silent(params.language.as_deref()));
                    }
                }
                None => warn!("VAD filtering requested but no VAD model is configured; skipping"),
            }
        }

        let state = run_whisper_full(&model.ctx, params, &samples)?;

        let language = match params.language.as_deref() {
            Some(hint) => hint.to_owned(),
            None => detected_language(&state),
        };

        Ok(Recognition {
            language,
            duration,
            segments: Box::new(WhisperSegments::new(state, params.profile.word_timestamps)),
        })
    }
}
