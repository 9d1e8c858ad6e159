use std::fmt;
use std::path::Path;

use anyhow::Result;

use crate::model_cache::ModelKey;
use crate::opts::Task;
use crate::quality::QualityProfile;
use crate::segments::RawSegment;

/// Pluggable speech-recognition engine used by [`crate::Transcriber`].
///
/// A backend has two capabilities:
/// - load a model for a `(model, device, precision)` key
/// - run recognition over a normalized mono WAV file with a loaded model
///
/// Loaded models are cached by the caller (see [`crate::ModelCache`]); backends should not keep
/// their own model cache.
pub trait Backend {
    /// Loaded, resource-holding model handle.
    type Model;

    /// Load a model for `key`.
    ///
    /// Any failure (missing model, unknown device, unsupported precision, out of memory) is
    /// reported the same way; the caller decides whether to fall back.
    fn load(&self, key: &ModelKey) -> Result<Self::Model>;

    /// Run recognition over `audio_path` with a loaded model.
    ///
    /// The returned segment sequence is forward-only and is consumed exactly once.
    fn recognize<'m>(
        &self,
        model: &'m Self::Model,
        audio_path: &Path,
        params: &RecognitionParams,
    ) -> Result<Recognition<'m>>;
}

/// Per-run parameters handed to [`Backend::recognize`].
#[derive(Debug, Clone)]
pub struct RecognitionParams {
    pub task: Task,

    /// Language hint. `None` asks the engine to auto-detect.
    pub language: Option<String>,

    pub profile: QualityProfile,
}

/// Lazy, single-pass sequence of raw segments.
pub type SegmentIter<'m> = Box<dyn Iterator<Item = Result<RawSegment>> + 'm>;

/// What a recognition pass yields.
pub struct Recognition<'m> {
    /// Declared or detected language code.
    pub language: String,

    /// Total audio duration in seconds.
    pub duration: f64,

    pub segments: SegmentIter<'m>,
}

impl fmt::Debug for Recognition<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recognition")
            .field("language", &self.language)
            .field("duration", &self.duration)
            .finish_non_exhaustive()
    }
}
