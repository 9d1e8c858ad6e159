use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::Error;

/// What the recognition engine should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Task {
    /// Transcribe speech verbatim in the spoken language.
    #[default]
    Transcribe,

    /// Translate speech to English.
    Translate,
}

impl Task {
    pub fn as_str(self) -> &'static str {
        match self {
            Task::Transcribe => "transcribe",
            Task::Translate => "translate",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "transcribe" => Ok(Task::Transcribe),
            "translate" => Ok(Task::Translate),
            _ => Err(Error::InvalidTask(s.to_owned())),
        }
    }
}

/// Options that control a single transcription run.
///
/// This struct represents *library-level configuration*, not CLI flags directly.
/// The CLI is responsible for mapping user input into this type so that:
/// - the library remains reusable outside of a CLI context
/// - other frontends (APIs, tests, batch jobs) can construct options programmatically
#[derive(Debug, Clone)]
pub struct Opts {
    /// Source media file. Must exist.
    pub input_path: PathBuf,

    /// Model identifier: a known model name (e.g. `"small"`) or a path to a model file.
    pub model_name: String,

    /// Device selector, e.g. `"cuda"`, `"cuda:1"` or `"cpu"`.
    pub device: String,

    /// Compute precision selector, e.g. `"float16"` or `"int8"`.
    pub compute_type: String,

    /// Optional language hint (e.g. `"en"`, `"es"`).
    ///
    /// When `None`, the engine auto-detects the spoken language.
    pub language: Option<String>,

    pub task: Task,

    /// Quality label. Resolved leniently: unknown labels mean balanced.
    pub quality: String,

    /// Where to write the SRT subtitle file, if anywhere.
    pub output_srt: Option<PathBuf>,

    /// Where to write the JSON metadata file, if anywhere.
    ///
    /// Its parent directory also becomes the working directory for the normalized audio.
    pub output_json: Option<PathBuf>,
}

impl Opts {
    /// Options for `input_path` with the default model, device and profile and no outputs.
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            model_name: "small".to_owned(),
            device: "cuda".to_owned(),
            compute_type: "float16".to_owned(),
            language: None,
            task: Task::Transcribe,
            quality: "balanced".to_owned(),
            output_srt: None,
            output_json: None,
        }
    }
}
