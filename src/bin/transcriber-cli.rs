use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Result, bail};
use clap::Parser;
use tracing::error;
use tracing::level_filters::LevelFilter;

use transcriber::backends::whisper::DEFAULT_MODELS_DIR;
use transcriber::logging;
use transcriber::{
    ModelCache, Opts, Quality, SymphoniaNormalizer, Task, Transcriber, TranscriptionSummary,
    WhisperBackend,
};

fn main() -> ExitCode {
    logging::init(LevelFilter::INFO);

    match run() {
        Ok(summary) => {
            println!("{}", summary_line(&summary));
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = format!("{err:#}"), "transcription failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<TranscriptionSummary> {
    let params = Params::parse();
    if !params.input.is_file() {
        bail!("input file does not exist: {}", params.input.display());
    }

    let mut backend = WhisperBackend::new(&params.models_dir);
    if let Some(vad) = &params.vad_model {
        backend = backend.with_vad_model(vad);
    }

    let transcriber = Transcriber::new(backend, SymphoniaNormalizer::new());
    let cache = ModelCache::new();

    let output = transcriber.run(&cache, &params.to_opts())?;
    Ok(output.summary)
}

#[derive(Parser, Debug)]
#[command(name = "transcriber")]
#[command(about = "Transcribe a media file to SRT subtitles and JSON metadata")]
struct Params {
    /// Input media file (audio or video).
    input: PathBuf,

    /// Subtitle output path.
    #[arg(long = "srt", default_value = "output.srt")]
    srt: PathBuf,

    /// Metadata output path.
    #[arg(long = "json", default_value = "output.json")]
    json: PathBuf,

    #[arg(short = 'm', long = "model", default_value = "small")]
    model: String,

    /// Device selector: `cuda`, `cuda:N` or `cpu`.
    #[arg(short = 'd', long = "device", default_value = "cuda")]
    device: String,

    #[arg(long = "compute-type", default_value = "float16")]
    compute_type: String,

    /// Language hint; auto-detected when omitted.
    #[arg(short = 'l', long = "language")]
    language: Option<String>,

    #[arg(short = 't', long = "task", value_enum, default_value_t = Task::Transcribe)]
    task: Task,

    #[arg(short = 'q', long = "quality", value_enum, default_value_t = Quality::Balanced)]
    quality: Quality,

    /// Directory searched for `ggml-<model>.bin` files.
    #[arg(long = "models-dir", default_value = DEFAULT_MODELS_DIR)]
    models_dir: PathBuf,

    /// Whisper-VAD model used by profiles that filter non-speech.
    #[arg(long = "vad-model")]
    vad_model: Option<PathBuf>,
}

impl Params {
    fn to_opts(&self) -> Opts {
        Opts {
            model_name: self.model.clone(),
            device: self.device.clone(),
            compute_type: self.compute_type.clone(),
            language: self.language.clone(),
            task: self.task,
            quality: self.quality.as_str().to_owned(),
            output_srt: Some(self.srt.clone()),
            output_json: Some(self.json.clone()),
            ..Opts::new(&self.input)
        }
    }
}

fn summary_line(summary: &TranscriptionSummary) -> String {
    let path = |p: &Option<PathBuf>| {
        p.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "-".to_owned())
    };

    format!(
        "Done: Language: {} | Duration: {:.2}s | Segments: {} | .srt: {}, .json: {}",
        summary.language,
        summary.duration,
        summary.segments_count,
        path(&summary.srt),
        path(&summary.json),
    )
}
