use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use tracing::{debug, warn};

use crate::decoder::{DecodeOpts, SamplesSink, decode_file};
use crate::wav::Pcm16Writer;

/// Converts arbitrary input media into a PCM WAV file the recognition engine can read.
pub trait AudioNormalizer {
    /// Normalize `source` into `target` at `sample_rate` Hz with `channels` channels.
    ///
    /// Returns the path of the written file. Any failure is fatal for the run.
    fn normalize(
        &self,
        source: &Path,
        target: &Path,
        sample_rate: u32,
        channels: u16,
    ) -> Result<PathBuf>;
}

/// Built-in normalizer: Symphonia demux/decode, rubato resampling, hound WAV output.
#[derive(Debug, Clone, Default)]
pub struct SymphoniaNormalizer {
    chunk_frames: Option<usize>,
}

impl SymphoniaNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the number of frames handed to the WAV writer per chunk.
    pub fn with_chunk_frames(mut self, frames: usize) -> Self {
        self.chunk_frames = Some(frames.max(1));
        self
    }
}

impl AudioNormalizer for SymphoniaNormalizer {
    fn normalize(
        &self,
        source: &Path,
        target: &Path,
        sample_rate: u32,
        channels: u16,
    ) -> Result<PathBuf> {
        ensure!(sample_rate > 0, "sample rate must be positive");
        ensure!(channels > 0, "channel count must be at least 1");

        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
        }

        let mut opts = DecodeOpts {
            target_sample_rate: sample_rate,
            ..DecodeOpts::default()
        };
        if let Some(frames) = self.chunk_frames {
            opts.target_chunk_frames = frames;
        }

        let frames = match write_normalized(source, target, opts, sample_rate, channels) {
            Ok(frames) => frames,
            Err(err) => {
                // A half-written WAV has an unpatched header.
                match fs::remove_file(target) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(wav = %target.display(), error = %e, "failed to remove partial WAV")
                    }
                }
                return Err(err);
            }
        };

        debug!(
            source = %source.display(),
            wav = %target.display(),
            sample_rate,
            channels,
            frames,
            "normalized audio"
        );

        Ok(target.to_path_buf())
    }
}

/// Decode `source` into a fresh WAV at `target`, returning the frame count.
fn write_normalized(
    source: &Path,
    target: &Path,
    opts: DecodeOpts,
    sample_rate: u32,
    channels: u16,
) -> Result<u64> {
    let mut sink = WavSink {
        writer: Pcm16Writer::create(target, sample_rate, channels)?,
    };

    decode_file(source, opts, &mut sink)
        .with_context(|| format!("failed to decode '{}'", source.display()))?;

    let frames = sink.writer.frames();
    sink.writer.finalize()?;
    Ok(frames)
}

struct WavSink {
    writer: Pcm16Writer<std::io::BufWriter<std::fs::File>>,
}

impl SamplesSink for WavSink {
    fn on_samples(&mut self, samples_mono: &[f32]) -> Result<()> {
        self.writer.write_mono(samples_mono)
    }
}
