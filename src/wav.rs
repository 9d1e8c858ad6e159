use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// WAV spec of a normalized file: 16-bit signed PCM at `sample_rate` with `channels`.
pub fn pcm16_spec(sample_rate: u32, channels: u16) -> WavSpec {
    WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Incrementally writes mono `f32` samples as 16-bit PCM, duplicating each sample across
/// every output channel.
pub struct Pcm16Writer<W: Write + Seek> {
    inner: WavWriter<W>,
    channels: u16,
    frames: u64,
}

impl Pcm16Writer<std::io::BufWriter<File>> {
    /// Create (or truncate) the WAV file at `path`.
    pub fn create(path: &Path, sample_rate: u32, channels: u16) -> Result<Self> {
        ensure!(channels > 0, "channel count must be at least 1");
        let inner = WavWriter::create(path, pcm16_spec(sample_rate, channels))
            .with_context(|| format!("failed to create WAV file '{}'", path.display()))?;
        Ok(Self {
            inner,
            channels,
            frames: 0,
        })
    }
}

impl<W: Write + Seek> Pcm16Writer<W> {
    /// Wrap an existing writer.
    pub fn new(w: W, sample_rate: u32, channels: u16) -> Result<Self> {
        ensure!(channels > 0, "channel count must be at least 1");
        let inner =
            WavWriter::new(w, pcm16_spec(sample_rate, channels)).context("failed to start WAV")?;
        Ok(Self {
            inner,
            channels,
            frames: 0,
        })
    }

    /// Append mono samples in `[-1.0, 1.0]`; out-of-range values are clipped.
    pub fn write_mono(&mut self, samples: &[f32]) -> Result<()> {
        for &sample in samples {
            let pcm = (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16;
            for _ in 0..self.channels {
                self.inner.write_sample(pcm)?;
            }
        }
        self.frames += samples.len() as u64;
        Ok(())
    }

    /// Number of frames written so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Patch the WAV header and flush.
    pub fn finalize(self) -> Result<()> {
        self.inner
            .finalize()
            .context("failed to finalize WAV file")
    }
}

/// Load a normalized WAV file and return its samples as mono `f32` in `[-1.0, 1.0]`.
///
/// Format requirements: mono, 16-bit integer PCM at `expected_rate`.
pub fn read_mono_samples(path: &Path, expected_rate: u32) -> Result<(Vec<f32>, WavSpec)> {
    let file = File::open(path)
        .with_context(|| format!("failed to open WAV file '{}'", path.display()))?;
    read_mono_samples_from(BufReader::new(file), expected_rate)
}

pub fn read_mono_samples_from<R>(reader: R, expected_rate: u32) -> Result<(Vec<f32>, WavSpec)>
where
    R: Read,
{
    let mut reader = WavReader::new(reader).context("failed to read WAV data")?;
    let spec = reader.spec();

    if spec.channels != 1 {
        bail!(
            "expected mono WAV (1 channel), got {} channels",
            spec.channels
        );
    }

    if spec.sample_rate != expected_rate {
        bail!(
            "expected {} Hz sample rate, got {} Hz",
            expected_rate,
            spec.sample_rate
        );
    }

    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        bail!(
            "expected 16-bit integer PCM, got {} bits ({:?})",
            spec.bits_per_sample,
            spec.sample_format
        );
    }

    let samples = reader
        .samples::<i16>()
        .map(|s| s.map(|pcm| pcm as f32 / i16::MAX as f32))
        .collect::<std::result::Result<Vec<f32>, _>>()
        .context("failed to decode WAV samples")?;

    Ok((samples, spec))
}
