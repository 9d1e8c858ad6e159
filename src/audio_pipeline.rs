//! PCM normalization stage of the audio normalizer.
//!
//! Decoded Symphonia buffers go in; mono `f32` chunks at the target rate come out.
//! Resampled output is delay-compensated and trimmed so the emitted length matches the source
//! duration, which keeps reported durations and timestamps honest.
//!
//! `finalize()` must be called at end-of-stream to flush any remaining resampler input.

use anyhow::{Context, Result, anyhow, bail};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer};

/// Sample rate the recognition engine expects (Hz).
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

/// Source frames fed to rubato per `process()` call.
const RESAMPLER_BLOCK_FRAMES: usize = 2048;

/// Callback receiving mono chunks.
pub type Emit<'a> = dyn FnMut(&[f32]) -> Result<()> + 'a;

/// Converts decoded audio into mono `f32` chunks at a fixed target rate.
pub struct AudioPipeline {
    target_rate: u32,
    chunker: Chunker,
    scratch: Option<SampleBuffer<f32>>,
    resampling: Option<Resampling>,
}

/// Rate conversion state, created on the first buffer whose rate differs from the target.
struct Resampling {
    inner: SincFixedIn<f32>,
    src_rate: u32,
    pending: Vec<f32>,
    /// Leading output frames still to drop (filter delay).
    delay_left: usize,
    src_frames: u64,
    out_frames: u64,
}

impl AudioPipeline {
    /// Create a pipeline that emits mono audio at `target_rate` Hz in chunks of
    /// `chunk_frames` frames (the last chunk may be shorter).
    pub fn new(target_rate: u32, chunk_frames: usize) -> Self {
        Self {
            target_rate,
            chunker: Chunker::new(chunk_frames),
            scratch: None,
            resampling: None,
        }
    }

    /// Push one decoded buffer through downmix and resampling.
    pub fn push(&mut self, decoded: &AudioBufferRef<'_>, emit: &mut Emit<'_>) -> Result<()> {
        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels == 0 {
            bail!("decoded audio had zero channels");
        }

        let scratch = self.scratch.get_or_insert_with(|| {
            SampleBuffer::<f32>::new(decoded.capacity() as u64, spec)
        });
        scratch.copy_interleaved_ref(decoded.clone());
        let mono = downmix_to_mono(scratch.samples(), channels);

        if spec.rate == self.target_rate {
            return self.chunker.push(&mono, emit);
        }

        if self.resampling.is_none() {
            self.resampling = Some(Resampling::new(spec.rate, self.target_rate)?);
        }
        let Some(resampling) = self.resampling.as_mut() else {
            bail!("resampler not initialized");
        };
        if resampling.src_rate != spec.rate {
            bail!(
                "sample rate changed mid-stream ({} Hz -> {} Hz)",
                resampling.src_rate,
                spec.rate
            );
        }

        resampling.pending.extend_from_slice(&mono);
        resampling.src_frames += mono.len() as u64;

        while resampling.pending.len() >= RESAMPLER_BLOCK_FRAMES {
            let block: Vec<f32> = resampling.pending.drain(..RESAMPLER_BLOCK_FRAMES).collect();
            let out = resampling.process(block)?;
            resampling.out_frames += out.len() as u64;
            self.chunker.push(&out, emit)?;
        }

        Ok(())
    }

    /// Flush buffered input at end-of-stream and emit the final (possibly short) chunk.
    pub fn finalize(&mut self, emit: &mut Emit<'_>) -> Result<()> {
        if let Some(resampling) = self.resampling.as_mut() {
            let expected = resampling.expected_out_frames(self.target_rate);

            // Zero-pad until the delayed tail has been pushed out.
            while resampling.out_frames < expected {
                let mut block = std::mem::take(&mut resampling.pending);
                block.resize(RESAMPLER_BLOCK_FRAMES, 0.0);

                let mut out = resampling.process(block)?;
                if out.is_empty() && resampling.delay_left == 0 {
                    bail!("resampler stopped producing output");
                }

                let room = (expected - resampling.out_frames) as usize;
                out.truncate(room);
                resampling.out_frames += out.len() as u64;
                self.chunker.push(&out, emit)?;
            }
        }

        self.chunker.flush(emit)
    }
}

impl Resampling {
    fn new(src_rate: u32, target_rate: u32) -> Result<Self> {
        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let inner = SincFixedIn::<f32>::new(
            target_rate as f64 / src_rate as f64,
            1.0,
            params,
            RESAMPLER_BLOCK_FRAMES,
            1,
        )
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("failed to init resampler ({src_rate} Hz -> {target_rate} Hz)"))?;

        Ok(Self {
            delay_left: inner.output_delay(),
            inner,
            src_rate,
            pending: Vec::with_capacity(RESAMPLER_BLOCK_FRAMES * 2),
            src_frames: 0,
            out_frames: 0,
        })
    }

    /// Number of target-rate frames that cover the source frames seen so far.
    fn expected_out_frames(&self, target_rate: u32) -> u64 {
        (self.src_frames * target_rate as u64).div_ceil(self.src_rate as u64)
    }

    /// Resample one full block, dropping any leading delay frames.
    fn process(&mut self, block: Vec<f32>) -> Result<Vec<f32>> {
        let input = vec![block];
        let mut out = self
            .inner
            .process(&input, None)
            .map_err(|e| anyhow!(e))
            .context("resampler process failed")?;

        if out.len() != 1 {
            bail!("expected mono output from resampler, got {} channels", out.len());
        }
        let mut mono = out.swap_remove(0);

        let skip = self.delay_left.min(mono.len());
        self.delay_left -= skip;
        mono.drain(..skip);

        Ok(mono)
    }
}

/// Re-slices a stream of arbitrarily sized pieces into fixed-size chunks.
struct Chunker {
    frames: usize,
    buf: Vec<f32>,
}

impl Chunker {
    fn new(frames: usize) -> Self {
        let frames = frames.max(1);
        Self {
            frames,
            buf: Vec::with_capacity(frames),
        }
    }

    fn push(&mut self, mut samples: &[f32], emit: &mut Emit<'_>) -> Result<()> {
        while !samples.is_empty() {
            let take = (self.frames - self.buf.len()).min(samples.len());
            self.buf.extend_from_slice(&samples[..take]);
            samples = &samples[take..];

            if self.buf.len() == self.frames {
                emit(&self.buf)?;
                self.buf.clear();
            }
        }
        Ok(())
    }

    fn flush(&mut self, emit: &mut Emit<'_>) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        emit(&self.buf)?;
        self.buf.clear();
        Ok(())
    }
}

/// Downmix interleaved samples into mono by averaging channels.
fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }

    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
