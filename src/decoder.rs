//! Decode media (audio or video containers) into mono `f32` at a target sample rate,
//! emitting fixed-size chunks via a [`SamplesSink`].
//!
//! The work is split across three small modules:
//! - `demux` handles probing + packet iteration
//! - `decode` handles codec decoding
//! - `audio_pipeline` handles downmix + resample + chunking
//!
//! Files are decoded through a seekable source so containers that keep their index at the end
//! (many MP4/MOV files) work.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, bail};
use symphonia::core::io::MediaSource;
use tracing::{debug, warn};

use crate::audio_pipeline::{AudioPipeline, TARGET_SAMPLE_RATE};
use crate::decode::TrackDecoder;
use crate::demux::Demuxer;

/// Consumer callback for decoded samples.
///
/// The sink receives **mono** `f32` samples at the configured target rate. An error aborts
/// decoding.
pub trait SamplesSink {
    fn on_samples(&mut self, samples_mono: &[f32]) -> Result<()>;
}

/// Decode configuration.
#[derive(Debug, Clone)]
pub struct DecodeOpts {
    /// Output sample rate in Hz.
    pub target_sample_rate: u32,

    /// Chunk size *after* resampling (target-rate frames).
    pub target_chunk_frames: usize,

    /// Optional container hint (e.g. "mp4", "mkv", "ogg").
    pub hint_extension: Option<String>,
}

impl Default for DecodeOpts {
    fn default() -> Self {
        Self {
            target_sample_rate: TARGET_SAMPLE_RATE,
            target_chunk_frames: 1024,
            hint_extension: None,
        }
    }
}

/// Decode the media file at `path`. The file extension is used as the probe hint unless
/// `opts` already carries one.
pub fn decode_file(path: &Path, mut opts: DecodeOpts, sink: &mut dyn SamplesSink) -> Result<()> {
    let file = File::open(path)
        .with_context(|| format!("failed to open media file '{}'", path.display()))?;

    if opts.hint_extension.is_none() {
        opts.hint_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_owned);
    }

    decode_impl(Box::new(file), opts, sink)
}

fn decode_impl(
    source: Box<dyn MediaSource>,
    opts: DecodeOpts,
    sink: &mut dyn SamplesSink,
) -> Result<()> {
    let mut demuxer = Demuxer::open(source, opts.hint_extension.as_deref())?;
    let track = demuxer.track().clone();
    debug!(
        track = track.id,
        sample_rate = track.sample_rate,
        channels = track.channels,
        declared_seconds = track.declared_seconds(),
        "selected audio track"
    );

    let mut decoder = TrackDecoder::new(&track)?;
    let mut pipeline = AudioPipeline::new(opts.target_sample_rate, opts.target_chunk_frames);
    let mut emit = |chunk: &[f32]| sink.on_samples(chunk);

    while let Some(packet) = demuxer.next_packet()? {
        decoder.decode(&packet, |decoded| {
            pipeline
                .push(&decoded, &mut emit)
                .context("audio pipeline failed while processing decoded samples")
        })?;
    }

    pipeline
        .finalize(&mut emit)
        .context("audio pipeline failed during finalize")?;

    if decoder.skipped() > 0 {
        warn!(
            skipped = decoder.skipped(),
            decoded = decoder.decoded(),
            "dropped corrupt audio packets"
        );
    }

    if decoder.decoded() == 0 && decoder.skipped() > 0 {
        bail!("every audio packet was corrupt");
    }

    Ok(())
}
