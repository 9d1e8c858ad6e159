use std::path::Path;

use anyhow::{Context, Result, anyhow};
use whisper_rs::{WhisperVadContext, WhisperVadContextParams, WhisperVadParams};

/// Padding kept around each detected speech span so word onsets survive the gate.
const PAD_MS: u32 = 200;

/// Zero out everything outside detected speech, keeping the buffer length (and therefore all
/// timestamps) unchanged.
///
/// Returns `false` when no speech was found at all.
pub(super) fn to_speech_only(
    vad_model_path: &Path,
    sample_rate_hz: u32,
    samples: &mut [f32],
) -> Result<bool> {
    let path = vad_model_path
        .to_str()
        .ok_or_else(|| anyhow!("VAD model path is not valid UTF-8"))?;

    let mut vad_ctx = WhisperVadContext::new(path, WhisperVadContextParams::default())
        .with_context(|| format!("failed to load VAD model from '{path}'"))?;

    let mut vad_params = WhisperVadParams::default();
    // Cap speech spans (seconds) so long monologues still get split.
    vad_params.set_max_speech_duration(15.0);

    let segments = vad_ctx
        .segments_from_samples(vad_params, samples)
        .context("VAD inference failed")?;

    let mut spans_cs = Vec::new();
    for i in 0..segments.num_segments() {
        let start = segments
            .get_segment_start_timestamp(i)
            .ok_or_else(|| anyhow!("missing start timestamp for VAD segment {i}"))?;
        let end = segments
            .get_segment_end_timestamp(i)
            .ok_or_else(|| anyhow!("missing end timestamp for VAD segment {i}"))?;
        spans_cs.push((start, end));
    }

    let ranges = speech_ranges(&spans_cs, sample_rate_hz, samples.len());
    if ranges.is_empty() {
        return Ok(false);
    }

    mute_outside(samples, &ranges);
    Ok(true)
}

/// Convert centisecond speech spans into padded, merged sample ranges.
///
/// The result is sorted and non-overlapping, and every range lies inside `0..len`.
fn speech_ranges(spans_cs: &[(f32, f32)], sample_rate_hz: u32, len: usize) -> Vec<(usize, usize)> {
    let rate = sample_rate_hz as f32;
    let pad = ((PAD_MS as f32 / 1000.0) * rate).round() as usize;

    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for &(start_cs, end_cs) in spans_cs {
        let start = ((start_cs / 100.0) * rate).floor().max(0.0) as usize;
        let end = ((end_cs / 100.0) * rate).ceil().max(0.0) as usize;

        let start = start.saturating_sub(pad).min(len);
        let end = (end + pad).min(len);
        if start >= end {
            continue;
        }

        if let Some((_, prev_end)) = ranges.last_mut() {
            if start <= *prev_end {
                *prev_end = (*prev_end).max(end);
                continue;
            }
        }

        ranges.push((start, end));
    }

    ranges
}

fn mute_outside(samples: &mut [f32], ranges: &[(usize, usize)]) {
    let mut cursor = 0usize;
    for &(start, end) in ranges {
        if start > cursor {
            samples[cursor..start].fill(0.0);
        }
        cursor = cursor.max(end);
    }

    if cursor < samples.len() {
        samples[cursor..].fill(0.0);
    }
}
