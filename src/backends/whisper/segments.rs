use anyhow::{Context, Result, anyhow};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperSegment, WhisperState};

use crate::backend::RecognitionParams;
use crate::opts::Task;
use crate::segments::RawSegment;

/// Timing and confidence of a single token, in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TokenStats {
    start: f64,
    end: f64,
    logprob: f64,
}

/// Lazy, forward-only view over the segments of a finished whisper run.
///
/// Each `next()` converts one segment out of the decoder state; nothing is buffered.
pub(super) struct WhisperSegments {
    state: WhisperState,
    next: i32,
    count: i32,
    token_timing: bool,
}

impl WhisperSegments {
    pub(super) fn new(state: WhisperState, token_timing: bool) -> Self {
        let count = state.full_n_segments();
        Self {
            state,
            next: 0,
            count,
            token_timing,
        }
    }
}

impl Iterator for WhisperSegments {
    type Item = Result<RawSegment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }

        let idx = self.next;
        self.next += 1;

        let item = self
            .state
            .get_segment(idx)
            .ok_or_else(|| anyhow!("whisper state has no segment {idx}"))
            .and_then(|segment| to_raw_segment(&segment, self.token_timing));

        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.count - self.next).max(0) as usize;
        (left, Some(left))
    }
}

pub(super) fn to_raw_segment(segment: &WhisperSegment, token_timing: bool) -> Result<RawSegment> {
    let text = segment
        .to_str()
        .context("failed to get segment text")?
        .to_owned();

    let tokens = token_stats(segment)?;

    let (start, end) = if token_timing {
        // Token timing trims the leading/trailing silence whisper includes in segment bounds.
        seconds_from_tokens(&tokens).unwrap_or_else(|| segment_seconds(segment))
    } else {
        segment_seconds(segment)
    };

    let avg_logprob = if tokens.is_empty() {
        None
    } else {
        Some(tokens.iter().map(|t| t.logprob).sum::<f64>() / tokens.len() as f64)
    };

    Ok(RawSegment {
        start,
        end,
        text,
        avg_logprob,
        no_speech_prob: Some(segment.no_speech_probability() as f64),
    })
}

fn segment_seconds(segment: &WhisperSegment) -> (f64, f64) {
    let start = centiseconds_to_seconds(segment.start_timestamp());
    let end = centiseconds_to_seconds(segment.end_timestamp());
    (start, end.max(start))
}

/// Collect stats for the text tokens of a segment; special/control tokens are skipped.
fn token_stats(segment: &WhisperSegment) -> Result<Vec<TokenStats>> {
    let token_count = segment.n_tokens();
    let mut tokens = Vec::with_capacity(usize::try_from(token_count).unwrap_or(0));

    for token_idx in 0..token_count {
        let token = segment
            .get_token(token_idx)
            .with_context(|| format!("failed to get token {token_idx} from segment"))?;

        let text = token
            .to_str()
            .with_context(|| format!("failed to get token text at index {token_idx}"))?;

        // whisper control tokens look like `[_BEG_]` or `[_TT_50]`.
        if text.starts_with("[_") && text.ends_with("_]") {
            continue;
        }

        let data = token.token_data();
        tokens.push(TokenStats {
            start: centiseconds_to_seconds(data.t0),
            end: centiseconds_to_seconds(data.t1),
            logprob: data.plog as f64,
        });
    }

    Ok(tokens)
}

/// Span covered by tokens with known timing, if any.
fn seconds_from_tokens(tokens: &[TokenStats]) -> Option<(f64, f64)> {
    let timed = tokens
        .iter()
        .filter(|t| !(t.start <= 0.0 && t.end <= 0.0));

    let (start, end) = timed.fold((None, None), |(lo, hi): (Option<f64>, Option<f64>), t| {
        (
            Some(lo.map_or(t.start, |v| v.min(t.start))),
            Some(hi.map_or(t.end, |v| v.max(t.end))),
        )
    });

    match (start, end) {
        (Some(s), Some(e)) if e >= s => Some((s, e)),
        _ => None,
    }
}

/// whisper reports times in centiseconds and uses -1 for "unknown"; clamp those to zero.
fn centiseconds_to_seconds(value: i64) -> f64 {
    if value < 0 { 0.0 } else { value as f64 / 100.0 }
}

fn build_full_params(params: &RecognitionParams) -> FullParams<'_, '_> {
    let strategy = if params.profile.beam_size <= 1 {
        SamplingStrategy::Greedy { best_of: 1 }
    } else {
        SamplingStrategy::BeamSearch {
            beam_size: params.profile.beam_size as i32,
            patience: 1.0,
        }
    };

    let mut full = FullParams::new(strategy);

    full.set_n_threads(num_cpus::get() as i32);
    full.set_translate(params.task == Task::Translate);
    full.set_language(params.language.as_deref());
    full.set_no_context(true);
    full.set_single_segment(false);

    full.set_print_progress(false);
    full.set_print_special(false);
    full.set_print_realtime(false);
    full.set_print_timestamps(false);

    full.set_token_timestamps(params.profile.word_timestamps);

    full
}

/// Run a full whisper pass over `samples` and hand back the decoder state.
pub(super) fn run_whisper_full(
    ctx: &WhisperContext,
    params: &RecognitionParams,
    samples: &[f32],
) -> Result<WhisperState> {
    let full = build_full_params(params);

    let mut state = ctx
        .create_state()
        .context("failed to create whisper state")?;

    state
        .full(full, samples)
        .context("failed to run whisper full()")?;

    Ok(state)
}

/// Language code whisper settled on for the last run, or `"und"` when it cannot say.
pub(super) fn detected_language(state: &WhisperState) -> String {
    let id = state.full_lang_id_from_state();
    whisper_rs::get_lang_str(id)
        .unwrap_or(super::UNDETERMINED_LANGUAGE)
        .to_owned()
}
