use serde::Serialize;

/// A segment as yielded by a recognition backend, before post-processing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSegment {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Untrimmed text as produced by the engine.
    pub text: String,
    /// Mean token log-probability, when the engine reports one.
    pub avg_logprob: Option<f64>,
    /// Probability that the span contains no speech, when the engine reports one.
    pub no_speech_prob: Option<f64>,
}

impl RawSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
            avg_logprob: None,
            no_speech_prob: None,
        }
    }
}

/// One recognized utterance with timing, trimmed text and optional confidence metadata.
///
/// Field order matters: it is the key order of each entry in the metadata document, and
/// optional fields serialize as explicit `null`s.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub lang: String,
    pub avg_logprob: Option<f64>,
    pub no_speech_prob: Option<f64>,
}

impl Segment {
    /// Turn a raw engine segment into a retained `Segment`.
    ///
    /// Returns `None` when the trimmed text is empty; such segments never reach any output.
    /// Every retained segment is stamped with the run-level `lang`, and `end` is clamped so it
    /// never precedes `start`.
    pub fn from_raw(raw: RawSegment, lang: &str) -> Option<Self> {
        let text = raw.text.trim();
        if text.is_empty() {
            return None;
        }

        Some(Self {
            start: raw.start,
            end: raw.end.max(raw.start),
            text: text.to_owned(),
            lang: lang.to_owned(),
            avg_logprob: raw.avg_logprob,
            no_speech_prob: raw.no_speech_prob,
        })
    }
}

/// The transcript of one pipeline run.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TranscriptionResult {
    pub language: String,
    pub duration: f64,
    pub segments: Vec<Segment>,
}
