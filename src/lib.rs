//! `transcriber`: turn media files into SRT subtitles and JSON transcript metadata.
//!
//! This crate provides:
//! - Audio normalization (Symphonia decode, rubato resampling, 16 kHz mono WAV output)
//! - Model loading with a caller-owned single-slot cache and a CPU fallback
//! - Quality profiles mapping a label to decoding parameters
//! - Recognition through a pluggable [`Backend`] (Whisper built in)
//! - SRT and JSON writers
//!
//! Most consumers should start with [`Transcriber`] and [`Opts`].

// High-level API (most consumers should start here).
pub mod opts;
pub mod quality;
pub mod transcriber;

// Model lifecycle and the recognition seam.
pub mod backend;
pub mod backends;
pub mod model_cache;

// Audio preprocessing and decoding.
pub mod audio_pipeline;
pub mod decode;
pub mod decoder;
pub mod demux;
pub mod normalizer;
pub mod wav;

// Segment data structures and output writers.
pub mod metadata;
pub mod segment_encoder;
pub mod segments;
pub mod srt_encoder;
pub mod timecode;

pub mod error;

// Logging configuration for binaries.
#[cfg(feature = "logging")]
pub mod logging;

pub use backend::{Backend, Recognition, RecognitionParams};
pub use backends::whisper::{WhisperBackend, WhisperModel};
pub use error::{Error, OutputKind, Result, Stage};
pub use model_cache::{ModelCache, ModelKey};
pub use normalizer::{AudioNormalizer, SymphoniaNormalizer};
pub use opts::{Opts, Task};
pub use quality::{Quality, QualityProfile};
pub use segments::{RawSegment, Segment, TranscriptionResult};
pub use transcriber::{RunOutput, TranscriptionSummary, Transcriber};
