//! Codec-level decoding over Symphonia.

use anyhow::{Context, Result, anyhow};
use symphonia::core::audio::AudioBufferRef;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;
use tracing::trace;

use crate::demux::AudioTrack;

/// Decoder for one audio track that tolerates corrupt packets.
pub struct TrackDecoder {
    inner: Box<dyn Decoder>,
    decoded: u64,
    skipped: u64,
}

impl TrackDecoder {
    pub fn new(track: &AudioTrack) -> Result<Self> {
        let inner = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| anyhow!(e))
            .context("unsupported or invalid audio codec")?;

        Ok(Self {
            inner,
            decoded: 0,
            skipped: 0,
        })
    }

    /// Decode `packet` and pass the buffer to `on_decoded`.
    ///
    /// Corrupt packets are counted and skipped; any other decoder error is fatal.
    pub fn decode(
        &mut self,
        packet: &Packet,
        on_decoded: impl FnOnce(AudioBufferRef<'_>) -> Result<()>,
    ) -> Result<()> {
        match self.inner.decode(packet) {
            Ok(buf) => {
                self.decoded += 1;
                on_decoded(buf)
            }
            Err(SymphoniaError::DecodeError(reason)) => {
                self.skipped += 1;
                trace!(reason, ts = packet.ts(), "skipping corrupt packet");
                Ok(())
            }
            Err(e) => Err(anyhow!(e)).context("decoder failure"),
        }
    }

    /// Packets decoded successfully so far.
    pub fn decoded(&self) -> u64 {
        self.decoded
    }

    /// Packets dropped as corrupt so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
