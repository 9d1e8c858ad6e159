//! Container probing and packet iteration over Symphonia.

use anyhow::{Context, Result, anyhow, bail};
use symphonia::core::codecs::{CODEC_TYPE_NULL, CodecParameters};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::{MediaSource, MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Read-ahead buffer for probing. Symphonia wants a power of two above 32 KiB.
const PROBE_BUFFER_LEN: usize = 256 * 1024;

/// The audio track chosen from a container.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    pub id: u32,
    pub sample_rate: u32,
    pub channels: Option<usize>,
    /// Total frames, when the container declares it.
    pub n_frames: Option<u64>,
    pub codec_params: CodecParameters,
}

impl AudioTrack {
    /// Declared duration in seconds, if known up front.
    pub fn declared_seconds(&self) -> Option<f64> {
        self.n_frames
            .map(|frames| frames as f64 / self.sample_rate as f64)
    }
}

/// Packet source restricted to one audio track.
pub struct Demuxer {
    format: Box<dyn FormatReader>,
    track: AudioTrack,
}

impl Demuxer {
    /// Probe `source` and select its first decodable audio track.
    ///
    /// Video and data tracks report no sample rate and are skipped. `hint_extension`
    /// (e.g. "mp4", "mkv") helps with ambiguous inputs.
    pub fn open(source: Box<dyn MediaSource>, hint_extension: Option<&str>) -> Result<Self> {
        let mss = MediaSourceStream::new(
            source,
            MediaSourceStreamOptions {
                buffer_len: PROBE_BUFFER_LEN,
            },
        );

        let mut hint = Hint::new();
        if let Some(ext) = hint_extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| anyhow!(e))
            .context("failed to probe media container")?;

        let format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find_map(|t| {
                let params = &t.codec_params;
                if params.codec == CODEC_TYPE_NULL {
                    return None;
                }
                Some(AudioTrack {
                    id: t.id,
                    sample_rate: params.sample_rate?,
                    channels: params.channels.map(|c| c.count()),
                    n_frames: params.n_frames,
                    codec_params: params.clone(),
                })
            })
            .ok_or_else(|| anyhow!("no audio track found"))?;

        Ok(Self { format, track })
    }

    pub fn track(&self) -> &AudioTrack {
        &self.track
    }

    /// Next packet of the selected track. `Ok(None)` means end of stream.
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            match self.format.next_packet() {
                Ok(packet) if packet.track_id() == self.track.id => return Ok(Some(packet)),
                Ok(_) => continue,
                // Symphonia reports a clean end of stream as an unexpected EOF.
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    bail!("container changed its track layout mid-stream")
                }
                Err(e) => return Err(anyhow!(e)).context("failed reading packet"),
            }
        }
    }
}
