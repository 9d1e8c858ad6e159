use std::path::Path;

use anyhow::{Result, bail};
use transcriber::decoder::{DecodeOpts, SamplesSink, decode_file};

#[derive(Default)]
struct CollectSink {
    chunks: Vec<usize>,
    samples: Vec<f32>,
}

impl SamplesSink for CollectSink {
    fn on_samples(&mut self, samples: &[f32]) -> Result<()> {
        self.chunks.push(samples.len());
        self.samples.extend_from_slice(samples);
        Ok(())
    }
}

struct FailingSink;

impl SamplesSink for FailingSink {
    fn on_samples(&mut self, _samples: &[f32]) -> Result<()> {
        bail!("disk full")
    }
}

fn write_stereo_tone(path: &Path, sample_rate: u32, seconds: f32) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    let frames = (sample_rate as f32 * seconds) as usize;
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let v = ((t * 440.0 * std::f32::consts::TAU).sin() * 8_000.0) as i16;
        writer.write_sample(v)?;
        writer.write_sample(v)?;
    }
    writer.finalize()?;
    Ok(())
}

#[test]
fn decodes_file_to_fixed_chunks_at_target_rate() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tone.wav");
    write_stereo_tone(&path, 44_100, 1.0)?;

    let opts = DecodeOpts {
        target_chunk_frames: 1_000,
        ..DecodeOpts::default()
    };
    let mut sink = CollectSink::default();
    decode_file(&path, opts, &mut sink)?;

    // Resampled output is trimmed to the source duration.
    assert_eq!(sink.samples.len(), 16_000);
    assert_eq!(sink.chunks, vec![1_000; 16]);
    assert!(sink.samples.iter().all(|s| s.is_finite()));
    Ok(())
}

#[test]
fn sink_errors_abort_decoding() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("tone.wav");
    write_stereo_tone(&path, 16_000, 0.5)?;

    let err = decode_file(&path, DecodeOpts::default(), &mut FailingSink).unwrap_err();
    assert!(format!("{err:#}").contains("disk full"));
    Ok(())
}

#[test]
fn missing_file_is_an_error() {
    let res = decode_file(
        Path::new("/definitely/not/here.wav"),
        DecodeOpts::default(),
        &mut CollectSink::default(),
    );
    assert!(res.is_err());
}
