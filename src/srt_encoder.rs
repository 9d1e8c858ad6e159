use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::segment_encoder::SegmentEncoder;
use crate::segments::Segment;
use crate::timecode::format_timestamp_srt;

/// A `SegmentEncoder` that writes segments in SubRip (SRT) format.
///
/// Design:
/// - We stream output directly to a `Write` implementation.
/// - Cue indices are 1-based and only advance for segments we actually emit, so blank
///   segments never leave gaps in the numbering.
/// - There is no header; an encoder that never sees a segment writes nothing at all.
pub struct SrtEncoder<W: Write> {
    /// The underlying writer we stream SRT into.
    w: W,

    /// Number of cues written so far (also the index of the last cue).
    written: usize,

    /// Whether the encoder has been closed.
    closed: bool,
}

impl<W: Write> SrtEncoder<W> {
    /// Create a new SRT encoder that writes to the provided writer.
    pub fn new(w: W) -> Self {
        Self {
            w,
            written: 0,
            closed: false,
        }
    }

    /// Number of cues emitted so far.
    pub fn written(&self) -> usize {
        self.written
    }
}

impl<W: Write> SegmentEncoder for SrtEncoder<W> {
    /// Write a single cue in SRT format. Segments with blank text are skipped.
    fn write_segment(&mut self, seg: &Segment) -> Result<()> {
        if self.closed {
            anyhow::bail!("cannot write segment: encoder is already closed");
        }

        let text = seg.text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let index = self.written + 1;
        let start = format_timestamp_srt(seg.start);
        let end = format_timestamp_srt(seg.end);

        writeln!(&mut self.w, "{index}")?;
        writeln!(&mut self.w, "{start} --> {end}")?;
        writeln!(&mut self.w, "{text}")?;

        // Blank line separates cues.
        writeln!(&mut self.w)?;

        self.written = index;
        Ok(())
    }

    /// Flush the underlying writer. This is idempotent.
    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }

        self.w.flush()?;
        self.closed = true;

        Ok(())
    }
}

/// Write `segments` as an SRT file at `path`, creating parent directories as needed.
///
/// Returns the number of cues written.
pub fn write_srt(segments: &[Segment], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }

    let file = File::create(path)
        .with_context(|| format!("failed to create subtitle file '{}'", path.display()))?;

    let mut encoder = SrtEncoder::new(BufWriter::new(file));
    encoder.encode_all(segments)?;

    Ok(encoder.written())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(start: f64, end: f64, text: &str) -> Segment {
        Segment {
            start,
            end,
            text: text.to_string(),
            lang: "en".to_string(),
            avg_logprob: None,
            no_speech_prob: None,
        }
    }

    #[test]
    fn srt_close_without_segments_emits_nothing() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = SrtEncoder::new(&mut out);
        enc.close()?;
        assert_eq!(enc.written(), 0);
        assert_eq!(std::str::from_utf8(&out)?, "");
        Ok(())
    }

    #[test]
    fn srt_formats_numbered_cues() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = SrtEncoder::new(&mut out);

        enc.write_segment(&seg(0.0, 1.5, "Hello"))?;
        enc.write_segment(&seg(1.5, 3.0, "World"))?;
        enc.close()?;

        assert_eq!(
            std::str::from_utf8(&out)?,
            "1\n00:00:00,000 --> 00:00:01,500\nHello\n\n2\n00:00:01,500 --> 00:00:03,000\nWorld\n\n"
        );
        Ok(())
    }

    #[test]
    fn srt_skips_blank_segments_without_gaps_in_numbering() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = SrtEncoder::new(&mut out);

        enc.write_segment(&seg(0.0, 1.0, "first"))?;
        enc.write_segment(&seg(1.0, 2.0, "   "))?;
        enc.write_segment(&seg(2.0, 3.0, ""))?;
        enc.write_segment(&seg(3.0, 4.0, "  second  "))?;
        enc.close()?;

        assert_eq!(enc.written(), 2);
        let s = std::str::from_utf8(&out)?;
        assert!(s.contains("2\n00:00:03,000 --> 00:00:04,000\nsecond\n\n"));
        assert!(!s.contains("3\n"));
        Ok(())
    }

    #[test]
    fn srt_write_after_close_errors() -> anyhow::Result<()> {
        let mut out = Vec::new();
        let mut enc = SrtEncoder::new(&mut out);
        enc.close()?;
        let err = enc.write_segment(&seg(0.0, 1.0, "nope")).unwrap_err();
        assert!(err.to_string().contains("already closed"));
        Ok(())
    }

    #[test]
    fn write_srt_creates_parent_and_returns_count() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/deeper/out.srt");

        let count = write_srt(&[seg(0.0, 1.0, "a"), seg(1.0, 2.0, "b")], &path)?;
        assert_eq!(count, 2);

        let bytes = std::fs::read(&path)?;
        assert!(!bytes.starts_with(&[0xEF, 0xBB, 0xBF]));
        assert!(std::str::from_utf8(&bytes)?.starts_with("1\n00:00:00,000 --> 00:00:01,000\na\n\n"));
        Ok(())
    }

    #[test]
    fn write_srt_with_no_segments_creates_empty_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("empty.srt");

        assert_eq!(write_srt(&[], &path)?, 0);
        assert_eq!(std::fs::read(&path)?.len(), 0);
        Ok(())
    }

    #[test]
    fn write_srt_fails_when_parent_is_a_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"x")?;

        let res = write_srt(&[seg(0.0, 1.0, "a")], &blocker.join("out.srt"));
        assert!(res.is_err());
        Ok(())
    }
}
