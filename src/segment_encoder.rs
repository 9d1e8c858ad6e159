use anyhow::Result;

use crate::segments::Segment;

/// Streaming writer for retained segments in some export format.
pub trait SegmentEncoder {
    fn write_segment(&mut self, seg: &Segment) -> Result<()>;

    /// Flush buffered output. Writing after `close` is an error.
    fn close(&mut self) -> Result<()>;

    /// Write every segment in order, then close.
    fn encode_all(&mut self, segments: &[Segment]) -> Result<()> {
        for seg in segments {
            self.write_segment(seg)?;
        }
        self.close()
    }
}
