//! Metadata export: the full transcript as a JSON document.
//!
//! Layout (key order is stable):
//! ```json
//! {
//!   "language": "en",
//!   "duration": 3.0,
//!   "segments": [
//!     { "start": 0.0, "end": 1.5, "text": "Hello", "lang": "en", "avg_logprob": null, "no_speech_prob": null }
//!   ]
//! }
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::segments::TranscriptionResult;

/// Render the metadata document as a pretty-printed JSON string.
///
/// Non-ASCII text is written as-is (no `\u` escaping).
pub fn to_json_string(result: &TranscriptionResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize transcription result")
}

/// Write the metadata document for `result` to `path`, creating parent directories as needed.
pub fn write_metadata(result: &TranscriptionResult, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }

    let file = File::create(path)
        .with_context(|| format!("failed to create metadata file '{}'", path.display()))?;
    let mut w = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut w, result)
        .context("failed to serialize transcription result")?;
    w.flush()?;

    Ok(())
}
