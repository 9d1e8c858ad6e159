//! Subtitle timecode formatting.

/// Format seconds into an SRT timestamp (`HH:MM:SS,mmm`).
///
/// Rounding policy:
/// - We round the *total* to the nearest millisecond before splitting into fields, so a
///   fractional part that rounds up to 1000 ms carries into seconds (and onwards into minutes
///   and hours) instead of producing a four-digit millisecond field.
/// - Negative and NaN inputs clamp to zero.
/// - Hours are not wrapped; multi-day offsets simply widen the hour field.
pub fn format_timestamp_srt(seconds: f64) -> String {
    let seconds = if seconds.is_nan() || seconds < 0.0 {
        0.0
    } else {
        seconds
    };

    let total_ms = (seconds * 1000.0).round() as u64;

    let ms = total_ms % 1000;
    let total_s = total_ms / 1000;

    let s = total_s % 60;
    let total_m = total_s / 60;

    let m = total_m % 60;
    let h = total_m / 60;

    format!("{h:02}:{m:02}:{s:02},{ms:03}")
}
