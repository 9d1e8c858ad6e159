use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::sync::Once;

/// Forward whisper.cpp's native log lines to `tracing` at trace level.
///
/// whisper.cpp prints a lot during model load and inference; routing it through `tracing`
/// keeps stdout/stderr under the caller's control while leaving it reachable with
/// `TRANSCRIBER_LOG=whisper_cpp=trace`.
unsafe extern "C" fn whisper_log_callback(
    _level: u32,
    c_msg: *const c_char,
    _user_data: *mut c_void,
) {
    if c_msg.is_null() {
        return;
    }

    // SAFETY: whisper.cpp hands us a NUL-terminated string that lives for the callback.
    let msg = unsafe { CStr::from_ptr(c_msg) }.to_string_lossy();
    let msg = msg.trim_end();
    if !msg.is_empty() {
        tracing::trace!(target: "whisper_cpp", "{msg}");
    }
}

/// Install the whisper.cpp log hook exactly once for the lifetime of the process.
pub fn init_whisper_logging() {
    static INIT: Once = Once::new();

    INIT.call_once(|| unsafe {
        whisper_rs::set_log_callback(Some(whisper_log_callback), std::ptr::null_mut());
    });
}
