use std::path::Path;

use anyhow::{Context, Result};
use whisper_rs::{WhisperContext, WhisperContextParameters};

use super::logging::init_whisper_logging;
use super::model_path::DeviceSelection;

/// Load a whisper.cpp model file onto the selected device.
pub(super) fn load_context(model_path: &Path, device: DeviceSelection) -> Result<WhisperContext> {
    init_whisper_logging();

    let path = model_path
        .to_str()
        .with_context(|| format!("model path is not valid UTF-8: {}", model_path.display()))?;

    let ctx_params = WhisperContextParameters {
        use_gpu: device.use_gpu,
        gpu_device: device.gpu_device,
        ..Default::default()
    };

    WhisperContext::new_with_params(path, ctx_params)
        .with_context(|| format!("failed to load model from path: {path}"))
}
