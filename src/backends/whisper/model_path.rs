//! Mapping a [`ModelKey`] onto whisper.cpp concepts: a ggml model file and a GPU selection.
//!
//! whisper.cpp bakes numeric precision into the model file, so the compute type picks which
//! quantization of a model to load rather than a runtime setting.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};

use crate::model_cache::ModelKey;

/// Where the model should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DeviceSelection {
    pub use_gpu: bool,
    pub gpu_device: i32,
}

/// Parse a device selector such as `cpu`, `cuda` or `cuda:1`.
pub(crate) fn parse_device(device: &str) -> Result<DeviceSelection> {
    let device = device.trim().to_ascii_lowercase();

    let (kind, index) = match device.split_once(':') {
        Some((kind, index)) => {
            let Ok(index) = index.parse::<i32>() else {
                bail!("invalid device index in '{device}'");
            };
            if index < 0 {
                bail!("invalid device index in '{device}'");
            }
            (kind.to_owned(), Some(index))
        }
        None => (device.clone(), None),
    };

    match (kind.as_str(), index) {
        ("cpu", None) => Ok(DeviceSelection {
            use_gpu: false,
            gpu_device: 0,
        }),
        ("cuda" | "gpu", index) => Ok(DeviceSelection {
            use_gpu: true,
            gpu_device: index.unwrap_or(0),
        }),
        ("metal" | "vulkan" | "auto", None) => Ok(DeviceSelection {
            use_gpu: true,
            gpu_device: 0,
        }),
        _ => bail!("unsupported device '{device}' (expected cpu, cuda, cuda:N, gpu, metal, vulkan or auto)"),
    }
}

/// File-name suffix for the quantized variant matching `compute_type`, if any.
pub(crate) fn quantization_suffix(compute_type: &str) -> Result<Option<&'static str>> {
    match compute_type.trim().to_ascii_lowercase().as_str() {
        "int8" | "int8_float16" | "int8_float32" | "int8_bfloat16" => Ok(Some("q8_0")),
        "float16" | "float32" | "bfloat16" | "default" | "auto" => Ok(None),
        other => bail!("unsupported compute type '{other}'"),
    }
}

/// Resolve the model file for `key`.
///
/// Resolution order:
/// - `model_name` itself, when it points at an existing file
/// - `<models_dir>/ggml-<name>-<quant>.bin` when the compute type selects a quantization
/// - `<models_dir>/ggml-<name>.bin`
pub(crate) fn resolve_model_path(models_dir: &Path, key: &ModelKey) -> Result<PathBuf> {
    let suffix = quantization_suffix(&key.compute_type)?;

    let direct = Path::new(&key.model_name);
    if direct.is_file() {
        return Ok(direct.to_path_buf());
    }

    let mut candidates = Vec::with_capacity(2);
    if let Some(suffix) = suffix {
        candidates.push(models_dir.join(format!("ggml-{}-{suffix}.bin", key.model_name)));
    }
    candidates.push(models_dir.join(format!("ggml-{}.bin", key.model_name)));

    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        return Ok(found.clone());
    }

    let tried = candidates
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ");
    bail!("model '{}' not found (tried {tried})", key.model_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_devices() -> anyhow::Result<()> {
        assert_eq!(
            parse_device("cpu")?,
            DeviceSelection {
                use_gpu: false,
                gpu_device: 0
            }
        );
        assert_eq!(
            parse_device("CUDA")?,
            DeviceSelection {
                use_gpu: true,
                gpu_device: 0
            }
        );
        assert_eq!(parse_device("cuda:2")?.gpu_device, 2);
        assert!(parse_device("metal")?.use_gpu);
        Ok(())
    }

    #[test]
    fn rejects_unknown_devices() {
        assert!(parse_device("tpu").is_err());
        assert!(parse_device("cuda:x").is_err());
        assert!(parse_device("cuda:-1").is_err());
        assert!(parse_device("cpu:1").is_err());
    }

    #[test]
    fn maps_compute_types() -> anyhow::Result<()> {
        assert_eq!(quantization_suffix("int8")?, Some("q8_0"));
        assert_eq!(quantization_suffix("int8_float16")?, Some("q8_0"));
        assert_eq!(quantization_suffix("float16")?, None);
        assert!(quantization_suffix("int4").is_err());
        Ok(())
    }

    #[test]
    fn prefers_quantized_file_when_present() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("ggml-small.bin"), b"base")?;
        std::fs::write(dir.path().join("ggml-small-q8_0.bin"), b"q8")?;

        let quant = resolve_model_path(dir.path(), &ModelKey::cpu_fallback("small"))?;
        assert!(quant.ends_with("ggml-small-q8_0.bin"));

        let base = resolve_model_path(dir.path(), &ModelKey::new("small", "cuda", "float16"))?;
        assert!(base.ends_with("ggml-small.bin"));
        Ok(())
    }

    #[test]
    fn quantized_request_falls_back_to_base_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("ggml-tiny.bin"), b"base")?;

        let path = resolve_model_path(dir.path(), &ModelKey::cpu_fallback("tiny"))?;
        assert!(path.ends_with("ggml-tiny.bin"));
        Ok(())
    }

    #[test]
    fn explicit_file_path_is_used_directly() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let file = dir.path().join("custom.bin");
        std::fs::write(&file, b"model")?;

        let key = ModelKey::new(file.to_string_lossy(), "cpu", "float32");
        assert_eq!(resolve_model_path(Path::new("/nonexistent"), &key)?, file);
        Ok(())
    }

    #[test]
    fn missing_model_lists_candidates() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let err = resolve_model_path(dir.path(), &ModelKey::cpu_fallback("base")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ggml-base-q8_0.bin"));
        assert!(msg.contains("ggml-base.bin"));
        Ok(())
    }
}
