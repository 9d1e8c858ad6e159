//! Single-slot cache for a loaded recognition model.
//!
//! Loading a model is expensive, so we keep the most recently loaded one around and hand out
//! shared handles to it while callers keep asking for the same key. Asking for a different key
//! evicts the resident model unconditionally; this is deliberately not an LRU.
//!
//! The cache is an ordinary value owned by the caller (typically next to the `Transcriber`)
//! rather than process-global state. The check-load-swap sequence runs under a mutex, so
//! concurrent runs are serialized instead of racing on the slot. A run keeps its own `Arc` to
//! the handle, so an eviction never pulls a model out from under an in-flight recognition.
//!
//! The slot is only ever replaced whole, so a loader that panics leaves it holding the
//! previous model. A poisoned mutex is therefore recovered rather than reported.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;

/// Identity of a loaded model: which model, on which device, at which precision.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub model_name: String,
    pub device: String,
    pub compute_type: String,
}

impl ModelKey {
    pub const FALLBACK_DEVICE: &'static str = "cpu";
    pub const FALLBACK_COMPUTE_TYPE: &'static str = "int8";

    pub fn new(
        model_name: impl Into<String>,
        device: impl Into<String>,
        compute_type: impl Into<String>,
    ) -> Self {
        Self {
            model_name: model_name.into(),
            device: device.into(),
            compute_type: compute_type.into(),
        }
    }

    /// The fixed key used when loading with the requested device/precision fails.
    pub fn cpu_fallback(model_name: impl Into<String>) -> Self {
        Self::new(
            model_name,
            Self::FALLBACK_DEVICE,
            Self::FALLBACK_COMPUTE_TYPE,
        )
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} ({})",
            self.model_name, self.device, self.compute_type
        )
    }
}

struct Resident<M> {
    key: ModelKey,
    model: Arc<M>,
}

/// Holds at most one loaded model at a time.
pub struct ModelCache<M> {
    slot: Mutex<Option<Resident<M>>>,
}

impl<M> Default for ModelCache<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> ModelCache<M> {
    /// Create an empty cache. Nothing is loaded until the first `get_or_load`.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Return the resident model if it was loaded with `key`, otherwise load it with `load`.
    ///
    /// On a successful load the previous model (if any) is dropped from the cache and the new
    /// one becomes resident. On failure the error is returned as-is and the slot is left
    /// untouched; retry and fallback policy belong to the caller.
    pub fn get_or_load<F>(&self, key: &ModelKey, load: F) -> Result<Arc<M>>
    where
        F: FnOnce(&ModelKey) -> Result<M>,
    {
        let mut slot = self.lock();

        if let Some(resident) = slot.as_ref() {
            if resident.key == *key {
                return Ok(Arc::clone(&resident.model));
            }
        }

        let model = Arc::new(load(key)?);
        *slot = Some(Resident {
            key: key.clone(),
            model: Arc::clone(&model),
        });

        Ok(model)
    }

    /// Key of the resident model, if one is loaded.
    pub fn resident_key(&self) -> Option<ModelKey> {
        self.lock().as_ref().map(|r| r.key.clone())
    }

    /// Whether no model is currently resident.
    pub fn is_empty(&self) -> bool {
        self.resident_key().is_none()
    }

    /// Drop the resident model so the next `get_or_load` loads afresh.
    pub fn invalidate(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<Resident<M>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
