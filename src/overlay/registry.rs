use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::error::OverlayError;

use super::ramp::ColorRamp;

/// Active colormap per viewed slide.
///
/// Keys are slide paths as the viewer requests them, ignoring any leading
/// `/`. Readers never block each other; `set` and `clear` are idempotent.
#[derive(Debug, Default)]
pub struct ColormapRegistry {
    ramps: RwLock<HashMap<String, ColorRamp>>,
}

fn registry_key(path: &str) -> &str {
    path.trim_start_matches('/')
}

impl ColormapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ColorRamp>> {
        self.ramps
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ColorRamp>> {
        self.ramps
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make `ramp` the active colormap for `path`.
    pub fn set(&self, path: &str, ramp: ColorRamp) {
        debug!("Setting colormap for {}: {}", path, ramp);
        self.write().insert(registry_key(path).to_string(), ramp);
    }

    /// Remove the colormap for `path`. Returns `true` if one was active.
    pub fn clear(&self, path: &str) -> bool {
        let removed = self.write().remove(registry_key(path)).is_some();
        if removed {
            debug!("Cleared colormap for {}", path);
        }
        removed
    }

    /// Active colormap for `path`.
    pub fn get(&self, path: &str) -> Option<ColorRamp> {
        self.read().get(registry_key(path)).cloned()
    }

    /// Apply a viewer `cmap` request parameter.
    ///
    /// A non-empty parameter is parsed and set; an absent or empty one
    /// clears. On a parse error the registry is left unchanged.
    pub fn load(&self, path: &str, param: Option<&str>) -> Result<(), OverlayError> {
        match param.map(str::trim).filter(|p| !p.is_empty()) {
            Some(param) => {
                let ramp = param.parse::<ColorRamp>()?;
                self.set(path, ramp);
            }
            None => {
                self.clear(path);
            }
        }
        Ok(())
    }

    /// Number of slides with an active colormap.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
