//! Preference store backed by a JSON file.
//!
//! The whole file is a flat object of string values. It is read once when
//! opened and rewritten on every save; the panel only saves on user action
//! (ready selection, mute switches), so writes are rare.

use crate::{HardwareError, Result, traits::PreferenceStore};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// JSON file preference store.
#[derive(Debug)]
pub struct JsonFilePreferences {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFilePreferences {
    /// Open the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    /// Returns `HardwareError::Io` if the file exists but cannot be read, or
    /// `HardwareError::CorruptStore` if it is not a JSON object of strings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                HardwareError::corrupt_store(path.display().to_string(), e.to_string())
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), entries = values.len(), "Preferences loaded");
        Ok(Self { path, values })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let text = serde_json::to_string_pretty(&self.values).map_err(|e| {
            HardwareError::corrupt_store(self.path.display().to_string(), e.to_string())
        })?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl PreferenceStore for JsonFilePreferences {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        if self.values.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        self.values.insert(key.to_string(), value.to_string());
        debug!(key, value, "Saving preference");
        self.flush()
    }
}
