//! In-memory preference store.

use crate::{Result, traits::PreferenceStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Preference store kept in memory. Clones share the same map, so a test
/// can keep one clone and hand the other to the panel.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `values`.
    pub fn with_values<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self {
            values: Arc::new(Mutex::new(map)),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.get(key))
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_values() {
        let observer = MemoryPreferences::with_values([("ready.selection", "armed_home")]);
        let mut store = observer.clone();

        assert_eq!(
            store.load("ready.selection").unwrap().as_deref(),
            Some("armed_home")
        );
        store.save("buzzer.tone_muted", "true").unwrap();
        assert_eq!(observer.get("buzzer.tone_muted").as_deref(), Some("true"));
        assert_eq!(store.load("missing").unwrap(), None);
    }
}
