//! Armed mode whose readiness the keypad shows.
//!
//! The selection is restored from the preference store when allowed and
//! valid, otherwise it falls back to the configured initial option and then
//! to the first option. Every change the user makes is saved.

use hexapad_core::{ArmedMode, Error, Result, config::ReadyConfig};
use hexapad_hardware::PreferenceStore;
use tracing::{debug, info, warn};

/// Preference key holding the selected option.
pub const READY_SELECTION_KEY: &str = "ready.selection";

#[derive(Debug, Clone)]
pub struct ReadySelector {
    options: Vec<(String, ArmedMode)>,
    selected: usize,
}

impl ReadySelector {
    /// # Errors
    /// Returns a configuration error when there are no options or an option
    /// is not an armed state.
    pub fn new(config: &ReadyConfig, store: &dyn PreferenceStore) -> Result<Self> {
        let options = config
            .options
            .iter()
            .map(|option| {
                let option = option.trim().to_ascii_lowercase();
                ArmedMode::from_armed_state(&option)
                    .map(|mode| (option.clone(), mode))
                    .ok_or_else(|| {
                        Error::config("ready.options", format!("'{option}' is not an armed state"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        if options.is_empty() {
            return Err(Error::config("ready.options", "at least one option is required"));
        }

        let find = |value: &str| {
            let value = value.trim().to_ascii_lowercase();
            options.iter().position(|(name, _)| *name == value)
        };

        let restored = if config.restore {
            match store.load(READY_SELECTION_KEY) {
                Ok(value) => value.as_deref().and_then(find),
                Err(e) => {
                    warn!(error = %e, "Could not read stored ready selection");
                    None
                }
            }
        } else {
            None
        };

        let selected = restored
            .or_else(|| config.initial_option.as_deref().and_then(find))
            .unwrap_or(0);
        debug!(
            selected = %options[selected].0,
            restored = restored.is_some(),
            "Ready selection initialised"
        );

        Ok(Self { options, selected })
    }

    pub fn selected(&self) -> ArmedMode {
        self.options[self.selected].1
    }

    /// Option text of the selection (`armed_home`, ...).
    pub fn selected_option(&self) -> &str {
        &self.options[self.selected].0
    }

    pub fn options(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|(name, _)| name.as_str())
    }

    /// Select `option` and persist it.
    ///
    /// Returns `Ok(false)` when `option` is already selected. A failed save
    /// is logged and does not undo the selection.
    ///
    /// # Errors
    /// Returns a configuration error when `option` is not one of the
    /// options.
    pub fn select(&mut self, option: &str, store: &mut dyn PreferenceStore) -> Result<bool> {
        let value = option.trim().to_ascii_lowercase();
        let index = self
            .options
            .iter()
            .position(|(name, _)| *name == value)
            .ok_or_else(|| Error::config("ready.selection", format!("'{option}' is not an option")))?;
        if index == self.selected {
            return Ok(false);
        }

        self.selected = index;
        info!(selected = %value, "Ready selection changed");
        if let Err(e) = store.save(READY_SELECTION_KEY, &value) {
            warn!(error = %e, "Could not save ready selection");
        }
        Ok(true)
    }
}
