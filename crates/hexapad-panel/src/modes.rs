//! Named-mode state machine with ordered trigger lists.
//!
//! A [`ModeMachine`] holds a fixed set of modes declared once at build time.
//! Each mode owns an ordered list of triggers; switching to a mode runs the
//! machine-wide transition triggers first, then every trigger of the new mode
//! in registration order. Triggers receive a mutable context `C`, which lets
//! the same machine drive LEDs and the buzzer without owning them.
//!
//! Mode names are case-insensitive and stored lowercase.
//!
//! # Examples
//!
//! ```
//! use hexapad_panel::modes::ModeMachine;
//!
//! let mut machine = ModeMachine::<Vec<&'static str>>::builder("test")
//!     .mode("mode1")
//!     .mode("mode2")
//!     .trigger("mode2", |log| log.push("first"))
//!     .trigger("mode2", |log| log.push("second"))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(machine.current_mode(), "mode1");
//!
//! let mut log = Vec::new();
//! assert!(machine.set_mode("Mode2", &mut log).unwrap());
//! assert_eq!(log, ["first", "second"]);
//! ```

use hexapad_core::{Error, Result};
use tracing::{debug, info};

/// Callback run when a mode is entered.
pub type Trigger<C> = Box<dyn FnMut(&mut C) + Send>;

struct Mode<C> {
    name: String,
    triggers: Vec<Trigger<C>>,
}

/// State machine over a fixed set of named modes.
pub struct ModeMachine<C> {
    label: String,
    modes: Vec<Mode<C>>,
    current: usize,
    on_transition: Vec<Trigger<C>>,
}

impl<C> ModeMachine<C> {
    /// Start building a machine. `label` only appears in logs.
    pub fn builder(label: impl Into<String>) -> ModeMachineBuilder<C> {
        ModeMachineBuilder {
            label: label.into(),
            modes: Vec::new(),
            initial: None,
            on_transition: Vec::new(),
            error: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Name of the current mode.
    pub fn current_mode(&self) -> &str {
        &self.modes[self.current].name
    }

    /// Declared mode names in declaration order.
    pub fn modes(&self) -> impl Iterator<Item = &str> {
        self.modes.iter().map(|m| m.name.as_str())
    }

    pub fn has_mode(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Switch to `name` and run its triggers.
    ///
    /// Returns `Ok(false)` without running anything when `name` is already
    /// the current mode.
    ///
    /// # Errors
    /// Returns `Error::UnknownMode` if `name` was never declared. The
    /// current mode is left unchanged.
    pub fn set_mode(&mut self, name: &str, ctx: &mut C) -> Result<bool> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::UnknownMode(name.to_string()))?;
        if index == self.current {
            debug!(machine = %self.label, mode = %self.modes[index].name, "Mode unchanged");
            return Ok(false);
        }
        self.switch(index, ctx);
        Ok(true)
    }

    /// Enter `name` and run its triggers even if it is already current.
    ///
    /// # Errors
    /// Returns `Error::UnknownMode` if `name` was never declared.
    pub fn enter(&mut self, name: &str, ctx: &mut C) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::UnknownMode(name.to_string()))?;
        self.switch(index, ctx);
        Ok(())
    }

    fn switch(&mut self, index: usize, ctx: &mut C) {
        for trigger in &mut self.on_transition {
            trigger(ctx);
        }

        let previous = self.current;
        self.current = index;
        info!(
            machine = %self.label,
            from = %self.modes[previous].name,
            to = %self.modes[index].name,
            "Mode changed"
        );

        for trigger in &mut self.modes[index].triggers {
            trigger(ctx);
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name = normalize(name);
        self.modes.iter().position(|m| m.name == name)
    }
}

impl<C> std::fmt::Debug for ModeMachine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeMachine")
            .field("label", &self.label)
            .field("modes", &self.modes().collect::<Vec<_>>())
            .field("current", &self.current_mode())
            .finish()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

/// Builder for [`ModeMachine`].
///
/// Errors found while adding modes or triggers are kept and reported by
/// [`ModeMachineBuilder::build`], so calls can be chained freely.
pub struct ModeMachineBuilder<C> {
    label: String,
    modes: Vec<Mode<C>>,
    initial: Option<String>,
    on_transition: Vec<Trigger<C>>,
    error: Option<Error>,
}

impl<C> ModeMachineBuilder<C> {
    /// Declare a mode. Declaration order decides the default initial mode.
    pub fn mode(mut self, name: &str) -> Self {
        let name = normalize(name);
        if self.error.is_none() {
            if name.is_empty() {
                self.error = Some(Error::config("modes", "mode name is empty"));
            } else if self.modes.iter().any(|m| m.name == name) {
                self.error = Some(Error::DuplicateMode(name));
            } else {
                self.modes.push(Mode {
                    name,
                    triggers: Vec::new(),
                });
            }
        }
        self
    }

    /// Append a trigger to an already declared mode.
    pub fn trigger<F>(self, mode: &str, trigger: F) -> Self
    where
        F: FnMut(&mut C) + Send + 'static,
    {
        self.boxed_trigger(mode, Box::new(trigger))
    }

    pub fn boxed_trigger(mut self, mode: &str, trigger: Trigger<C>) -> Self {
        let name = normalize(mode);
        match self.modes.iter_mut().find(|m| m.name == name) {
            Some(mode) => mode.triggers.push(trigger),
            None => {
                self.error.get_or_insert(Error::UnknownMode(name));
            }
        }
        self
    }

    /// Trigger run before every mode change, ahead of the new mode's own.
    pub fn on_transition<F>(self, trigger: F) -> Self
    where
        F: FnMut(&mut C) + Send + 'static,
    {
        self.boxed_on_transition(Box::new(trigger))
    }

    pub fn boxed_on_transition(mut self, trigger: Trigger<C>) -> Self {
        self.on_transition.push(trigger);
        self
    }

    /// Mode the machine starts in instead of the first declared one.
    pub fn initial(mut self, name: &str) -> Self {
        self.initial = Some(normalize(name));
        self
    }

    /// # Errors
    /// Returns the first declaration error, `Error::UnknownMode` for an
    /// undeclared initial mode, or a configuration error when no mode was
    /// declared.
    pub fn build(self) -> Result<ModeMachine<C>> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.modes.is_empty() {
            return Err(Error::config("modes", "at least one mode is required"));
        }
        let current = match &self.initial {
            Some(name) => self
                .modes
                .iter()
                .position(|m| &m.name == name)
                .ok_or_else(|| Error::UnknownMode(name.clone()))?,
            None => 0,
        };
        debug!(machine = %self.label, modes = self.modes.len(), initial = %self.modes[current].name, "Mode machine built");
        Ok(ModeMachine {
            label: self.label,
            modes: self.modes,
            current,
            on_transition: self.on_transition,
        })
    }
}
