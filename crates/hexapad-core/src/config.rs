//! Declarative panel configuration.
//!
//! The whole configuration is one serde tree rooted at [`PanelConfig`].
//! Every section has defaults, so an empty JSON object is a valid
//! configuration for a strip-less keypad. [`PanelConfig::validate`] must
//! pass before anything is built from the configuration; the panel never
//! starts with an invalid tree.
//!
//! # Example
//!
//! ```
//! use hexapad_core::config::PanelConfig;
//!
//! let json = r#"{
//!     "strip": {
//!         "led_count": 10,
//!         "groups": [{ "name": "front", "leds": [0, 1, 2], "max_brightness": 0.5 }]
//!     },
//!     "status": {
//!         "reactions": {
//!             "disarmed": [{ "action": "set_color", "group": "front", "color": { "green": 1.0 } }]
//!         }
//!     }
//! }"#;
//!
//! let config: PanelConfig = serde_json::from_str(json).unwrap();
//! config.validate().unwrap();
//! assert_eq!(config.entry.force_prefix, "999");
//! ```

use crate::{
    AlarmMode, ArmedMode, BuzzerPattern, ColorChannel, DynamicMode, Result, Rgb,
    constants::{
        DEFAULT_CONNECTION_GRACE_MS, DEFAULT_FAILED_OPEN_SENSORS_TIMEOUT_MS, DEFAULT_FORCE_PREFIX,
        DEFAULT_GAMMA, DEFAULT_INCORRECT_PIN_TIMEOUT_MS, DEFAULT_KEY_BEEP_MS,
        DEFAULT_MAX_ENTRY_LENGTH, DEFAULT_SKIP_DELAY_PREFIX, MAX_ENTRY_DIGITS, MAX_LED_COUNT,
        MAX_PREFIX_DIGITS,
    },
    error::Error,
    types::AlarmStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Names of the entry feedback events that can carry reactions.
pub const FEEDBACK_KEYS: [&str; 7] = [
    "accepted",
    "rejected",
    "timeout",
    "configuration_error",
    "suppressed",
    "lockout_started",
    "lockout_ended",
];

/// Root of the panel configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    pub entry: EntryConfig,
    pub timeouts: TimeoutConfig,
    pub strip: StripConfig,
    pub buzzer: BuzzerConfig,
    pub status: StatusConfig,
    pub ready: ReadyConfig,
    pub indicators: IndicatorConfig,
    /// Reactions keyed by entry feedback name (see [`FEEDBACK_KEYS`]).
    pub feedback: BTreeMap<String, Vec<TriggerAction>>,
    /// Free-standing mode machine for driving feedback without a controller.
    pub test_modes: Option<ModeConfig>,
}

/// PIN entry and prefix handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Digits that mark a forced arm. Empty disables the prefix.
    pub force_prefix: String,
    /// Digits that skip the exit delay. Empty disables the prefix.
    pub skip_delay_prefix: String,
    pub allow_combined_prefixes: bool,
    /// Longest accepted entry in digits, prefixes included.
    pub max_entry_length: usize,
    /// Mode submitted by the Enter key.
    pub default_mode: AlarmMode,
    /// Resolution of the dynamic arm-select key.
    pub dynamic_mode: DynamicMode,
    /// Modes forwarded to the controller. Entries resolving to any other
    /// mode are dropped with a configuration-error feedback.
    pub enabled_modes: Vec<AlarmMode>,
    /// Forward custom-action entries to the controller.
    pub custom_action: bool,
}

impl Default for EntryConfig {
    fn default() -> Self {
        EntryConfig {
            force_prefix: DEFAULT_FORCE_PREFIX.to_string(),
            skip_delay_prefix: DEFAULT_SKIP_DELAY_PREFIX.to_string(),
            allow_combined_prefixes: true,
            max_entry_length: DEFAULT_MAX_ENTRY_LENGTH,
            default_mode: AlarmMode::Away,
            dynamic_mode: DynamicMode::default(),
            enabled_modes: AlarmMode::ALL.to_vec(),
            custom_action: false,
        }
    }
}

/// Timers, all in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub incorrect_pin_ms: u64,
    pub failed_open_sensors_ms: u64,
    pub connection_grace_ms: u64,
    /// Pin mode mutes the buzzer after key activity. `None` disables it.
    pub pinmode_ms: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        TimeoutConfig {
            incorrect_pin_ms: DEFAULT_INCORRECT_PIN_TIMEOUT_MS,
            failed_open_sensors_ms: DEFAULT_FAILED_OPEN_SENSORS_TIMEOUT_MS,
            connection_grace_ms: DEFAULT_CONNECTION_GRACE_MS,
            pinmode_ms: None,
        }
    }
}

/// LED strip, groups and per-channel outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StripConfig {
    pub led_count: usize,
    pub global_brightness: f32,
    pub gamma_enabled: bool,
    pub gamma: f32,
    pub groups: Vec<LedGroupConfig>,
    pub outputs: Vec<ChannelOutputConfig>,
}

impl Default for StripConfig {
    fn default() -> Self {
        StripConfig {
            led_count: 0,
            global_brightness: 1.0,
            gamma_enabled: false,
            gamma: DEFAULT_GAMMA,
            groups: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

/// Named set of zero-based LED indices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedGroupConfig {
    pub name: String,
    pub leds: Vec<usize>,
    #[serde(default = "default_max_brightness")]
    pub max_brightness: f32,
}

fn default_max_brightness() -> f32 {
    1.0
}

/// Float output bound to one color channel of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOutputConfig {
    pub id: String,
    pub group: String,
    pub channel: ColorChannel,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuzzerConfig {
    pub key_beep: bool,
    pub key_beep_ms: u64,
    pub key_beep_tone: u8,
    /// Initial tone mute state when no stored value exists.
    pub tone_muted: bool,
    /// Initial key beep mute state when no stored value exists.
    pub beep_muted: bool,
}

impl Default for BuzzerConfig {
    fn default() -> Self {
        BuzzerConfig {
            key_beep: true,
            key_beep_ms: DEFAULT_KEY_BEEP_MS,
            key_beep_tone: u8::MAX,
            tone_muted: false,
            beep_muted: false,
        }
    }
}

/// How controller states are refined before display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integration {
    /// Refine with `arm_mode`, `next_state` and `bypassed_sensors`.
    Alarmo,
    /// Show states as reported.
    #[default]
    Generic,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    pub integration: Integration,
    /// Reactions keyed by status key (`disarmed`, `armed_home_bypass`, ...).
    pub reactions: BTreeMap<String, Vec<TriggerAction>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadyConfig {
    /// Selectable armed states (`armed_away`, `armed_custom_bypass`, ...).
    pub options: Vec<String>,
    pub initial_option: Option<String>,
    /// Restore the last selection from the preference store.
    pub restore: bool,
}

impl Default for ReadyConfig {
    fn default() -> Self {
        ReadyConfig {
            options: [
                "armed_away",
                "armed_home",
                "armed_night",
                "armed_vacation",
                "armed_custom_bypass",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            initial_option: None,
            restore: true,
        }
    }
}

/// Mode machines driven by indicator frames from the keypad.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Modes `away`, `home`, `disarm`, `dynamic` and `none`.
    pub arm_select: Option<ModeConfig>,
    /// Modes `normal` and `rfid`.
    pub reader_mode: Option<ModeConfig>,
}

/// Named modes with ordered trigger lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    pub modes: Vec<ModeDecl>,
    pub initial_mode: Option<String>,
    /// Actions run before every mode change.
    pub on_transition: Vec<TriggerAction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModeDecl {
    pub name: String,
    #[serde(default)]
    pub actions: Vec<TriggerAction>,
}

/// One feedback action, resolved against the strip and buzzer when the
/// panel is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TriggerAction {
    SetColor {
        group: String,
        color: Rgb,
    },
    SetOutput {
        output: String,
        value: f32,
    },
    Flash {
        group: String,
        color: Rgb,
        duration_ms: u64,
    },
    Beep {
        #[serde(default)]
        pattern: BuzzerPattern,
    },
    StopBuzzer,
    SetBrightness {
        value: f32,
    },
    SetGamma {
        enabled: bool,
    },
    Log {
        message: String,
    },
}

impl PanelConfig {
    /// Check the whole tree.
    ///
    /// # Errors
    /// Returns the first configuration error found.
    pub fn validate(&self) -> Result<()> {
        self.entry.validate()?;
        self.timeouts.validate()?;
        self.strip.validate()?;
        self.ready.validate()?;

        let mut status_keys = BTreeMap::new();
        for (key, actions) in &self.status.reactions {
            let Some(canonical) = AlarmStatus::canonical_key(key) else {
                return Err(Error::config("status.reactions", format!("unknown status '{key}'")));
            };
            if let Some(previous) = status_keys.insert(canonical.clone(), key) {
                return Err(Error::config(
                    "status.reactions",
                    format!("'{previous}' and '{key}' both name status '{canonical}'"),
                ));
            }
            self.strip.validate_actions(actions)?;
        }

        for (key, actions) in &self.feedback {
            if !FEEDBACK_KEYS.contains(&key.as_str()) {
                return Err(Error::config("feedback", format!("unknown feedback '{key}'")));
            }
            self.strip.validate_actions(actions)?;
        }

        for modes in [
            &self.indicators.arm_select,
            &self.indicators.reader_mode,
            &self.test_modes,
        ]
        .into_iter()
        .flatten()
        {
            modes.validate()?;
            self.strip.validate_actions(&modes.on_transition)?;
            for decl in &modes.modes {
                self.strip.validate_actions(&decl.actions)?;
            }
        }

        Ok(())
    }
}

fn validate_prefix(field: &str, prefix: &str) -> Result<()> {
    if prefix.len() > MAX_PREFIX_DIGITS {
        return Err(Error::config(
            field,
            format!("prefix longer than {MAX_PREFIX_DIGITS} digits"),
        ));
    }
    if let Some(c) = prefix.chars().find(|c| !c.is_ascii_digit()) {
        return Err(Error::InvalidDigit(c));
    }
    Ok(())
}

fn validate_unit(field: &str, value: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::config(field, format!("{value} is outside 0.0..=1.0")));
    }
    Ok(())
}

impl EntryConfig {
    fn validate(&self) -> Result<()> {
        validate_prefix("entry.force_prefix", &self.force_prefix)?;
        validate_prefix("entry.skip_delay_prefix", &self.skip_delay_prefix)?;
        if !self.force_prefix.is_empty() && self.force_prefix == self.skip_delay_prefix {
            return Err(Error::config(
                "entry.skip_delay_prefix",
                "force and skip-delay prefixes are identical",
            ));
        }
        if !(1..=MAX_ENTRY_DIGITS).contains(&self.max_entry_length) {
            return Err(Error::config(
                "entry.max_entry_length",
                format!("must be 1..={MAX_ENTRY_DIGITS}"),
            ));
        }
        Ok(())
    }
}

impl TimeoutConfig {
    fn validate(&self) -> Result<()> {
        if self.incorrect_pin_ms == 0 {
            return Err(Error::config("timeouts.incorrect_pin_ms", "must be positive"));
        }
        if self.connection_grace_ms == 0 {
            return Err(Error::config("timeouts.connection_grace_ms", "must be positive"));
        }
        if self.pinmode_ms == Some(0) {
            return Err(Error::config("timeouts.pinmode_ms", "must be positive"));
        }
        Ok(())
    }
}

impl StripConfig {
    fn validate(&self) -> Result<()> {
        if self.led_count > MAX_LED_COUNT {
            return Err(Error::config(
                "strip.led_count",
                format!("at most {MAX_LED_COUNT} LEDs are supported"),
            ));
        }
        validate_unit("strip.global_brightness", self.global_brightness)?;
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(Error::config("strip.gamma", "must be a positive number"));
        }

        let mut names = HashSet::new();
        for group in &self.groups {
            if group.name.is_empty() {
                return Err(Error::config("strip.groups", "group name is empty"));
            }
            if !names.insert(group.name.as_str()) {
                return Err(Error::DuplicateGroup(group.name.clone()));
            }
            validate_unit("strip.groups.max_brightness", group.max_brightness)?;
            if let Some(&index) = group.leds.iter().find(|&&i| i >= self.led_count) {
                return Err(Error::LedIndexOutOfRange {
                    group: group.name.clone(),
                    index,
                    led_count: self.led_count,
                });
            }
        }

        let mut ids = HashSet::new();
        for output in &self.outputs {
            if !ids.insert(output.id.as_str()) {
                return Err(Error::config(
                    "strip.outputs",
                    format!("duplicate output '{}'", output.id),
                ));
            }
            self.require_group(&output.group)?;
        }
        Ok(())
    }

    fn require_group(&self, name: &str) -> Result<()> {
        if self.groups.iter().any(|g| g.name == name) {
            Ok(())
        } else {
            Err(Error::UnknownGroup(name.to_string()))
        }
    }

    fn validate_actions(&self, actions: &[TriggerAction]) -> Result<()> {
        for action in actions {
            match action {
                TriggerAction::SetColor { group, .. } | TriggerAction::Flash { group, .. } => {
                    self.require_group(group)?;
                }
                TriggerAction::SetOutput { output, value } => {
                    if !self.outputs.iter().any(|o| &o.id == output) {
                        return Err(Error::UnknownOutput(output.clone()));
                    }
                    validate_unit("set_output.value", *value)?;
                }
                TriggerAction::SetBrightness { value } => {
                    validate_unit("set_brightness.value", *value)?;
                }
                TriggerAction::Beep { .. }
                | TriggerAction::StopBuzzer
                | TriggerAction::SetGamma { .. }
                | TriggerAction::Log { .. } => {}
            }
        }
        Ok(())
    }
}

impl ReadyConfig {
    fn validate(&self) -> Result<()> {
        if self.options.is_empty() {
            return Err(Error::config("ready.options", "at least one option is required"));
        }
        if let Some(option) = self
            .options
            .iter()
            .find(|o| ArmedMode::from_armed_state(o).is_none())
        {
            return Err(Error::config(
                "ready.options",
                format!("'{option}' is not an armed state"),
            ));
        }
        if let Some(initial) = &self.initial_option
            && !self.options.contains(initial)
        {
            return Err(Error::config(
                "ready.initial_option",
                format!("'{initial}' is not one of the options"),
            ));
        }
        Ok(())
    }
}

impl ModeConfig {
    fn validate(&self) -> Result<()> {
        if self.modes.is_empty() {
            return Err(Error::config("modes", "at least one mode is required"));
        }
        let mut names = HashSet::new();
        for decl in &self.modes {
            let name = decl.name.trim().to_ascii_lowercase();
            if name.is_empty() {
                return Err(Error::config("modes", "mode name is empty"));
            }
            if !names.insert(name) {
                return Err(Error::DuplicateMode(decl.name.clone()));
            }
        }
        if let Some(initial) = &self.initial_mode
            && !names.contains(&initial.trim().to_ascii_lowercase())
        {
            return Err(Error::UnknownMode(initial.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn strip_config() -> PanelConfig {
        let mut config = PanelConfig::default();
        config.strip.led_count = 10;
        config.strip.groups = vec![LedGroupConfig {
            name: "front".to_string(),
            leds: vec![0, 1, 2],
            max_brightness: 0.5,
        }];
        config
    }

    #[test]
    fn test_empty_json_is_valid() {
        let config: PanelConfig = serde_json::from_str("{}").unwrap();
        config.validate().unwrap();
        assert_eq!(config.entry.max_entry_length, 16);
        assert!(config.entry.allow_combined_prefixes);
        assert_eq!(config.timeouts.pinmode_ms, None);
        assert_eq!(config.ready.options.len(), 5);
    }

    #[test]
    fn test_index_out_of_range_rejected() {
        let mut config = strip_config();
        config.strip.groups[0].leds.push(10);
        assert!(matches!(
            config.validate(),
            Err(Error::LedIndexOutOfRange { index: 10, led_count: 10, .. })
        ));
    }

    #[test]
    fn test_duplicate_group_rejected() {
        let mut config = strip_config();
        let group = config.strip.groups[0].clone();
        config.strip.groups.push(group);
        assert!(matches!(config.validate(), Err(Error::DuplicateGroup(_))));
    }

    #[test]
    fn test_reaction_with_unknown_group_rejected() {
        let mut config = strip_config();
        config.status.reactions.insert(
            "disarmed".to_string(),
            vec![TriggerAction::SetColor {
                group: "rear".to_string(),
                color: Rgb::GREEN,
            }],
        );
        assert!(matches!(config.validate(), Err(Error::UnknownGroup(name)) if name == "rear"));
    }

    #[test]
    fn test_unknown_status_key_rejected() {
        let mut config = strip_config();
        config
            .status
            .reactions
            .insert("armed_sideways".to_string(), Vec::new());
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[test]
    fn test_status_alias_and_canonical_key_clash() {
        let mut config = strip_config();
        config
            .status
            .reactions
            .insert("connection_timeout".to_string(), Vec::new());
        assert!(config.validate().is_ok());

        config
            .status
            .reactions
            .insert("connection_timed_out".to_string(), Vec::new());
        assert!(matches!(config.validate(), Err(Error::Config { .. })));
    }

    #[rstest]
    #[case("12a", "998")]
    #[case("123456789", "998")]
    #[case("999", "999")]
    fn test_bad_prefixes_rejected(#[case] force: &str, #[case] skip: &str) {
        let mut config = PanelConfig::default();
        config.entry.force_prefix = force.to_string();
        config.entry.skip_delay_prefix = skip.to_string();
        assert!(config.validate().is_err());
    }

    #[rstest]
    #[case(0, false)]
    #[case(1, true)]
    #[case(32, true)]
    #[case(33, false)]
    fn test_max_entry_length_bounds(#[case] length: usize, #[case] valid: bool) {
        let mut config = PanelConfig::default();
        config.entry.max_entry_length = length;
        assert_eq!(config.validate().is_ok(), valid);
    }

    #[test]
    fn test_initial_ready_option_must_be_listed() {
        let mut config = PanelConfig::default();
        config.ready.options = vec!["armed_home".to_string()];
        config.ready.initial_option = Some("armed_away".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_mode_names_rejected() {
        let mut config = PanelConfig::default();
        config.test_modes = Some(ModeConfig {
            modes: vec![
                ModeDecl { name: "Mode1".to_string(), actions: Vec::new() },
                ModeDecl { name: "mode1".to_string(), actions: Vec::new() },
            ],
            ..ModeConfig::default()
        });
        assert!(matches!(config.validate(), Err(Error::DuplicateMode(_))));
    }

    #[test]
    fn test_trigger_actions_deserialize() {
        let json = r#"[
            { "action": "beep", "pattern": { "beeps": 2, "tone": 200 } },
            { "action": "stop_buzzer" },
            { "action": "flash", "group": "front", "color": { "red": 1.0 }, "duration_ms": 300 }
        ]"#;
        let actions: Vec<TriggerAction> = serde_json::from_str(json).unwrap();
        assert_eq!(actions.len(), 3);
        assert!(matches!(
            actions[0],
            TriggerAction::Beep { pattern: BuzzerPattern { beeps: 2, tone: 200, .. } }
        ));
        assert_eq!(actions[1], TriggerAction::StopBuzzer);
        strip_config().strip.validate_actions(&actions).unwrap();
    }

    #[test]
    fn test_output_must_reference_group() {
        let mut config = strip_config();
        config.strip.outputs.push(ChannelOutputConfig {
            id: "front_red".to_string(),
            group: "back".to_string(),
            channel: ColorChannel::Red,
        });
        assert!(matches!(config.validate(), Err(Error::UnknownGroup(_))));
    }
}
