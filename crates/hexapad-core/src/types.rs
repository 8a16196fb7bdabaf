use crate::{
    Result,
    constants::{MAX_ENTRY_DIGITS, SELECT_AWAY, SELECT_DISARM, SELECT_DYNAMIC, SELECT_HOME},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Alarm mode requested by a completed keypad entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmMode {
    Away,
    Home,
    Night,
    Vacation,
    Bypass,
    Disarm,
}

impl AlarmMode {
    pub const ALL: [AlarmMode; 6] = [
        AlarmMode::Away,
        AlarmMode::Home,
        AlarmMode::Night,
        AlarmMode::Vacation,
        AlarmMode::Bypass,
        AlarmMode::Disarm,
    ];

    /// Lowercase configuration name of the mode.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AlarmMode::Away => "away",
            AlarmMode::Home => "home",
            AlarmMode::Night => "night",
            AlarmMode::Vacation => "vacation",
            AlarmMode::Bypass => "bypass",
            AlarmMode::Disarm => "disarm",
        }
    }

    /// Returns `true` for every mode except [`AlarmMode::Disarm`].
    #[inline]
    #[must_use]
    pub fn is_arm(self) -> bool {
        !matches!(self, AlarmMode::Disarm)
    }
}

impl fmt::Display for AlarmMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlarmMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        AlarmMode::ALL
            .into_iter()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| Error::InvalidAlarmMode(s.to_string()))
    }
}

/// Arm-select key on the keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ArmKey {
    Away = SELECT_AWAY,
    Home = SELECT_HOME,
    Disarm = SELECT_DISARM,
    Dynamic = SELECT_DYNAMIC,
}

impl ArmKey {
    /// Decode an arm-select wire code.
    #[inline]
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            SELECT_AWAY => Some(ArmKey::Away),
            SELECT_HOME => Some(ArmKey::Home),
            SELECT_DISARM => Some(ArmKey::Disarm),
            SELECT_DYNAMIC => Some(ArmKey::Dynamic),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn to_code(self) -> u8 {
        self as u8
    }

    /// Name used as a mode in the arm-select indicator machine.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ArmKey::Away => "away",
            ArmKey::Home => "home",
            ArmKey::Disarm => "disarm",
            ArmKey::Dynamic => "dynamic",
        }
    }
}

/// What the dynamic arm-select key resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DynamicMode {
    #[default]
    Night,
    Vacation,
    Bypass,
    Action,
}

impl DynamicMode {
    pub const ALL: [DynamicMode; 4] = [
        DynamicMode::Night,
        DynamicMode::Vacation,
        DynamicMode::Bypass,
        DynamicMode::Action,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DynamicMode::Night => "night",
            DynamicMode::Vacation => "vacation",
            DynamicMode::Bypass => "bypass",
            DynamicMode::Action => "action",
        }
    }

    #[must_use]
    pub fn target(self) -> DispatchTarget {
        match self {
            DynamicMode::Night => DispatchTarget::Mode(AlarmMode::Night),
            DynamicMode::Vacation => DispatchTarget::Mode(AlarmMode::Vacation),
            DynamicMode::Bypass => DispatchTarget::Mode(AlarmMode::Bypass),
            DynamicMode::Action => DispatchTarget::CustomAction,
        }
    }
}

impl fmt::Display for DynamicMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DynamicMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        DynamicMode::ALL
            .into_iter()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| Error::config("entry.dynamic_mode", format!("unknown mode '{s}'")))
    }
}

/// Destination of a completed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchTarget {
    Mode(AlarmMode),
    CustomAction,
}

impl fmt::Display for DispatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DispatchTarget::Mode(mode) => write!(f, "{mode}"),
            DispatchTarget::CustomAction => f.write_str("custom_action"),
        }
    }
}

/// Arm or disarm request built from one completed entry.
///
/// The PIN is forwarded verbatim; the controller authenticates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmRequest {
    pub mode: AlarmMode,
    pub forced: bool,
    pub skip_delay: bool,
    pub raw_pin: String,
}

/// Entry routed to the custom action instead of an alarm mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomActionRequest {
    /// Prefix digits exactly as typed (may be empty).
    pub prefix: String,
    pub pin: String,
}

/// Armed mode as reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmedMode {
    Away,
    Home,
    Night,
    Vacation,
    CustomBypass,
}

impl ArmedMode {
    /// Short name used inside status keys (`arming_home`, `pending_custom`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ArmedMode::Away => "away",
            ArmedMode::Home => "home",
            ArmedMode::Night => "night",
            ArmedMode::Vacation => "vacation",
            ArmedMode::CustomBypass => "custom",
        }
    }

    /// Parse a controller state or attribute value such as `armed_night`.
    #[must_use]
    pub fn from_armed_state(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "armed_away" => Some(ArmedMode::Away),
            "armed_home" => Some(ArmedMode::Home),
            "armed_night" => Some(ArmedMode::Night),
            "armed_vacation" => Some(ArmedMode::Vacation),
            "armed_custom_bypass" => Some(ArmedMode::CustomBypass),
            _ => None,
        }
    }

    fn from_short(value: &str) -> Option<Self> {
        match value {
            "away" => Some(ArmedMode::Away),
            "home" => Some(ArmedMode::Home),
            "night" => Some(ArmedMode::Night),
            "vacation" => Some(ArmedMode::Vacation),
            "custom" => Some(ArmedMode::CustomBypass),
            _ => None,
        }
    }
}

/// Keypad-visible alarm status.
///
/// Every variant has a stable lowercase key (see [`AlarmStatus::key`]) that
/// configuration uses to attach reactions. Controller states that are not
/// recognized are kept verbatim in [`AlarmStatus::Unknown`].
///
/// # Examples
///
/// ```
/// use hexapad_core::{AlarmStatus, ArmedMode};
///
/// let status = AlarmStatus::parse("armed_home_bypass");
/// assert_eq!(status, AlarmStatus::Armed { mode: ArmedMode::Home, bypassed: true });
/// assert_eq!(status.key(), "armed_home_bypass");
///
/// assert_eq!(AlarmStatus::parse("unavailable"), AlarmStatus::ConnectionTimedOut);
/// assert_eq!(AlarmStatus::parse("Sirens").to_string(), "Sirens");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum AlarmStatus {
    Disarmed,
    Armed { mode: ArmedMode, bypassed: bool },
    Arming(Option<ArmedMode>),
    Pending(Option<ArmedMode>),
    Triggered,
    Disarming,
    #[default]
    ConnectionTimedOut,
    IncorrectPin,
    FailedOpenSensors,
    Unknown(String),
}

impl AlarmStatus {
    /// Map a raw controller state (trimmed, case-insensitive).
    ///
    /// `unavailable` and `unknown` mean the controller cannot be reached and
    /// map to [`AlarmStatus::ConnectionTimedOut`].
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let lower = raw.trim().to_ascii_lowercase();
        match lower.as_str() {
            "" | "unavailable" | "unknown" | "connection_timed_out" | "connection_timeout" => {
                return AlarmStatus::ConnectionTimedOut;
            }
            "disarmed" => return AlarmStatus::Disarmed,
            "triggered" => return AlarmStatus::Triggered,
            "disarming" => return AlarmStatus::Disarming,
            "arming" => return AlarmStatus::Arming(None),
            "pending" => return AlarmStatus::Pending(None),
            "incorrect_pin" => return AlarmStatus::IncorrectPin,
            "failed_open_sensors" => return AlarmStatus::FailedOpenSensors,
            "armed_custom" => {
                return AlarmStatus::Armed {
                    mode: ArmedMode::CustomBypass,
                    bypassed: false,
                };
            }
            "armed_custom_bypass" => {
                return AlarmStatus::Armed {
                    mode: ArmedMode::CustomBypass,
                    bypassed: true,
                };
            }
            _ => {}
        }

        if let Some(rest) = lower.strip_prefix("armed_") {
            let (short, bypassed) = match rest.strip_suffix("_bypass") {
                Some(short) => (short, true),
                None => (rest, false),
            };
            if let Some(mode) = ArmedMode::from_short(short).filter(|m| *m != ArmedMode::CustomBypass) {
                return AlarmStatus::Armed { mode, bypassed };
            }
        }
        if let Some(mode) = lower.strip_prefix("arming_").and_then(ArmedMode::from_short) {
            return AlarmStatus::Arming(Some(mode));
        }
        if let Some(mode) = lower.strip_prefix("pending_").and_then(ArmedMode::from_short) {
            return AlarmStatus::Pending(Some(mode));
        }

        AlarmStatus::Unknown(raw.trim().to_string())
    }

    /// Stable lowercase key of the status.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            AlarmStatus::Disarmed => "disarmed".to_string(),
            AlarmStatus::Armed {
                mode: ArmedMode::CustomBypass,
                bypassed,
            } => {
                if *bypassed {
                    "armed_custom_bypass".to_string()
                } else {
                    "armed_custom".to_string()
                }
            }
            AlarmStatus::Armed { mode, bypassed } => {
                if *bypassed {
                    format!("armed_{}_bypass", mode.as_str())
                } else {
                    format!("armed_{}", mode.as_str())
                }
            }
            AlarmStatus::Arming(None) => "arming".to_string(),
            AlarmStatus::Arming(Some(mode)) => format!("arming_{}", mode.as_str()),
            AlarmStatus::Pending(None) => "pending".to_string(),
            AlarmStatus::Pending(Some(mode)) => format!("pending_{}", mode.as_str()),
            AlarmStatus::Triggered => "triggered".to_string(),
            AlarmStatus::Disarming => "disarming".to_string(),
            AlarmStatus::ConnectionTimedOut => "connection_timed_out".to_string(),
            AlarmStatus::IncorrectPin => "incorrect_pin".to_string(),
            AlarmStatus::FailedOpenSensors => "failed_open_sensors".to_string(),
            AlarmStatus::Unknown(_) => "unknown".to_string(),
        }
    }

    /// Runtime key for a configured status name.
    ///
    /// Aliases accepted by [`AlarmStatus::parse`] (`connection_timeout`,
    /// `unavailable`, mixed case) resolve to the key that
    /// [`AlarmStatus::key`] reports, so reactions stored under an alias
    /// still fire. `unknown` names the reaction for unrecognized raw states.
    /// Returns `None` for names that are not a status.
    #[must_use]
    pub fn canonical_key(key: &str) -> Option<String> {
        let lower = key.trim().to_ascii_lowercase();
        if lower == "unknown" {
            return Some(lower);
        }
        match AlarmStatus::parse(&lower) {
            AlarmStatus::Unknown(_) => None,
            status => Some(status.key()),
        }
    }

    #[inline]
    #[must_use]
    pub fn is_connection_timed_out(&self) -> bool {
        matches!(self, AlarmStatus::ConnectionTimedOut)
    }
}

impl fmt::Display for AlarmStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AlarmStatus::Unknown(raw) => f.write_str(raw),
            other => f.write_str(&other.key()),
        }
    }
}

/// RGB color with channels in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgb {
    #[serde(default)]
    pub red: f32,
    #[serde(default)]
    pub green: f32,
    #[serde(default)]
    pub blue: f32,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0.0, 0.0, 0.0);
    pub const RED: Rgb = Rgb::new(1.0, 0.0, 0.0);
    pub const GREEN: Rgb = Rgb::new(0.0, 1.0, 0.0);
    pub const BLUE: Rgb = Rgb::new(0.0, 0.0, 1.0);

    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32) -> Self {
        Rgb { red, green, blue }
    }

    #[must_use]
    pub fn channel(&self, channel: ColorChannel) -> f32 {
        match channel {
            ColorChannel::Red => self.red,
            ColorChannel::Green => self.green,
            ColorChannel::Blue => self.blue,
        }
    }

    pub fn set_channel(&mut self, channel: ColorChannel, value: f32) {
        match channel {
            ColorChannel::Red => self.red = value,
            ColorChannel::Green => self.green = value,
            ColorChannel::Blue => self.blue = value,
        }
    }

    /// Copy of the color with every channel clamped to `0.0..=1.0`.
    #[must_use]
    pub fn clamped(self) -> Self {
        Rgb::new(
            self.red.clamp(0.0, 1.0),
            self.green.clamp(0.0, 1.0),
            self.blue.clamp(0.0, 1.0),
        )
    }
}

/// One color channel of an LED group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ColorChannel {
    Red = 0,
    Green = 1,
    Blue = 2,
}

impl ColorChannel {
    /// Position of the channel in a `[r, g, b]` pixel.
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Beep pattern played by the buzzer sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuzzerPattern {
    pub beeps: u8,
    pub short_pause_ms: u64,
    pub long_pause_ms: u64,
    /// Output level while a beep is on.
    pub tone: u8,
    pub repeat: bool,
    pub beep_length_ms: u64,
}

impl Default for BuzzerPattern {
    fn default() -> Self {
        BuzzerPattern {
            beeps: 1,
            short_pause_ms: 100,
            long_pause_ms: 500,
            tone: 128,
            repeat: false,
            beep_length_ms: 200,
        }
    }
}

/// Fixed-capacity digit buffer holding values `0..=9`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Digits(heapless::Vec<u8, MAX_ENTRY_DIGITS>);

impl Digits {
    #[must_use]
    pub const fn new() -> Self {
        Digits(heapless::Vec::new())
    }

    /// Append one digit.
    ///
    /// # Errors
    /// Returns `Error::InvalidDigit` for values above 9 and
    /// `Error::DigitOverflow` when the buffer is full.
    pub fn push(&mut self, digit: u8) -> Result<()> {
        if digit > 9 {
            return Err(Error::InvalidDigit(
                char::from_digit(u32::from(digit), 36).unwrap_or('?'),
            ));
        }
        self.0.push(digit).map_err(|_| Error::DigitOverflow {
            capacity: MAX_ENTRY_DIGITS,
        })
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` if the digits start with `prefix`.
    #[must_use]
    pub fn starts_with(&self, prefix: &Digits) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for Digits {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for d in &self.0 {
            write!(f, "{d}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Digits {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut digits = Digits::new();
        for c in s.chars() {
            let d = c.to_digit(10).ok_or(Error::InvalidDigit(c))?;
            digits.push(d as u8)?;
        }
        Ok(digits)
    }
}
