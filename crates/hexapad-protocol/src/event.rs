use hexapad_core::{ArmKey, Digits};
use std::fmt;

/// Decoded unit of the keypad stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// One digit key (0-9).
    Digit(u8),
    Command(Command),
    /// Idle poll from the keypad. Proves the link is alive.
    Heartbeat,
}

/// Everything the keypad sends that is neither a digit nor an idle poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `#`: submit the typed digits with the default mode.
    Enter,
    /// `*`: discard the typed digits.
    Cancel,
    /// Arm-select key: submit the typed digits with this mode.
    ArmKey(ArmKey),
    /// Complete entry assembled by the keypad itself.
    Entry(EntryFrame),
    /// Arm-select LED the keypad wants lit, `None` for all off.
    ArmSelectIndicator(Option<ArmKey>),
    ReaderMode(ReaderMode),
}

/// Payload of a complete entry frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFrame {
    pub prefix: Digits,
    pub arm_key: ArmKey,
    pub pin: Digits,
}

/// Reader mode announced by the keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderMode {
    Normal,
    Rfid,
}

impl ReaderMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReaderMode::Normal => "normal",
            ReaderMode::Rfid => "rfid",
        }
    }
}

impl Event {
    /// Returns `true` for events caused by a key press.
    ///
    /// Idle polls and indicator frames are not key activity.
    #[must_use]
    pub fn is_key_activity(&self) -> bool {
        matches!(
            self,
            Event::Digit(_)
                | Event::Command(Command::Enter | Command::Cancel | Command::ArmKey(_))
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Event::Digit(d) => write!(f, "digit {d}"),
            Event::Heartbeat => f.write_str("heartbeat"),
            Event::Command(Command::Enter) => f.write_str("enter"),
            Event::Command(Command::Cancel) => f.write_str("cancel"),
            Event::Command(Command::ArmKey(key)) => write!(f, "arm key {}", key.as_str()),
            Event::Command(Command::Entry(entry)) => write!(
                f,
                "entry {} (prefix {} digits, pin {} digits)",
                entry.arm_key.as_str(),
                entry.prefix.len(),
                entry.pin.len()
            ),
            Event::Command(Command::ArmSelectIndicator(Some(key))) => {
                write!(f, "arm-select indicator {}", key.as_str())
            }
            Event::Command(Command::ArmSelectIndicator(None)) => {
                f.write_str("arm-select indicator none")
            }
            Event::Command(Command::ReaderMode(mode)) => write!(f, "reader mode {}", mode.as_str()),
        }
    }
}
