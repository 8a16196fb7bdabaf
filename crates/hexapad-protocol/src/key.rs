//! Key codes carried by single key press frames.

use hexapad_core::{
    ArmKey,
    constants::{DIGIT_CODES, FILLER_BYTE, KEY_CANCEL, KEY_ENTER, KEY_IDLE},
};

/// Map a digit wire code to its value.
#[inline]
#[must_use]
pub fn digit_from_code(code: u8) -> Option<u8> {
    DIGIT_CODES
        .iter()
        .position(|&c| c == code)
        .map(|d| d as u8)
}

/// Map a digit value to its wire code.
#[inline]
#[must_use]
pub fn digit_to_code(digit: u8) -> Option<u8> {
    DIGIT_CODES.get(usize::from(digit)).copied()
}

/// Decoded key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Digit(u8),
    Arm(ArmKey),
    Enter,
    Cancel,
    /// Idle poll, no key pressed.
    Idle,
}

impl Key {
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        if let Some(d) = digit_from_code(code) {
            return Some(Key::Digit(d));
        }
        match code {
            KEY_ENTER => Some(Key::Enter),
            KEY_CANCEL => Some(Key::Cancel),
            KEY_IDLE | FILLER_BYTE => Some(Key::Idle),
            other => ArmKey::from_code(other).map(Key::Arm),
        }
    }

    #[must_use]
    pub fn to_code(self) -> u8 {
        match self {
            Key::Digit(d) => digit_to_code(d).unwrap_or(FILLER_BYTE),
            Key::Arm(arm) => arm.to_code(),
            Key::Enter => KEY_ENTER,
            Key::Cancel => KEY_CANCEL,
            Key::Idle => KEY_IDLE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0x00, Key::Digit(0))]
    #[case(0x05, Key::Digit(1))]
    #[case(0x1C, Key::Digit(7))]
    #[case(0x27, Key::Digit(9))]
    #[case(0x23, Key::Enter)]
    #[case(0x2A, Key::Cancel)]
    #[case(0x51, Key::Idle)]
    #[case(0xFF, Key::Idle)]
    #[case(0x42, Key::Arm(ArmKey::Home))]
    #[case(0x44, Key::Arm(ArmKey::Dynamic))]
    fn test_key_from_code(#[case] code: u8, #[case] expected: Key) {
        assert_eq!(Key::from_code(code), Some(expected));
    }

    #[rstest]
    #[case(0x01)]
    #[case(0x40)]
    #[case(0x99)]
    fn test_unknown_codes(#[case] code: u8) {
        assert_eq!(Key::from_code(code), None);
    }

    #[test]
    fn test_every_digit_has_a_code() {
        for d in 0..10 {
            let code = digit_to_code(d).unwrap();
            assert_eq!(digit_from_code(code), Some(d));
        }
        assert_eq!(digit_to_code(10), None);
    }
}
