//! Wire-level and default constants for the keypad bridge.
//!
//! The keypad talks to the bridge with short fixed-length frames. Every
//! frame starts with a header byte that determines its length:
//!
//! ```text
//! A0 p1 p2 p3 sel d1 d2 ... d16    complete entry (21 bytes)
//! A1 key                           single key press (2 bytes)
//! A3 sel                           arm-select indicator (2 bytes)
//! A4 mode                          reader mode (2 bytes)
//! ```
//!
//! Unused digit slots inside an entry frame hold [`FILLER_BYTE`]. The same
//! byte is sent by the keypad while the line is idle, which is why the
//! decoder uses it as the resynchronization terminator.
//!
//! # Usage
//!
//! ```
//! use hexapad_core::constants::*;
//!
//! assert_eq!(frame_length(HEADER_ENTRY), Some(ENTRY_FRAME_LEN));
//! assert_eq!(frame_length(HEADER_KEY), Some(2));
//! assert_eq!(frame_length(0x7E), None);
//! ```

// ============================================================================
// Frame Headers
// ============================================================================

/// Header of a complete entry frame (prefix, arm-select code and PIN).
pub const HEADER_ENTRY: u8 = 0xA0;

/// Header of a single key press frame.
pub const HEADER_KEY: u8 = 0xA1;

/// Header of an arm-select indicator frame.
pub const HEADER_ARM_SELECT: u8 = 0xA3;

/// Header of a reader mode frame.
pub const HEADER_READER_MODE: u8 = 0xA4;

/// Length of a complete entry frame, header included.
pub const ENTRY_FRAME_LEN: usize = 21;

/// Length of every short (two byte) frame.
pub const SHORT_FRAME_LEN: usize = 2;

/// Empty-slot filler and idle line byte.
pub const FILLER_BYTE: u8 = 0xFF;

/// Number of prefix slots in an entry frame (bytes 1..=3).
pub const ENTRY_PREFIX_SLOTS: usize = 3;

/// Position of the arm-select code in an entry frame.
pub const ENTRY_SELECT_OFFSET: usize = 4;

/// Number of PIN slots in an entry frame (bytes 5..=20).
pub const ENTRY_PIN_SLOTS: usize = 16;

/// Returns the total frame length for a header byte, or `None` for
/// bytes that do not start a frame.
#[must_use]
pub const fn frame_length(header: u8) -> Option<usize> {
    match header {
        HEADER_ENTRY => Some(ENTRY_FRAME_LEN),
        HEADER_KEY | HEADER_ARM_SELECT | HEADER_READER_MODE => Some(SHORT_FRAME_LEN),
        _ => None,
    }
}

// ============================================================================
// Key Codes
// ============================================================================

/// Digit codes indexed by digit value (`DIGIT_CODES[7]` is the code for 7).
pub const DIGIT_CODES: [u8; 10] = [0x00, 0x05, 0x0A, 0x0F, 0x11, 0x16, 0x1B, 0x1C, 0x22, 0x27];

/// Arm-select code: away.
pub const SELECT_AWAY: u8 = 0x41;

/// Arm-select code: home.
pub const SELECT_HOME: u8 = 0x42;

/// Arm-select code: disarm.
pub const SELECT_DISARM: u8 = 0x43;

/// Arm-select code: dynamic (resolved through the configured dynamic mode).
pub const SELECT_DYNAMIC: u8 = 0x44;

/// Enter key (`#`), the entry terminator.
pub const KEY_ENTER: u8 = 0x23;

/// Cancel key (`*`).
pub const KEY_CANCEL: u8 = 0x2A;

/// Idle poll sent by the keypad when no key is pressed.
pub const KEY_IDLE: u8 = 0x51;

/// Reader mode code: normal keypad operation.
pub const READER_MODE_NORMAL: u8 = 0x20;

/// Reader mode code: RFID badge reading.
pub const READER_MODE_RFID: u8 = 0x30;

// ============================================================================
// Decoder Limits
// ============================================================================

/// Consecutive soft decode errors that force a resynchronization.
pub const RESYNC_ERROR_THRESHOLD: u8 = 3;

// ============================================================================
// Entry Limits and Defaults
// ============================================================================

/// Hard capacity of the PIN buffer, prefixes included.
pub const MAX_ENTRY_DIGITS: usize = 32;

/// Hard capacity of a configured prefix.
pub const MAX_PREFIX_DIGITS: usize = 8;

/// Default maximum accepted entry length.
pub const DEFAULT_MAX_ENTRY_LENGTH: usize = 16;

/// Default force prefix.
pub const DEFAULT_FORCE_PREFIX: &str = "999";

/// Default skip-delay prefix.
pub const DEFAULT_SKIP_DELAY_PREFIX: &str = "998";

// ============================================================================
// Timeouts (milliseconds)
// ============================================================================

/// Default inactivity timeout while entering a PIN, also used as the
/// duration of the `incorrect_pin` status override.
pub const DEFAULT_INCORRECT_PIN_TIMEOUT_MS: u64 = 5_000;

/// Default duration of the failed-open-sensors lockout and status override.
pub const DEFAULT_FAILED_OPEN_SENSORS_TIMEOUT_MS: u64 = 10_000;

/// Default grace period before a silent controller link is reported as
/// `connection_timed_out`.
pub const DEFAULT_CONNECTION_GRACE_MS: u64 = 60_000;

/// Default length of a key acknowledgement beep.
pub const DEFAULT_KEY_BEEP_MS: u64 = 50;

// ============================================================================
// LED Defaults
// ============================================================================

/// Default gamma exponent used when gamma correction is enabled.
pub const DEFAULT_GAMMA: f32 = 2.2;

/// Largest LED strip the bridge accepts.
pub const MAX_LED_COUNT: usize = 2048;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digit_codes_are_unique() {
        for (i, a) in DIGIT_CODES.iter().enumerate() {
            for b in &DIGIT_CODES[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_special_keys_do_not_collide_with_digits() {
        for key in [KEY_ENTER, KEY_CANCEL, KEY_IDLE, FILLER_BYTE] {
            assert!(!DIGIT_CODES.contains(&key));
        }
        for select in [SELECT_AWAY, SELECT_HOME, SELECT_DISARM, SELECT_DYNAMIC] {
            assert!(!DIGIT_CODES.contains(&select));
        }
    }

    #[test]
    fn test_entry_frame_layout() {
        assert_eq!(1 + ENTRY_PREFIX_SLOTS + 1 + ENTRY_PIN_SLOTS, ENTRY_FRAME_LEN);
        assert_eq!(ENTRY_SELECT_OFFSET, 1 + ENTRY_PREFIX_SLOTS);
    }
}
