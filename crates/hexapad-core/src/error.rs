use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (rejected before the panel starts)
    #[error("Configuration error in {field}: {reason}")]
    Config { field: String, reason: String },

    #[error("LED index {index} in group '{group}' is out of range (strip has {led_count} LEDs)")]
    LedIndexOutOfRange {
        group: String,
        index: usize,
        led_count: usize,
    },

    #[error("Duplicate LED group: {0}")]
    DuplicateGroup(String),

    #[error("Unknown LED group: {0}")]
    UnknownGroup(String),

    #[error("Unknown output: {0}")]
    UnknownOutput(String),

    #[error("Duplicate mode: {0}")]
    DuplicateMode(String),

    #[error("Unknown mode: {0}")]
    UnknownMode(String),

    #[error("Invalid alarm mode: {0}")]
    InvalidAlarmMode(String),

    #[error("Invalid digit: {0}")]
    InvalidDigit(char),

    #[error("Too many digits: capacity is {capacity}")]
    DigitOverflow { capacity: usize },

    // Runtime errors
    #[error("Hardware operation failed: {0}")]
    Hardware(String),

    #[error("Controller link closed")]
    LinkClosed,

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error for a named field.
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
