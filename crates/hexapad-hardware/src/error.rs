//! Error types for output devices and the controller link.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors raised by LED drivers, tone outputs, preference stores and the
/// controller link.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Device or link is gone.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// A write to an output device failed.
    #[error("Write to {device} failed: {message}")]
    WriteFailed { device: String, message: String },

    /// Frame or value does not fit the device.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Stored data could not be parsed.
    #[error("Corrupt store {path}: {message}")]
    CorruptStore { path: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new write failure.
    pub fn write_failed(device: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            device: device.into(),
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new corrupt store error.
    pub fn corrupt_store(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::CorruptStore {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<HardwareError> for hexapad_core::Error {
    fn from(error: HardwareError) -> Self {
        match error {
            HardwareError::Disconnected { .. } => hexapad_core::Error::LinkClosed,
            HardwareError::Io(e) => hexapad_core::Error::Io(e),
            other => hexapad_core::Error::Hardware(other.to_string()),
        }
    }
}
