//! Error types for canprintf.

use thiserror::Error;

/// Main error type for all canprintf operations.
#[derive(Debug, Error)]
pub enum PrintfError {
    /// Frame declared more data bytes than a classic CAN frame can carry.
    #[error("Invalid frame length: {0} (expected 0-8)")]
    InvalidFrameLength(usize),

    /// The timer facility could not schedule the idle flush.
    #[error("Timer scheduling failed: {0}")]
    TimerScheduling(String),

    /// Invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not open or configure the CAN interface.
    #[error("Connection error: {0}")]
    Connection(String),

    /// `start()` called on a driver that is already listening.
    #[error("Driver already started")]
    AlreadyStarted,

    /// `start()` called on a driver that has been stopped.
    #[error("Driver stopped")]
    Stopped,

    /// I/O error (config file, socket).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PrintfError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a timer scheduling error.
    pub fn timer(msg: impl Into<String>) -> Self {
        Self::TimerScheduling(msg.into())
    }
}

/// Result type alias using PrintfError.
pub type Result<T> = std::result::Result<T, PrintfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            PrintfError::InvalidFrameLength(12).to_string(),
            "Invalid frame length: 12 (expected 0-8)"
        );
        assert_eq!(
            PrintfError::config("can_id out of range").to_string(),
            "Configuration error: can_id out of range"
        );
    }
}
