//! Listener configuration.

use std::path::Path;

use serde::Deserialize;

use crate::assembler::DEFAULT_FLUSH_TIMEOUT;
use crate::core::error::{PrintfError, Result};

/// CAN identifier the embedded printf stream is sent on.
pub const PRINTF_CAN_ID: u32 = 0x580;

/// Largest 11-bit (standard) CAN identifier.
pub const MAX_STANDARD_ID: u32 = 0x7FF;

/// Listener configuration.
///
/// # Example TOML
/// ```toml
/// interface = "can0"
/// can_id = 0x580
/// flush_timeout_ms = 1000
/// rx_poll_interval_ms = 10
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrintfConfig {
    /// SocketCAN interface name (e.g., "can0", "vcan0").
    #[serde(default = "default_interface")]
    pub interface: String,

    /// Identifier of the printf frames.
    #[serde(default = "default_can_id")]
    pub can_id: u32,

    /// Idle time before a partial line is flushed, in milliseconds.
    #[serde(default = "default_flush_timeout")]
    pub flush_timeout_ms: u64,

    /// RX polling interval in milliseconds.
    #[serde(default = "default_rx_poll_interval")]
    pub rx_poll_interval_ms: u64,
}

fn default_interface() -> String {
    "can0".to_string()
}

fn default_can_id() -> u32 {
    PRINTF_CAN_ID
}

fn default_flush_timeout() -> u64 {
    DEFAULT_FLUSH_TIMEOUT.as_millis() as u64
}

fn default_rx_poll_interval() -> u64 {
    10
}

impl Default for PrintfConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            can_id: default_can_id(),
            flush_timeout_ms: default_flush_timeout(),
            rx_poll_interval_ms: default_rx_poll_interval(),
        }
    }
}

impl PrintfConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.interface.trim().is_empty() {
            return Err(PrintfError::config("interface must not be empty"));
        }
        if self.can_id > MAX_STANDARD_ID {
            return Err(PrintfError::Config(format!(
                "can_id 0x{:X} exceeds 11-bit range",
                self.can_id
            )));
        }
        if self.flush_timeout_ms == 0 {
            return Err(PrintfError::config("flush_timeout_ms must be > 0"));
        }
        if self.rx_poll_interval_ms == 0 {
            return Err(PrintfError::config("rx_poll_interval_ms must be > 0"));
        }
        Ok(())
    }

    /// Idle flush timeout as a `Duration`.
    pub fn flush_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.flush_timeout_ms)
    }
}

/// Parse a CAN identifier given in decimal or `0x` hex.
pub fn parse_can_id(s: &str) -> Result<u32> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse::<u32>()
    };

    let id = parsed.map_err(|_| PrintfError::Config(format!("Invalid CAN id: {}", s)))?;
    if id > MAX_STANDARD_ID {
        return Err(PrintfError::Config(format!(
            "CAN id 0x{:X} exceeds 11-bit range",
            id
        )));
    }
    Ok(id)
}

/// Sample configuration printed by `canprintf example-config`.
pub const EXAMPLE_CONFIG: &str = r#"# canprintf configuration

# SocketCAN interface
interface = "can0"

# Identifier of the printf frames (0x580 = 1408)
can_id = 0x580

# Flush a line without terminator after this idle time
flush_timeout_ms = 1000

# Receive poll interval
rx_poll_interval_ms = 10
"#;

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PrintfConfig::default();
        assert_eq!(config.interface, "can0");
        assert_eq!(config.can_id, 0x580);
        assert_eq!(config.flush_timeout_ms, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = PrintfConfig::from_toml_str("").unwrap();
        assert_eq!(config, PrintfConfig::default());
    }

    #[test]
    fn test_example_config_parses() {
        let config = PrintfConfig::from_toml_str(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config, PrintfConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config =
            PrintfConfig::from_toml_str("interface = \"vcan0\"\ncan_id = 0x001\n").unwrap();
        assert_eq!(config.interface, "vcan0");
        assert_eq!(config.can_id, 1);
        assert_eq!(config.flush_timeout_ms, 1000);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = PrintfConfig::from_toml_str("bitrate = 250000\n");
        assert!(matches!(result, Err(PrintfError::Toml(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let result = PrintfConfig::from_toml_str("flush_timeout_ms = 0\n");
        assert!(matches!(result, Err(PrintfError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_oversized_id() {
        let config = PrintfConfig {
            can_id: 0x800,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(PrintfError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_blank_interface() {
        let config = PrintfConfig {
            interface: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "interface = \"vcan1\"").unwrap();
        writeln!(file, "flush_timeout_ms = 250").unwrap();

        let config = PrintfConfig::from_file(file.path()).unwrap();
        assert_eq!(config.interface, "vcan1");
        assert_eq!(config.flush_timeout().as_millis(), 250);
    }

    #[test]
    fn test_from_missing_file() {
        let result = PrintfConfig::from_file("/nonexistent/canprintf.toml");
        assert!(matches!(result, Err(PrintfError::Io(_))));
    }

    #[test]
    fn test_parse_can_id() {
        assert_eq!(parse_can_id("0x580").unwrap(), 0x580);
        assert_eq!(parse_can_id("0X1f").unwrap(), 0x1F);
        assert_eq!(parse_can_id("1408").unwrap(), 0x580);
        assert!(parse_can_id("0xZZ").is_err());
        assert_eq!(parse_can_id("0x7FF").unwrap(), 0x7FF);
        assert!(parse_can_id("0x800").is_err());
        assert!(parse_can_id("0x18FF0580").is_err());
        assert!(parse_can_id("").is_err());
    }
}
