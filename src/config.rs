//! Configuration management for rfid-capture.
//!
//! Configuration is loaded with figment from defaults, an optional TOML file
//! and `RFID_CAPTURE_` environment variables, in increasing precedence.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::capture::DEFAULT_OUTPUT;
use crate::error::{Error, Result};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "rfid-capture.toml";

/// Prefix of environment overrides. Nested keys are separated by `__`,
/// e.g. `RFID_CAPTURE_READER__BACKEND=serial`.
pub const ENV_PREFIX: &str = "RFID_CAPTURE_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File that receives the captured identifier.
    pub output: PathBuf,
    /// Polling behaviour while waiting for a tag.
    pub capture: CaptureConfig,
    /// Reader hardware.
    pub reader: ReaderConfig,
}

/// Polling behaviour while waiting for a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Delay between two polls of the reader.
    pub poll_interval_ms: u64,
    /// Give up after this many seconds. Unset waits forever.
    pub timeout_secs: Option<u64>,
}

/// Which bus the reader sits on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Spi,
    Serial,
}

impl Backend {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Spi => "spi",
            Self::Serial => "serial",
        }
    }
}

/// Reader hardware.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub backend: Backend,
    pub spi: SpiConfig,
    pub serial: SerialConfig,
}

/// SPI wiring on a Raspberry Pi.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpiConfig {
    pub bus: u8,
    pub slave_select: u8,
    pub clock_hz: u32,
    /// BCM number of the RST line, or unset to skip the hardware reset.
    pub reset_pin: Option<u8>,
}

/// UART wiring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: PathBuf::from(DEFAULT_OUTPUT),
            capture: CaptureConfig::default(),
            reader: ReaderConfig::default(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            timeout_secs: None,
        }
    }
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            bus: 0,
            slave_select: 0,
            clock_hz: 1_000_000,
            // RST on physical pin 22 of the common RC522 wiring
            reset_pin: Some(25),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyS0".to_string(),
            // MFRC522 UART rate after reset
            baud_rate: 9600,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// A missing file is not an error; its layer is simply empty.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that deserialize fine but cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigValidation`] describing the first bad value.
    pub fn validate(&self) -> Result<()> {
        if self.output.as_os_str().is_empty() {
            return Err(Error::config_validation("output path must not be empty"));
        }
        if self.capture.poll_interval_ms == 0 {
            return Err(Error::config_validation(
                "capture.poll_interval_ms must be positive",
            ));
        }
        if self.capture.timeout_secs == Some(0) {
            return Err(Error::config_validation(
                "capture.timeout_secs must be positive when set",
            ));
        }
        if self.reader.spi.clock_hz == 0 {
            return Err(Error::config_validation("reader.spi.clock_hz must be positive"));
        }
        if self.reader.serial.baud_rate == 0 {
            return Err(Error::config_validation(
                "reader.serial.baud_rate must be positive",
            ));
        }
        if self.reader.backend == Backend::Serial && self.reader.serial.port.is_empty() {
            return Err(Error::config_validation("reader.serial.port must be set"));
        }
        Ok(())
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.capture.poll_interval_ms)
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.capture.timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.output, PathBuf::from("rfid_data.txt"));
        assert_eq!(config.reader.backend, Backend::Spi);
        assert_eq!(config.reader.spi.reset_pin, Some(25));
        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        Jail::expect_with(|_jail| {
            let config = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE_NAME,
                r#"
                output = "/var/lib/vending/card.txt"

                [capture]
                timeout_secs = 30

                [reader]
                backend = "serial"

                [reader.serial]
                port = "/dev/ttyUSB0"
                "#,
            )?;

            let config = Config::load().map_err(|e| e.to_string())?;
            assert_eq!(config.output, PathBuf::from("/var/lib/vending/card.txt"));
            assert_eq!(config.timeout(), Some(Duration::from_secs(30)));
            assert_eq!(config.reader.backend, Backend::Serial);
            assert_eq!(config.reader.serial.port, "/dev/ttyUSB0");
            assert_eq!(config.reader.serial.baud_rate, 9600);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("custom.toml", "output = \"from-file.txt\"")?;
            jail.set_env("RFID_CAPTURE_OUTPUT", "from-env.txt");
            jail.set_env("RFID_CAPTURE_READER__SPI__CLOCK_HZ", "4000000");

            let config = Config::load_from(Some(PathBuf::from("custom.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.output, PathBuf::from("from-env.txt"));
            assert_eq!(config.reader.spi.clock_hz, 4_000_000);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::default();
        config.capture.poll_interval_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(Error::ConfigValidation { .. })
        ));

        let mut config = Config::default();
        config.capture.timeout_secs = Some(0);
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.output = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.reader.backend = Backend::Serial;
        config.reader.serial.port.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        Jail::expect_with(|jail| {
            jail.create_file(CONFIG_FILE_NAME, "[capture]\npoll_interval_ms = 0")?;
            let err = Config::load().unwrap_err();
            assert!(matches!(err, Error::ConfigValidation { .. }));
            Ok(())
        });
    }

    #[test]
    fn test_backend_names() {
        assert_eq!(Backend::Spi.name(), "spi");
        assert_eq!(Backend::Serial.name(), "serial");
    }
}
