//! WiFi configuration data structures.
//!
//! Platform-independent types for station credentials, scan parameters and
//! manager settings, testable on the host machine.
//!
//! # Example
//!
//! ```
//! use esp32_wifi_station::wifi::{ConnectOptions, ManagerConfig, WifiConfig};
//!
//! let options = ConnectOptions::with_password("hunter22");
//! let config = WifiConfig::from_options("MyNetwork", &options).unwrap();
//! assert!(!config.is_open());
//!
//! assert!(ManagerConfig::default().validate().is_ok());
//! ```

use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Maximum SSID length per IEEE 802.11 standard.
pub const MAX_SSID_LEN: usize = 32;

/// Maximum password length (64 hex digits of a raw PSK).
pub const MAX_PASSWORD_LEN: usize = 64;

/// Highest 2.4 GHz channel a scan may be restricted to.
pub const MAX_CHANNEL: u8 = 14;

/// Station credentials handed to the radio.
///
/// The password is wiped from memory when the value is dropped. No minimum
/// password length is enforced; the access point decides what it accepts.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct WifiConfig {
    /// Network SSID (1-32 bytes).
    #[zeroize(skip)]
    pub ssid: String,
    /// Network password (0-64 bytes, empty for open networks).
    pub password: String,
}

impl WifiConfig {
    /// Create a new WiFi configuration.
    ///
    /// Returns an error if SSID or password are invalid.
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Result<Self, ConfigError> {
        let config = Self {
            ssid: ssid.into(),
            password: password.into(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Create a configuration for an open network (no password).
    pub fn open(ssid: impl Into<String>) -> Result<Self, ConfigError> {
        Self::new(ssid, String::new())
    }

    /// Build credentials from a `connect` call.
    pub fn from_options(ssid: &str, options: &ConnectOptions) -> Result<Self, ConfigError> {
        match &options.password {
            Some(password) => Self::new(ssid, password.as_str()),
            None => Self::open(ssid),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() {
            return Err(ConfigError::SsidEmpty);
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(ConfigError::SsidTooLong {
                len: self.ssid.len(),
                max: MAX_SSID_LEN,
            });
        }
        if self.password.len() > MAX_PASSWORD_LEN {
            return Err(ConfigError::PasswordTooLong {
                len: self.password.len(),
                max: MAX_PASSWORD_LEN,
            });
        }
        Ok(())
    }

    /// Check if this is an open network (no password).
    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

impl fmt::Debug for WifiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WifiConfig")
            .field("ssid", &self.ssid)
            .field("password", &if self.is_open() { "" } else { "<redacted>" })
            .finish()
    }
}

/// Options accepted by `connect`.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ConnectOptions {
    /// `None` connects to an open network.
    pub password: Option<String>,
}

impl ConnectOptions {
    pub fn with_password(password: impl Into<String>) -> Self {
        Self {
            password: Some(password.into()),
        }
    }
}

impl fmt::Debug for ConnectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectOptions")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Parameters for a non-blocking scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Include access points that hide their SSID.
    pub show_hidden: bool,
    /// Restrict the scan to one channel; 0 scans all channels.
    pub channel: u8,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            show_hidden: true,
            channel: 0,
        }
    }
}

/// Settings for a [`WifiStation`](super::WifiStation).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Parameters used for every scan.
    pub scan: ScanOptions,
    /// Resolve a pending connect with `"Bad password"` when the station is
    /// disconnected for an authentication failure. Off by default, in which
    /// case a failed connect only shows up in `details().status`.
    pub report_auth_failure: bool,
}

impl ManagerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan.channel > MAX_CHANNEL {
            return Err(ConfigError::InvalidChannel(self.scan.channel));
        }
        Ok(())
    }
}

/// Station status as reported by `details()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StationStatus {
    /// No connection attempt is active.
    Off,
    /// Starting the radio, associating, or waiting for an address.
    Connecting,
    /// The last attempt was rejected by the access point.
    WrongPassword,
    /// The last attempt found no access point with the SSID.
    NoApFound,
    /// The last attempt failed for another reason.
    ConnectFail,
    /// Associated with an IP address.
    Connected,
}

impl StationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Connecting => "connecting",
            Self::WrongPassword => "wrong_password",
            Self::NoApFound => "no_ap_found",
            Self::ConnectFail => "connect_fail",
            Self::Connected => "connected",
        }
    }
}

impl fmt::Display for StationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("SSID cannot be empty")]
    SsidEmpty,
    #[error("SSID too long: {len} bytes (max {max})")]
    SsidTooLong { len: usize, max: usize },
    #[error("password too long: {len} bytes (max {max})")]
    PasswordTooLong { len: usize, max: usize },
    #[error("invalid scan channel: {0} (max {max})", max = MAX_CHANNEL)]
    InvalidChannel(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== WifiConfig Tests ====================

    #[test]
    fn test_valid_config() {
        let config = WifiConfig::new("TestNetwork", "password123").unwrap();
        assert_eq!(config.ssid, "TestNetwork");
        assert_eq!(config.password, "password123");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_open_network() {
        let config = WifiConfig::open("OpenNetwork").unwrap();
        assert!(config.is_open());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_ssid() {
        let result = WifiConfig::new("", "password123");
        assert_eq!(result, Err(ConfigError::SsidEmpty));
    }

    #[test]
    fn test_ssid_too_long() {
        let long_ssid = "a".repeat(33);
        let result = WifiConfig::new(long_ssid, "password123");
        assert!(matches!(result, Err(ConfigError::SsidTooLong { len: 33, max: 32 })));
    }

    #[test]
    fn test_ssid_max_length() {
        let max_ssid = "a".repeat(32);
        assert!(WifiConfig::new(max_ssid, "password123").is_ok());
    }

    #[test]
    fn test_short_password_accepted() {
        let config = WifiConfig::new("TestNetwork", "x").unwrap();
        assert!(!config.is_open());
    }

    #[test]
    fn test_password_too_long() {
        let long_password = "a".repeat(65);
        let result = WifiConfig::new("TestNetwork", long_password);
        assert!(matches!(result, Err(ConfigError::PasswordTooLong { .. })));
    }

    #[test]
    fn test_password_max_length() {
        let max_password = "a".repeat(64);
        assert!(WifiConfig::new("TestNetwork", max_password).is_ok());
    }

    #[test]
    fn test_debug_redacts_password() {
        let config = WifiConfig::new("Net", "secret-pass").unwrap();
        let rendered = format!("{:?}", config);
        assert!(rendered.contains("Net"));
        assert!(!rendered.contains("secret-pass"));

        let options = ConnectOptions::with_password("secret-pass");
        assert!(!format!("{:?}", options).contains("secret-pass"));
    }

    #[test]
    fn test_from_options() {
        let open = WifiConfig::from_options("Cafe", &ConnectOptions::default()).unwrap();
        assert!(open.is_open());

        let secured =
            WifiConfig::from_options("Home", &ConnectOptions::with_password("pw")).unwrap();
        assert_eq!(secured.password, "pw");

        assert_eq!(
            WifiConfig::from_options("", &ConnectOptions::default()),
            Err(ConfigError::SsidEmpty)
        );
    }

    // ==================== ManagerConfig Tests ====================

    #[test]
    fn test_default_manager_config() {
        let config = ManagerConfig::default();
        assert!(config.scan.show_hidden);
        assert_eq!(config.scan.channel, 0);
        assert!(!config.report_auth_failure);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_scan_channel() {
        let mut config = ManagerConfig::default();
        config.scan.channel = 14;
        assert!(config.validate().is_ok());
        config.scan.channel = 15;
        assert_eq!(config.validate(), Err(ConfigError::InvalidChannel(15)));
    }

    // ==================== StationStatus Tests ====================

    #[test]
    fn test_status_strings() {
        for status in [
            StationStatus::Off,
            StationStatus::Connecting,
            StationStatus::WrongPassword,
            StationStatus::NoApFound,
            StationStatus::ConnectFail,
            StationStatus::Connected,
        ] {
            assert_eq!(status.to_string(), status.as_str());
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{}\"", status.as_str())
            );
        }
        assert_eq!(StationStatus::NoApFound.to_string(), "no_ap_found");
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(ConfigError::SsidEmpty.to_string(), "SSID cannot be empty");
        assert_eq!(
            ConfigError::InvalidChannel(20).to_string(),
            "invalid scan channel: 20 (max 14)"
        );
    }
}
