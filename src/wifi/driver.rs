//! Radio driver abstraction.
//!
//! The station manager talks to the radio only through [`RadioDriver`]. Calls
//! are non-blocking requests: their effects are reported later as raw events.
//! Implementations must not raise events synchronously from inside a call,
//! since the manager holds its lock across driver calls.

use super::config::{ScanOptions, WifiConfig};
use super::types::{Interface, IpInfo, MacAddr, PowerSave, WifiMode, MAC_LEN};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A radio call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{op} failed (code {code:#x})")]
pub struct DriverError {
    /// Name of the driver call.
    pub op: &'static str,
    /// Driver status code.
    pub code: i32,
}

impl DriverError {
    pub fn new(op: &'static str, code: i32) -> Self {
        Self { op, code }
    }
}

/// Access point record as the driver reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawApRecord {
    pub ssid: [u8; 32],
    pub bssid: [u8; MAC_LEN],
    pub channel: u8,
    pub rssi: i8,
    pub authmode: u32,
}

/// Station credentials as stored in the driver.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RawStationConfig {
    #[zeroize(skip)]
    pub ssid: [u8; 32],
    pub password: [u8; 64],
}

impl RawStationConfig {
    pub fn has_password(&self) -> bool {
        self.password[0] != 0
    }
}

impl Default for RawStationConfig {
    fn default() -> Self {
        Self {
            ssid: [0; 32],
            password: [0; 64],
        }
    }
}

impl std::fmt::Debug for RawStationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawStationConfig")
            .field("ssid", &super::types::ssid_from_bytes(&self.ssid, None))
            .field("has_password", &self.has_password())
            .finish()
    }
}

/// Operations the station manager needs from the radio.
pub trait RadioDriver: Send {
    fn set_mode(&mut self, mode: WifiMode) -> Result<(), DriverError>;

    /// Start the radio. Raises `STA_START` once the station interface is up.
    fn start(&mut self) -> Result<(), DriverError>;

    fn set_station_config(&mut self, config: &WifiConfig) -> Result<(), DriverError>;

    /// Begin association with the configured network.
    fn connect(&mut self) -> Result<(), DriverError>;

    fn disconnect(&mut self) -> Result<(), DriverError>;

    /// Begin a non-blocking scan. Raises `SCAN_DONE` when finished.
    fn scan_start(&mut self, options: &ScanOptions) -> Result<(), DriverError>;

    /// Number of records held from the last scan.
    fn ap_count(&mut self) -> Result<u16, DriverError>;

    /// Fetch up to `max` records from the last scan in one call, releasing
    /// the driver's copy.
    fn ap_records(&mut self, max: u16) -> Result<Vec<RawApRecord>, DriverError>;

    fn mac(&self, interface: Interface) -> Result<MacAddr, DriverError>;

    /// `None` when the interface has no address.
    fn ip_info(&self, interface: Interface) -> Result<Option<IpInfo>, DriverError>;

    fn mode(&self) -> Result<WifiMode, DriverError>;

    fn power_save(&self) -> Result<PowerSave, DriverError>;

    fn station_config(&self) -> Result<RawStationConfig, DriverError>;
}
