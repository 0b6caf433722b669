//! Value types shared by the event classifier, the scan aggregator and the
//! snapshot reads.
//!
//! Everything here is plain data and host-testable. Rendering rules follow the
//! conventions scripts expect: MAC addresses as `aa:bb:cc:dd:ee:ff`, IPv4
//! addresses in dotted decimal, auth modes as lowercase tokens.

use super::config::MAX_SSID_LEN;
use serde::{Serialize, Serializer};
use std::fmt;
use std::net::Ipv4Addr;

/// Length of a MAC address / BSSID in bytes.
pub const MAC_LEN: usize = 6;

/// Hardware address of a station or access point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; MAC_LEN]);

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, g
        )
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Extract an SSID from a fixed-size driver buffer.
///
/// The window is at most [`MAX_SSID_LEN`] bytes and, when the driver reports
/// a length, at most that length. A reported length is trusted as-is (SSIDs
/// may legally contain NUL bytes); without one the string ends at the first
/// NUL inside the window. Nothing past the window is ever read.
pub fn ssid_from_bytes(raw: &[u8], reported_len: Option<usize>) -> String {
    let window = &raw[..raw.len().min(MAX_SSID_LEN)];
    let ssid = match reported_len {
        Some(len) => &window[..window.len().min(len)],
        None => {
            let end = window.iter().position(|&b| b == 0).unwrap_or(window.len());
            &window[..end]
        }
    };
    String::from_utf8_lossy(ssid).into_owned()
}

/// Authentication mode of an access point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    Open,
    Wep,
    Wpa,
    Wpa2,
    WpaWpa2,
    Unknown,
}

impl AuthMode {
    /// Map a driver `wifi_auth_mode_t` value.
    ///
    /// Enterprise and WPA3 modes are reported as `Unknown`.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Open,
            1 => Self::Wep,
            2 => Self::Wpa,
            3 => Self::Wpa2,
            4 => Self::WpaWpa2,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Wep => "wep",
            Self::Wpa => "wpa",
            Self::Wpa2 => "wpa2",
            Self::WpaWpa2 => "wpa_wpa2",
            Self::Unknown => "unknown",
        }
    }

    /// Driver value for this mode (`Unknown` maps past the known range).
    pub fn to_raw(self) -> u32 {
        match self {
            Self::Open => 0,
            Self::Wep => 1,
            Self::Wpa => 2,
            Self::Wpa2 => 3,
            Self::WpaWpa2 => 4,
            Self::Unknown => u32::MAX,
        }
    }
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "wep" => Ok(Self::Wep),
            "wpa" => Ok(Self::Wpa),
            "wpa2" => Ok(Self::Wpa2),
            "wpa_wpa2" | "wpa/wpa2" => Ok(Self::WpaWpa2),
            other => Err(format!("unknown auth mode: {}", other)),
        }
    }
}

/// Radio operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WifiMode {
    #[serde(rename = "off")]
    Off,
    #[serde(rename = "sta")]
    Station,
    #[serde(rename = "ap")]
    AccessPoint,
    #[serde(rename = "sta+ap")]
    StationAccessPoint,
}

impl WifiMode {
    /// Map a driver `wifi_mode_t` value.
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Off),
            1 => Some(Self::Station),
            2 => Some(Self::AccessPoint),
            3 => Some(Self::StationAccessPoint),
            _ => None,
        }
    }

    pub fn to_raw(self) -> u32 {
        match self {
            Self::Off => 0,
            Self::Station => 1,
            Self::AccessPoint => 2,
            Self::StationAccessPoint => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Station => "sta",
            Self::AccessPoint => "ap",
            Self::StationAccessPoint => "sta+ap",
        }
    }
}

impl fmt::Display for WifiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Radio power-save setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerSave {
    None,
    MinModem,
    MaxModem,
    Unknown,
}

impl PowerSave {
    /// Map a driver `wifi_ps_type_t` value.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::None,
            1 => Self::MinModem,
            2 => Self::MaxModem,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::MinModem => "min-modem",
            Self::MaxModem => "max-modem",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PowerSave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Network interface selector for MAC / IP queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    Station,
    AccessPoint,
}

/// IPv4 configuration of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IpInfo {
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gw: Ipv4Addr,
}

/// Reason code carried by a station disconnect.
///
/// Codes 1..=67 are IEEE 802.11 reason codes; 200 and up are ESP-IDF
/// extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DisconnectReason(pub u16);

impl DisconnectReason {
    pub const UNSPECIFIED: Self = Self(1);
    pub const AUTH_EXPIRE: Self = Self(2);
    pub const AUTH_LEAVE: Self = Self(3);
    pub const ASSOC_EXPIRE: Self = Self(4);
    pub const ASSOC_LEAVE: Self = Self(8);
    pub const MIC_FAILURE: Self = Self(14);
    pub const FOURWAY_HANDSHAKE_TIMEOUT: Self = Self(15);
    pub const BEACON_TIMEOUT: Self = Self(200);
    pub const NO_AP_FOUND: Self = Self(201);
    pub const AUTH_FAIL: Self = Self(202);
    pub const ASSOC_FAIL: Self = Self(203);
    pub const HANDSHAKE_TIMEOUT: Self = Self(204);
    pub const CONNECTION_FAIL: Self = Self(205);

    /// True for reasons that mean the credentials were rejected.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            *self,
            Self::AUTH_FAIL | Self::HANDSHAKE_TIMEOUT | Self::FOURWAY_HANDSHAKE_TIMEOUT
        )
    }

    pub fn is_no_ap_found(&self) -> bool {
        *self == Self::NO_AP_FOUND
    }

    /// Human-readable label for logs.
    pub fn label(&self) -> &'static str {
        match *self {
            Self::UNSPECIFIED => "unspecified",
            Self::AUTH_EXPIRE => "auth expired",
            Self::AUTH_LEAVE => "auth leave",
            Self::ASSOC_EXPIRE => "assoc expired",
            Self::ASSOC_LEAVE => "assoc leave",
            Self::MIC_FAILURE => "MIC failure",
            Self::FOURWAY_HANDSHAKE_TIMEOUT => "4-way handshake timeout",
            Self::BEACON_TIMEOUT => "beacon timeout",
            Self::NO_AP_FOUND => "no AP found",
            Self::AUTH_FAIL => "auth failed",
            Self::ASSOC_FAIL => "assoc failed",
            Self::HANDSHAKE_TIMEOUT => "handshake timeout",
            Self::CONNECTION_FAIL => "connection failed",
            _ => "other",
        }
    }
}

// Rendered as the bare decimal code, which is what scripts compare against.
impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for DisconnectReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One access point seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessPointRecord {
    pub ssid: String,
    pub mac: MacAddr,
    pub channel: u8,
    /// Signal strength in dB, typically -110..0.
    pub rssi: i8,
    pub auth_mode: AuthMode,
}

/// Access points found by one scan pass, in the order the driver reported
/// them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ScanBatch(Vec<AccessPointRecord>);

impl ScanBatch {
    pub fn records(&self) -> &[AccessPointRecord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<AccessPointRecord> for ScanBatch {
    fn from_iter<I: IntoIterator<Item = AccessPointRecord>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
