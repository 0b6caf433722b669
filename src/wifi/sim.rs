//! Host-side simulated radio.
//!
//! [`SimulatedRadio`] implements [`RadioDriver`] against a fixed list of
//! access points. Each call is recorded, and the events a real radio would
//! raise are queued instead of being delivered; the owner drains them with
//! [`SimulatedRadio::take_events`] and feeds them to the station manager,
//! the same way the ESP-IDF event task would.
//!
//! ```
//! use esp32_wifi_station::wifi::sim::{SimulatedAp, SimulatedRadio};
//! use esp32_wifi_station::wifi::RadioDriver;
//!
//! let mut radio = SimulatedRadio::new(vec!["cafe:-48:open".parse().unwrap()]);
//! radio.start().unwrap();
//! assert_eq!(radio.take_events().len(), 1); // STA_START
//! ```

use super::config::{ScanOptions, WifiConfig, MAX_SSID_LEN};
use super::driver::{DriverError, RadioDriver, RawApRecord, RawStationConfig};
use super::event::{ip_id, wifi_id, RawEvent, RawPayload};
use super::types::{
    ssid_from_bytes, AuthMode, DisconnectReason, Interface, IpInfo, MacAddr, PowerSave, WifiMode,
};
use log::debug;
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// `ESP_ERR_WIFI_NOT_STARTED`.
pub const ERR_NOT_STARTED: i32 = 0x3002;

const STATION_MAC: MacAddr = MacAddr([0x24, 0x0a, 0xc4, 0x00, 0x00, 0x01]);
const AP_MAC: MacAddr = MacAddr([0x24, 0x0a, 0xc4, 0x00, 0x00, 0x02]);

/// An access point the simulated radio can see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedAp {
    pub ssid: String,
    pub rssi: i8,
    pub channel: u8,
    pub auth_mode: AuthMode,
    /// Required password; `None` accepts any credentials.
    pub password: Option<String>,
}

impl SimulatedAp {
    pub fn open(ssid: &str, rssi: i8) -> Self {
        Self {
            ssid: ssid.to_string(),
            rssi,
            channel: 6,
            auth_mode: AuthMode::Open,
            password: None,
        }
    }

    pub fn secured(ssid: &str, rssi: i8, auth_mode: AuthMode, password: &str) -> Self {
        Self {
            ssid: ssid.to_string(),
            rssi,
            channel: 6,
            auth_mode,
            password: Some(password.to_string()),
        }
    }

    fn accepts(&self, password: &str) -> bool {
        self.password.as_deref().map_or(true, |expected| expected == password)
    }
}

/// Parses `SSID:RSSI:AUTH[:PASSWORD]`, e.g. `home:-52:wpa2:hunter22`.
impl FromStr for SimulatedAp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(4, ':');
        let ssid = parts.next().filter(|ssid| !ssid.is_empty());
        let rssi = parts.next();
        let auth = parts.next();
        let (ssid, rssi, auth) = match (ssid, rssi, auth) {
            (Some(ssid), Some(rssi), Some(auth)) => (ssid, rssi, auth),
            _ => return Err(format!("expected SSID:RSSI:AUTH[:PASSWORD], got {:?}", s)),
        };
        if ssid.len() > MAX_SSID_LEN {
            return Err(format!("SSID {:?} is longer than {} bytes", ssid, MAX_SSID_LEN));
        }
        let rssi: i8 = rssi
            .parse()
            .map_err(|e| format!("invalid RSSI {:?}: {}", rssi, e))?;
        let auth_mode: AuthMode = auth.parse()?;

        match (auth_mode, parts.next()) {
            (AuthMode::Open, _) => Ok(Self::open(ssid, rssi)),
            (mode, Some(password)) => Ok(Self::secured(ssid, rssi, mode, password)),
            (mode, None) => Err(format!("{} network {:?} needs a password", mode, ssid)),
        }
    }
}

/// A driver call, as recorded by the simulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    SetMode(WifiMode),
    Start,
    SetStationConfig { ssid: String },
    Connect,
    Disconnect,
    ScanStart(ScanOptions),
    ApCount,
    ApRecords(u16),
}

/// In-memory [`RadioDriver`].
#[derive(Debug)]
pub struct SimulatedRadio {
    networks: Vec<SimulatedAp>,
    mode: WifiMode,
    started: bool,
    station: RawStationConfig,
    associated: Option<usize>,
    ip: Option<IpInfo>,
    scan_results: Vec<RawApRecord>,
    events: VecDeque<RawEvent>,
    calls: Vec<DriverCall>,
    failures: HashMap<&'static str, i32>,
}

impl SimulatedRadio {
    pub fn new(networks: Vec<SimulatedAp>) -> Self {
        Self {
            networks,
            mode: WifiMode::Off,
            started: false,
            station: RawStationConfig::default(),
            associated: None,
            ip: None,
            scan_results: Vec::new(),
            events: VecDeque::new(),
            calls: Vec::new(),
            failures: HashMap::new(),
        }
    }

    /// Drain the events raised since the last call.
    pub fn take_events(&mut self) -> Vec<RawEvent> {
        self.events.drain(..).collect()
    }

    /// Queue an arbitrary event, e.g. a lease loss.
    pub fn raise(&mut self, event: RawEvent) {
        self.events.push_back(event);
    }

    pub fn calls(&self) -> &[DriverCall] {
        &self.calls
    }

    /// Make the next call to `op` (named after the ESP-IDF function) fail
    /// with `code`.
    pub fn fail_next(&mut self, op: &'static str, code: i32) {
        self.failures.insert(op, code);
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    fn call(&mut self, op: &'static str, call: DriverCall) -> Result<(), DriverError> {
        debug!("sim: {:?}", call);
        self.calls.push(call);
        match self.failures.remove(op) {
            Some(code) => Err(DriverError::new(op, code)),
            None => Ok(()),
        }
    }

    fn require_started(&self, op: &'static str) -> Result<(), DriverError> {
        if self.started {
            Ok(())
        } else {
            Err(DriverError::new(op, ERR_NOT_STARTED))
        }
    }

    fn bssid(index: usize) -> [u8; 6] {
        [0x02, 0x00, 0x5e, 0x00, 0x00, (index + 1) as u8]
    }

    fn leave(&mut self) {
        if let Some(index) = self.associated.take() {
            self.ip = None;
            let ap = &self.networks[index];
            self.events.push_back(disconnected_event(
                ap.ssid.as_bytes(),
                Self::bssid(index),
                DisconnectReason::ASSOC_LEAVE,
            ));
        }
    }
}

fn ssid_buffer(ssid: &[u8]) -> ([u8; 32], u8) {
    let mut buf = [0u8; 32];
    let len = ssid.len().min(MAX_SSID_LEN);
    buf[..len].copy_from_slice(&ssid[..len]);
    (buf, len as u8)
}

fn disconnected_event(ssid: &[u8], bssid: [u8; 6], reason: DisconnectReason) -> RawEvent {
    let (ssid, ssid_len) = ssid_buffer(ssid);
    RawEvent::wifi(
        wifi_id::STA_DISCONNECTED,
        RawPayload::StaDisconnected {
            ssid,
            ssid_len,
            bssid,
            reason: reason.0,
        },
    )
}

impl RadioDriver for SimulatedRadio {
    fn set_mode(&mut self, mode: WifiMode) -> Result<(), DriverError> {
        self.call("esp_wifi_set_mode", DriverCall::SetMode(mode))?;
        self.mode = mode;
        Ok(())
    }

    fn start(&mut self) -> Result<(), DriverError> {
        self.call("esp_wifi_start", DriverCall::Start)?;
        if !self.started {
            self.started = true;
            self.events
                .push_back(RawEvent::wifi(wifi_id::STA_START, RawPayload::None));
        }
        Ok(())
    }

    fn set_station_config(&mut self, config: &WifiConfig) -> Result<(), DriverError> {
        self.call(
            "esp_wifi_set_config",
            DriverCall::SetStationConfig {
                ssid: config.ssid.clone(),
            },
        )?;
        let mut station = RawStationConfig::default();
        station.ssid = ssid_buffer(config.ssid.as_bytes()).0;
        let password = config.password.as_bytes();
        station.password[..password.len()].copy_from_slice(password);
        self.station = station;
        Ok(())
    }

    fn connect(&mut self) -> Result<(), DriverError> {
        self.call("esp_wifi_connect", DriverCall::Connect)?;
        self.require_started("esp_wifi_connect")?;
        self.leave();

        let ssid = ssid_from_bytes(&self.station.ssid, None);
        let password_len = self
            .station
            .password
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.station.password.len());
        let password = String::from_utf8_lossy(&self.station.password[..password_len]).into_owned();

        let Some(index) = self.networks.iter().position(|ap| ap.ssid == ssid) else {
            self.events.push_back(disconnected_event(
                ssid.as_bytes(),
                [0; 6],
                DisconnectReason::NO_AP_FOUND,
            ));
            return Ok(());
        };

        let ap = &self.networks[index];
        if !ap.accepts(&password) {
            self.events.push_back(disconnected_event(
                ssid.as_bytes(),
                Self::bssid(index),
                DisconnectReason::AUTH_FAIL,
            ));
            return Ok(());
        }

        let (ssid_buf, ssid_len) = ssid_buffer(ap.ssid.as_bytes());
        self.events.push_back(RawEvent::wifi(
            wifi_id::STA_CONNECTED,
            RawPayload::StaConnected {
                ssid: ssid_buf,
                ssid_len,
                bssid: Self::bssid(index),
                channel: ap.channel,
                authmode: ap.auth_mode.to_raw(),
            },
        ));

        let info = IpInfo {
            ip: Ipv4Addr::new(192, 168, 1, 100 + index as u8),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            gw: Ipv4Addr::new(192, 168, 1, 1),
        };
        self.events.push_back(RawEvent::ip(
            ip_id::STA_GOT_IP,
            RawPayload::GotIp {
                ip: info.ip.octets(),
                netmask: info.netmask.octets(),
                gw: info.gw.octets(),
            },
        ));
        self.associated = Some(index);
        self.ip = Some(info);
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), DriverError> {
        self.call("esp_wifi_disconnect", DriverCall::Disconnect)?;
        self.require_started("esp_wifi_disconnect")?;
        self.leave();
        Ok(())
    }

    fn scan_start(&mut self, options: &ScanOptions) -> Result<(), DriverError> {
        self.call("esp_wifi_scan_start", DriverCall::ScanStart(*options))?;
        self.require_started("esp_wifi_scan_start")?;
        self.scan_results = self
            .networks
            .iter()
            .enumerate()
            .filter(|(_, ap)| options.channel == 0 || ap.channel == options.channel)
            .map(|(index, ap)| RawApRecord {
                ssid: ssid_buffer(ap.ssid.as_bytes()).0,
                bssid: Self::bssid(index),
                channel: ap.channel,
                rssi: ap.rssi,
                authmode: ap.auth_mode.to_raw(),
            })
            .collect();
        self.events
            .push_back(RawEvent::wifi(wifi_id::SCAN_DONE, RawPayload::None));
        Ok(())
    }

    fn ap_count(&mut self) -> Result<u16, DriverError> {
        self.call("esp_wifi_scan_get_ap_num", DriverCall::ApCount)?;
        Ok(self.scan_results.len() as u16)
    }

    fn ap_records(&mut self, max: u16) -> Result<Vec<RawApRecord>, DriverError> {
        self.call("esp_wifi_scan_get_ap_records", DriverCall::ApRecords(max))?;
        let mut records = std::mem::take(&mut self.scan_results);
        records.truncate(max as usize);
        Ok(records)
    }

    fn mac(&self, interface: Interface) -> Result<MacAddr, DriverError> {
        Ok(match interface {
            Interface::Station => STATION_MAC,
            Interface::AccessPoint => AP_MAC,
        })
    }

    fn ip_info(&self, interface: Interface) -> Result<Option<IpInfo>, DriverError> {
        Ok(match interface {
            Interface::Station => self.ip,
            Interface::AccessPoint => None,
        })
    }

    fn mode(&self) -> Result<WifiMode, DriverError> {
        Ok(self.mode)
    }

    fn power_save(&self) -> Result<PowerSave, DriverError> {
        Ok(PowerSave::MinModem)
    }

    fn station_config(&self) -> Result<RawStationConfig, DriverError> {
        Ok(self.station.clone())
    }
}
