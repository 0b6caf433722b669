//! ESP-IDF radio driver.
//!
//! [`EspRadio`] drives the station through `esp-idf-svc`'s [`EspWifi`]. Its
//! calls only post requests to the WiFi task; results come back through the
//! system event loop, which [`EventSubscription`] forwards as [`RawEvent`]s.

use super::config::{ScanOptions, WifiConfig};
use super::driver::{DriverError, RadioDriver, RawApRecord, RawStationConfig};
use super::event::{ip_id, wifi_id, RawEvent, RawPayload};
use super::types::{Interface, IpInfo, MacAddr, PowerSave, WifiMode};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::eventloop::{EspSubscription, EspSystemEventLoop, System};
use esp_idf_svc::ipv4;
use esp_idf_svc::netif::IpEvent;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::config::ScanConfig;
use esp_idf_svc::wifi::{
    AccessPointConfiguration, AccessPointInfo, AuthMethod, ClientConfiguration, Configuration,
    EspWifi, WifiEvent,
};
use esp_idf_sys::EspError;
use log::{debug, info};
use std::net::Ipv4Addr;
use std::sync::Arc;

fn esp_err(op: &'static str) -> impl FnOnce(EspError) -> DriverError {
    move |e| DriverError::new(op, e.code())
}

fn invalid_arg(op: &'static str) -> DriverError {
    DriverError::new(op, esp_idf_sys::ESP_ERR_INVALID_ARG as i32)
}

fn netmask(mask: ipv4::Mask) -> Ipv4Addr {
    let prefix = u32::from(mask.0.min(32));
    if prefix == 0 {
        Ipv4Addr::UNSPECIFIED
    } else {
        Ipv4Addr::from(u32::MAX << (32 - prefix))
    }
}

// Raw `wifi_auth_mode_t` numbering, as carried by connect events.
fn auth_method_raw(method: Option<AuthMethod>) -> u32 {
    match method {
        Some(AuthMethod::None) => 0,
        Some(AuthMethod::WEP) => 1,
        Some(AuthMethod::WPA) => 2,
        Some(AuthMethod::WPA2Personal) => 3,
        Some(AuthMethod::WPAWPA2Personal) => 4,
        _ => 5,
    }
}

fn ssid_window(raw: &[u8]) -> [u8; 32] {
    let mut ssid = [0u8; 32];
    let len = raw.len().min(32);
    ssid[..len].copy_from_slice(&raw[..len]);
    ssid
}

impl From<&AccessPointInfo> for RawApRecord {
    fn from(ap: &AccessPointInfo) -> Self {
        Self {
            ssid: ssid_window(ap.ssid.as_bytes()),
            bssid: ap.bssid,
            channel: ap.channel,
            rssi: ap.signal_strength,
            authmode: auth_method_raw(ap.auth_method),
        }
    }
}

/// ESP32 WiFi radio.
pub struct EspRadio {
    wifi: EspWifi<'static>,
    /// Records read by the last `ap_count`, handed out by `ap_records`.
    scan_results: Vec<RawApRecord>,
}

impl EspRadio {
    /// Initialize the WiFi driver and its network interfaces.
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        nvs: Option<EspDefaultNvsPartition>,
    ) -> Result<Self, EspError> {
        let wifi = EspWifi::new(modem, sysloop, nvs)?;
        info!("WiFi driver initialized");
        Ok(Self {
            wifi,
            scan_results: Vec::new(),
        })
    }

    fn configuration(&self) -> Result<Configuration, DriverError> {
        self.wifi
            .get_configuration()
            .map_err(esp_err("esp_wifi_get_config"))
    }
}

impl RadioDriver for EspRadio {
    fn set_mode(&mut self, mode: WifiMode) -> Result<(), DriverError> {
        let (client, ap) = match self.configuration()? {
            Configuration::Client(client) => (client, AccessPointConfiguration::default()),
            Configuration::AccessPoint(ap) => (ClientConfiguration::default(), ap),
            Configuration::Mixed(client, ap) => (client, ap),
            _ => Default::default(),
        };
        let next = match mode {
            WifiMode::Off => Configuration::None,
            WifiMode::Station => Configuration::Client(client),
            WifiMode::AccessPoint => Configuration::AccessPoint(ap),
            WifiMode::StationAccessPoint => Configuration::Mixed(client, ap),
        };
        self.wifi
            .set_configuration(&next)
            .map_err(esp_err("esp_wifi_set_mode"))
    }

    fn start(&mut self) -> Result<(), DriverError> {
        self.wifi.start().map_err(esp_err("esp_wifi_start"))
    }

    fn set_station_config(&mut self, config: &WifiConfig) -> Result<(), DriverError> {
        let auth_method = if config.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let station = Configuration::Client(ClientConfiguration {
            ssid: config
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| invalid_arg("esp_wifi_set_config"))?,
            password: config
                .password
                .as_str()
                .try_into()
                .map_err(|_| invalid_arg("esp_wifi_set_config"))?,
            auth_method,
            ..Default::default()
        });
        self.wifi
            .set_configuration(&station)
            .map_err(esp_err("esp_wifi_set_config"))
    }

    fn connect(&mut self) -> Result<(), DriverError> {
        self.wifi.connect().map_err(esp_err("esp_wifi_connect"))
    }

    fn disconnect(&mut self) -> Result<(), DriverError> {
        self.wifi.disconnect().map_err(esp_err("esp_wifi_disconnect"))
    }

    fn scan_start(&mut self, options: &ScanOptions) -> Result<(), DriverError> {
        let scan = ScanConfig {
            channel: (options.channel != 0).then_some(options.channel),
            show_hidden: options.show_hidden,
            ..Default::default()
        };
        self.wifi
            .start_scan(&scan, false)
            .map_err(esp_err("esp_wifi_scan_start"))
    }

    // The svc scan API reads the count and the records in one call and
    // releases the driver's list; the records wait here for `ap_records`.
    fn ap_count(&mut self) -> Result<u16, DriverError> {
        let found = self
            .wifi
            .get_scan_result()
            .map_err(esp_err("esp_wifi_scan_get_ap_records"))?;
        self.scan_results = found.iter().map(RawApRecord::from).collect();
        Ok(u16::try_from(self.scan_results.len()).unwrap_or(u16::MAX))
    }

    fn ap_records(&mut self, max: u16) -> Result<Vec<RawApRecord>, DriverError> {
        let mut records = std::mem::take(&mut self.scan_results);
        records.truncate(usize::from(max));
        Ok(records)
    }

    fn mac(&self, interface: Interface) -> Result<MacAddr, DriverError> {
        let netif = match interface {
            Interface::Station => self.wifi.sta_netif(),
            Interface::AccessPoint => self.wifi.ap_netif(),
        };
        netif
            .get_mac()
            .map(MacAddr)
            .map_err(esp_err("esp_wifi_get_mac"))
    }

    fn ip_info(&self, interface: Interface) -> Result<Option<IpInfo>, DriverError> {
        let netif = match interface {
            Interface::Station => self.wifi.sta_netif(),
            Interface::AccessPoint => self.wifi.ap_netif(),
        };
        let info = netif
            .get_ip_info()
            .map_err(esp_err("esp_netif_get_ip_info"))?;
        if info.ip.is_unspecified() {
            return Ok(None);
        }
        Ok(Some(IpInfo {
            ip: Ipv4Addr::from(info.ip.octets()),
            netmask: netmask(info.subnet.mask),
            gw: Ipv4Addr::from(info.subnet.gateway.octets()),
        }))
    }

    fn mode(&self) -> Result<WifiMode, DriverError> {
        Ok(match self.configuration()? {
            Configuration::Client(_) => WifiMode::Station,
            Configuration::AccessPoint(_) => WifiMode::AccessPoint,
            Configuration::Mixed(_, _) => WifiMode::StationAccessPoint,
            _ => WifiMode::Off,
        })
    }

    // esp-idf-svc has no getter for the power-save mode.
    fn power_save(&self) -> Result<PowerSave, DriverError> {
        let mut ps: esp_idf_sys::wifi_ps_type_t = 0;
        esp_idf_sys::esp!(unsafe { esp_idf_sys::esp_wifi_get_ps(&mut ps) })
            .map_err(esp_err("esp_wifi_get_ps"))?;
        Ok(PowerSave::from_raw(ps as u32))
    }

    fn station_config(&self) -> Result<RawStationConfig, DriverError> {
        let mut config = RawStationConfig::default();
        if let Configuration::Client(client) | Configuration::Mixed(client, _) =
            self.configuration()?
        {
            config.ssid = ssid_window(client.ssid.as_bytes());
            let password = client.password.as_bytes();
            config.password[..password.len()].copy_from_slice(password);
        }
        Ok(config)
    }
}

/// Forwards WiFi and IP events from the system event loop to a handler until
/// dropped.
pub struct EventSubscription {
    _wifi: EspSubscription<'static, System>,
    _ip: EspSubscription<'static, System>,
}

impl EventSubscription {
    /// Subscribe `handler` to every WiFi and IP event. It runs on the event
    /// loop task.
    pub fn new<F>(sysloop: &EspSystemEventLoop, handler: F) -> Result<Self, DriverError>
    where
        F: Fn(RawEvent) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);

        let on_wifi = Arc::clone(&handler);
        let wifi = sysloop
            .subscribe::<WifiEvent, _>(move |event| {
                if let Some(raw) = wifi_raw_event(&event) {
                    on_wifi(raw);
                }
            })
            .map_err(esp_err("esp_event_handler_register"))?;

        let on_ip = handler;
        let ip = sysloop
            .subscribe::<IpEvent, _>(move |event| {
                if let Some(raw) = ip_raw_event(&event) {
                    on_ip(raw);
                }
            })
            .map_err(esp_err("esp_event_handler_register"))?;

        debug!("Subscribed to WiFi and IP events");
        Ok(Self {
            _wifi: wifi,
            _ip: ip,
        })
    }
}

fn wifi_raw_event(event: &WifiEvent<'_>) -> Option<RawEvent> {
    let (id, payload) = match event {
        WifiEvent::Ready => (wifi_id::WIFI_READY, RawPayload::None),
        WifiEvent::ScanDone(..) => (wifi_id::SCAN_DONE, RawPayload::None),
        WifiEvent::StaStarted => (wifi_id::STA_START, RawPayload::None),
        WifiEvent::StaStopped => (wifi_id::STA_STOP, RawPayload::None),
        WifiEvent::StaConnected(e) => (
            wifi_id::STA_CONNECTED,
            RawPayload::StaConnected {
                ssid: ssid_window(&e.ssid),
                ssid_len: e.ssid_len,
                bssid: e.bssid,
                channel: e.channel,
                authmode: e.authmode as u32,
            },
        ),
        WifiEvent::StaDisconnected(e) => (
            wifi_id::STA_DISCONNECTED,
            RawPayload::StaDisconnected {
                ssid: ssid_window(&e.ssid),
                ssid_len: e.ssid_len,
                bssid: e.bssid,
                reason: e.reason.into(),
            },
        ),
        WifiEvent::StaAuthmodeChanged(e) => (
            wifi_id::STA_AUTHMODE_CHANGE,
            RawPayload::AuthModeChange {
                old_mode: e.old_mode as u32,
                new_mode: e.new_mode as u32,
            },
        ),
        WifiEvent::ApStarted => (wifi_id::AP_START, RawPayload::None),
        WifiEvent::ApStopped => (wifi_id::AP_STOP, RawPayload::None),
        WifiEvent::ApStaConnected(e) => (
            wifi_id::AP_STACONNECTED,
            RawPayload::ApStation {
                mac: e.mac,
                aid: e.aid as u8,
            },
        ),
        WifiEvent::ApStaDisconnected(e) => (
            wifi_id::AP_STADISCONNECTED,
            RawPayload::ApStation {
                mac: e.mac,
                aid: e.aid as u8,
            },
        ),
        WifiEvent::ApProbeRequestReceived(e) => (
            wifi_id::AP_PROBEREQRECVED,
            RawPayload::ProbeRequest {
                mac: e.mac,
                rssi: e.rssi as i32,
            },
        ),
        other => {
            debug!("Unhandled WiFi event: {:?}", other);
            return None;
        }
    };
    Some(RawEvent::wifi(id, payload))
}

fn ip_raw_event(event: &IpEvent<'_>) -> Option<RawEvent> {
    match event {
        IpEvent::DhcpIpAssigned(assignment) => {
            let info = assignment.ip_info();
            Some(RawEvent::ip(
                ip_id::STA_GOT_IP,
                RawPayload::GotIp {
                    ip: info.ip.octets(),
                    netmask: netmask(info.subnet.mask).octets(),
                    gw: info.subnet.gateway.octets(),
                },
            ))
        }
        IpEvent::DhcpIpDeassigned(..) => Some(RawEvent::ip(ip_id::STA_LOST_IP, RawPayload::None)),
        other => {
            debug!("Unhandled IP event: {:?}", other);
            None
        }
    }
}
