//! Raw radio events and their classification.
//!
//! The driver raises events as an (event base, numeric id, payload) triple on
//! its own task. [`classify`] turns one of those into a [`NetworkEvent`], or
//! `None` when the event is not one the station manager acts on. It never
//! blocks and never panics; an id whose payload has the wrong shape is treated
//! as unrecognized.
//!
//! Ids follow the ESP-IDF v5 `wifi_event_t` / `ip_event_t` numbering.

use super::types::{ssid_from_bytes, AuthMode, DisconnectReason, IpInfo, MacAddr, MAC_LEN};
use log::{debug, warn};
use std::net::Ipv4Addr;

/// Event family an id belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventBase {
    Wifi,
    Ip,
}

/// `WIFI_EVENT` ids.
pub mod wifi_id {
    pub const WIFI_READY: i32 = 0;
    pub const SCAN_DONE: i32 = 1;
    pub const STA_START: i32 = 2;
    pub const STA_STOP: i32 = 3;
    pub const STA_CONNECTED: i32 = 4;
    pub const STA_DISCONNECTED: i32 = 5;
    pub const STA_AUTHMODE_CHANGE: i32 = 6;
    pub const AP_START: i32 = 12;
    pub const AP_STOP: i32 = 13;
    pub const AP_STACONNECTED: i32 = 14;
    pub const AP_STADISCONNECTED: i32 = 15;
    pub const AP_PROBEREQRECVED: i32 = 16;
}

/// `IP_EVENT` ids.
pub mod ip_id {
    pub const STA_GOT_IP: i32 = 0;
    pub const STA_LOST_IP: i32 = 1;
}

/// Event payload, copied out of the driver's buffer before it is reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawPayload {
    None,
    StaConnected {
        ssid: [u8; 32],
        ssid_len: u8,
        bssid: [u8; MAC_LEN],
        channel: u8,
        authmode: u32,
    },
    StaDisconnected {
        ssid: [u8; 32],
        ssid_len: u8,
        bssid: [u8; MAC_LEN],
        reason: u16,
    },
    AuthModeChange {
        old_mode: u32,
        new_mode: u32,
    },
    /// Addresses as octets in network order.
    GotIp {
        ip: [u8; 4],
        netmask: [u8; 4],
        gw: [u8; 4],
    },
    ApStation {
        mac: [u8; MAC_LEN],
        aid: u8,
    },
    ProbeRequest {
        mac: [u8; MAC_LEN],
        rssi: i32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub base: EventBase,
    pub id: i32,
    pub payload: RawPayload,
}

impl RawEvent {
    pub fn wifi(id: i32, payload: RawPayload) -> Self {
        Self {
            base: EventBase::Wifi,
            id,
            payload,
        }
    }

    pub fn ip(id: i32, payload: RawPayload) -> Self {
        Self {
            base: EventBase::Ip,
            id,
            payload,
        }
    }
}

/// A classified radio event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    StationStarted,
    StationConnected {
        ssid: String,
        mac: MacAddr,
        channel: u8,
    },
    StationDisconnected {
        ssid: String,
        mac: MacAddr,
        reason: DisconnectReason,
    },
    StationGotIp(IpInfo),
    StationLostIp,
    AuthModeChanged {
        old_mode: AuthMode,
        new_mode: AuthMode,
    },
    ApStationJoined {
        mac: MacAddr,
    },
    ApStationLeft {
        mac: MacAddr,
    },
    ProbeRequest {
        mac: MacAddr,
        rssi: i32,
    },
    ScanDone,
}

/// Classify a raw event. Returns `None` (and logs) for anything the station
/// manager does not act on.
pub fn classify(raw: &RawEvent) -> Option<NetworkEvent> {
    let event = match raw.base {
        EventBase::Wifi => classify_wifi(raw.id, &raw.payload),
        EventBase::Ip => classify_ip(raw.id, &raw.payload),
    };
    match &event {
        Some(event) => debug!("Classified {:?}/{}: {:?}", raw.base, raw.id, event),
        None if is_lifecycle(raw) => debug!("Ignoring {:?} event {}", raw.base, raw.id),
        None => warn!(
            "Unhandled {:?} event {} (payload {:?})",
            raw.base, raw.id, raw.payload
        ),
    }
    event
}

fn classify_wifi(id: i32, payload: &RawPayload) -> Option<NetworkEvent> {
    use wifi_id::*;
    match (id, payload) {
        (SCAN_DONE, _) => Some(NetworkEvent::ScanDone),
        (STA_START, _) => Some(NetworkEvent::StationStarted),
        (
            STA_CONNECTED,
            RawPayload::StaConnected {
                ssid,
                ssid_len,
                bssid,
                channel,
                ..
            },
        ) => Some(NetworkEvent::StationConnected {
            ssid: ssid_from_bytes(ssid, Some(*ssid_len as usize)),
            mac: MacAddr(*bssid),
            channel: *channel,
        }),
        (
            STA_DISCONNECTED,
            RawPayload::StaDisconnected {
                ssid,
                ssid_len,
                bssid,
                reason,
            },
        ) => Some(NetworkEvent::StationDisconnected {
            ssid: ssid_from_bytes(ssid, Some(*ssid_len as usize)),
            mac: MacAddr(*bssid),
            reason: DisconnectReason(*reason),
        }),
        (STA_AUTHMODE_CHANGE, RawPayload::AuthModeChange { old_mode, new_mode }) => {
            Some(NetworkEvent::AuthModeChanged {
                old_mode: AuthMode::from_raw(*old_mode),
                new_mode: AuthMode::from_raw(*new_mode),
            })
        }
        (AP_STACONNECTED, RawPayload::ApStation { mac, .. }) => {
            Some(NetworkEvent::ApStationJoined { mac: MacAddr(*mac) })
        }
        (AP_STADISCONNECTED, RawPayload::ApStation { mac, .. }) => {
            Some(NetworkEvent::ApStationLeft { mac: MacAddr(*mac) })
        }
        (AP_PROBEREQRECVED, RawPayload::ProbeRequest { mac, rssi }) => {
            Some(NetworkEvent::ProbeRequest {
                mac: MacAddr(*mac),
                rssi: *rssi,
            })
        }
        _ => None,
    }
}

fn classify_ip(id: i32, payload: &RawPayload) -> Option<NetworkEvent> {
    match (id, payload) {
        (ip_id::STA_GOT_IP, RawPayload::GotIp { ip, netmask, gw }) => {
            Some(NetworkEvent::StationGotIp(IpInfo {
                ip: Ipv4Addr::from(*ip),
                netmask: Ipv4Addr::from(*netmask),
                gw: Ipv4Addr::from(*gw),
            }))
        }
        (ip_id::STA_LOST_IP, _) => Some(NetworkEvent::StationLostIp),
        _ => None,
    }
}

/// Radio lifecycle events the manager deliberately does not track.
fn is_lifecycle(raw: &RawEvent) -> bool {
    raw.base == EventBase::Wifi
        && matches!(
            raw.id,
            wifi_id::WIFI_READY | wifi_id::STA_STOP | wifi_id::AP_START | wifi_id::AP_STOP
        )
}
