//! Connection state machine.
//!
//! [`WifiStation`] owns the station state, the completion registry and the
//! radio driver behind one mutex. API calls (`connect`, `disconnect`, `scan`)
//! come from the caller's context; [`WifiStation::handle_event`] is called
//! from the driver's event context. Both take the same lock, so they never
//! interleave mid-transition. Completions and notifications are handed to the
//! [`EventSink`] and run later, outside the lock.
//!
//! # State transitions
//!
//! | From | Input | To |
//! |------|-------|----|
//! | any | `connect` | StationStarting |
//! | StationStarting | station started | Connecting (connect target) / Idle |
//! | any | associated | Associated |
//! | Associated | got IP | IpAcquired, connect resolves |
//! | IpAcquired | got IP | IpAcquired (lease renewed, `connected` re-sent) |
//! | IpAcquired | lost IP | Associated |
//! | any | disconnected | Idle, disconnect resolves |
//! | any | `disconnect` | Disconnecting (Idle at once if there is no link) |
//! | Idle | `scan` | StationStarting while the station interface comes up |
//!
//! # Example
//!
//! ```
//! use esp32_wifi_station::wifi::delivery::channel;
//! use esp32_wifi_station::wifi::sim::{SimulatedAp, SimulatedRadio};
//! use esp32_wifi_station::wifi::{
//!     CompletionHandle, ConnectOptions, ConnectionState, ManagerConfig, WifiStation,
//! };
//!
//! let radio = SimulatedRadio::new(vec![SimulatedAp::open("cafe", -50)]);
//! let (sink, mut dispatcher) = channel();
//! let station = WifiStation::new(radio, sink, ManagerConfig::default()).unwrap();
//!
//! station
//!     .connect("cafe", &ConnectOptions::default(), CompletionHandle::new(|outcome| {
//!         assert!(outcome.is_success());
//!     }))
//!     .unwrap();
//!
//! // Feed the events the radio raised back through the classifier.
//! for event in station.with_driver(|radio| radio.take_events()) {
//!     station.handle_event(&event);
//! }
//! dispatcher.dispatch_pending();
//! assert_eq!(station.state(), ConnectionState::IpAcquired);
//! ```

use super::completion::{CompletionHandle, CompletionRegistry, OperationKind, Outcome};
use super::config::{ConfigError, ConnectOptions, ManagerConfig, ScanOptions, StationStatus, WifiConfig};
use super::delivery::{EventSink, Notification};
use super::driver::{DriverError, RadioDriver};
use super::error::WifiError;
use super::event::{classify, NetworkEvent, RawEvent};
use super::scan;
use super::types::{ssid_from_bytes, DisconnectReason, Interface, IpInfo, MacAddr, PowerSave, WifiMode};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Failure reason reported for a rejected connect when
/// [`ManagerConfig::report_auth_failure`] is enabled.
pub const BAD_PASSWORD: &str = "Bad password";

/// Canonical station state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    StationStarting,
    Connecting,
    Associated,
    IpAcquired,
    Disconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::StationStarting => "station_starting",
            Self::Connecting => "connecting",
            Self::Associated => "associated",
            Self::IpAcquired => "ip_acquired",
            Self::Disconnecting => "disconnecting",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of [`WifiStation::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub mode: WifiMode,
    #[serde(rename = "powersave")]
    pub power_save: PowerSave,
    pub station: StationStatus,
}

/// Result of [`WifiStation::details`]. The password never leaves the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationDetails {
    pub status: StationStatus,
    pub ssid: String,
    pub has_password: bool,
}

/// Result of [`WifiStation::ip`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpSnapshot {
    /// Omitted when the station has no address.
    #[serde(flatten)]
    pub addresses: Option<IpInfo>,
    pub mac: MacAddr,
}

struct Inner<D> {
    driver: D,
    state: ConnectionState,
    registry: CompletionRegistry,
    /// SSID of the most recent `connect`, cleared by `disconnect`.
    target: Option<String>,
    last_reason: Option<DisconnectReason>,
    /// Set once the radio reports the station interface is up.
    station_up: bool,
}

impl<D> Inner<D> {
    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!("Station state {} -> {}", self.state, next);
            self.state = next;
        }
    }

    /// Whether the radio may still raise a disconnect for the current link
    /// or connection attempt.
    fn has_link_activity(&self) -> bool {
        match self.state {
            ConnectionState::Idle => false,
            ConnectionState::StationStarting => self.target.is_some(),
            _ => true,
        }
    }

    fn station_status(&self) -> StationStatus {
        match self.state {
            ConnectionState::IpAcquired => StationStatus::Connected,
            ConnectionState::Connecting | ConnectionState::Associated => StationStatus::Connecting,
            ConnectionState::StationStarting if self.target.is_some() => StationStatus::Connecting,
            ConnectionState::StationStarting | ConnectionState::Disconnecting => StationStatus::Off,
            ConnectionState::Idle => match (&self.target, self.last_reason) {
                (Some(_), Some(reason)) if reason.is_auth_failure() => StationStatus::WrongPassword,
                (Some(_), Some(reason)) if reason.is_no_ap_found() => StationStatus::NoApFound,
                (Some(_), Some(_)) => StationStatus::ConnectFail,
                _ => StationStatus::Off,
            },
        }
    }
}

fn bring_up_station<D: RadioDriver>(driver: &mut D, config: &WifiConfig) -> Result<(), DriverError> {
    driver.set_mode(WifiMode::Station)?;
    driver.set_station_config(config)?;
    driver.start()?;
    driver.connect()
}

fn start_scan<D: RadioDriver>(driver: &mut D, options: &ScanOptions) -> Result<(), DriverError> {
    driver.set_mode(WifiMode::Station)?;
    driver.start()?;
    driver.scan_start(options)
}

/// WiFi station connection manager.
pub struct WifiStation<D, S> {
    inner: Mutex<Inner<D>>,
    sink: S,
    config: ManagerConfig,
}

impl<D: RadioDriver, S: EventSink> WifiStation<D, S> {
    pub fn new(driver: D, sink: S, config: ManagerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner: Mutex::new(Inner {
                driver,
                state: ConnectionState::Idle,
                registry: CompletionRegistry::new(),
                target: None,
                last_reason: None,
                station_up: false,
            }),
            sink,
            config,
        })
    }

    // Every mutation leaves `Inner` consistent, so a poisoned lock is safe to
    // keep using.
    fn lock(&self) -> MutexGuard<'_, Inner<D>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.lock().registry.is_pending(kind)
    }

    pub fn pending_operations(&self) -> Vec<OperationKind> {
        self.lock().registry.pending_kinds()
    }

    /// Run `f` with exclusive access to the driver.
    pub fn with_driver<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        f(&mut self.lock().driver)
    }

    /// Connect to `ssid`.
    ///
    /// `on_complete` receives [`Outcome::Success`] once the station has an IP
    /// address. It is not called if the attempt fails, unless
    /// [`ManagerConfig::report_auth_failure`] is set and the password was
    /// rejected. A later `connect` replaces this completion without calling it.
    pub fn connect(
        &self,
        ssid: &str,
        options: &ConnectOptions,
        on_complete: CompletionHandle,
    ) -> Result<(), WifiError> {
        let config = WifiConfig::from_options(ssid, options)?;

        let mut guard = self.lock();
        let inner = &mut *guard;
        info!("Connecting to {:?}", config.ssid);

        if let Err(e) = bring_up_station(&mut inner.driver, &config) {
            error!("Connect to {:?} failed: {}", config.ssid, e);
            return Err(e.into());
        }

        inner.registry.cancel(OperationKind::Disconnect);
        inner.registry.begin(OperationKind::Connect, on_complete);
        inner.target = Some(config.ssid.clone());
        inner.last_reason = None;
        inner.transition(ConnectionState::StationStarting);
        Ok(())
    }

    /// Disconnect from the current network.
    ///
    /// Any pending connect is dropped without being called. `on_complete`
    /// receives [`Outcome::Success`] once the radio confirms, or straight away
    /// if there was nothing to disconnect.
    pub fn disconnect(&self, on_complete: CompletionHandle) -> Result<(), WifiError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let active = inner.has_link_activity();

        if let Err(e) = inner.driver.disconnect() {
            if active {
                error!("Disconnect failed: {}", e);
                return Err(e.into());
            }
            debug!("Disconnect with no link: {}", e);
        }
        info!("Disconnecting");

        inner.registry.cancel(OperationKind::Connect);
        inner.registry.begin(OperationKind::Disconnect, on_complete);
        inner.target = None;
        inner.transition(ConnectionState::Disconnecting);

        if !active {
            inner.transition(ConnectionState::Idle);
            inner
                .registry
                .resolve(OperationKind::Disconnect, Outcome::Success, &self.sink);
        }
        Ok(())
    }

    /// Start a scan. `on_complete` receives [`Outcome::Networks`].
    ///
    /// Only one scan can be outstanding; a second call fails with
    /// [`WifiError::ScanInProgress`] and leaves the first untouched.
    pub fn scan(&self, on_complete: CompletionHandle) -> Result<(), WifiError> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        if inner.registry.is_pending(OperationKind::Scan) {
            warn!("Scan requested while one is in progress");
            return Err(WifiError::ScanInProgress);
        }

        if let Err(e) = start_scan(&mut inner.driver, &self.config.scan) {
            error!("Scan failed to start: {}", e);
            return Err(e.into());
        }
        info!("Scan started");

        inner.registry.begin(OperationKind::Scan, on_complete);
        if inner.state == ConnectionState::Idle && !inner.station_up {
            inner.transition(ConnectionState::StationStarting);
        }
        Ok(())
    }

    /// Driver-side entry point: classify a raw event and apply it.
    pub fn handle_event(&self, raw: &RawEvent) {
        if let Some(event) = classify(raw) {
            self.apply(event);
        }
    }

    /// Apply a classified event.
    pub fn apply(&self, event: NetworkEvent) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let sink = &self.sink;

        match event {
            NetworkEvent::StationStarted => {
                inner.station_up = true;
                if inner.state == ConnectionState::StationStarting {
                    let next = if inner.target.is_some() {
                        ConnectionState::Connecting
                    } else {
                        ConnectionState::Idle
                    };
                    inner.transition(next);
                }
            }
            NetworkEvent::StationConnected { ssid, mac, channel } => {
                info!("Associated with {:?} ({}) on channel {}", ssid, mac, channel);
                inner.transition(ConnectionState::Associated);
                inner.last_reason = None;
                sink.notify(Notification::Associated { ssid, mac, channel });
            }
            NetworkEvent::StationGotIp(addresses) => {
                match inner.state {
                    ConnectionState::Associated => {
                        info!(
                            "Got IP {} (netmask {}, gw {})",
                            addresses.ip, addresses.netmask, addresses.gw
                        );
                        inner.transition(ConnectionState::IpAcquired);
                        inner
                            .registry
                            .resolve(OperationKind::Connect, Outcome::Success, sink);
                    }
                    // Lease renewed, possibly with a new address.
                    ConnectionState::IpAcquired => {
                        info!("IP renewed: {}", addresses.ip);
                    }
                    _ => {
                        debug!("Ignoring IP {} in state {}", addresses.ip, inner.state);
                        return;
                    }
                }
                sink.notify(Notification::Connected {
                    ip: addresses.ip,
                    netmask: addresses.netmask,
                    gw: addresses.gw,
                });
            }
            NetworkEvent::StationLostIp => {
                if inner.state != ConnectionState::IpAcquired {
                    debug!("Ignoring lost IP in state {}", inner.state);
                    return;
                }
                warn!("Lost IP address");
                inner.transition(ConnectionState::Associated);
                sink.notify(Notification::DhcpTimeout);
            }
            NetworkEvent::StationDisconnected { ssid, mac, reason } => {
                info!(
                    "Disconnected from {:?}: reason {} ({})",
                    ssid,
                    reason,
                    reason.label()
                );
                inner.transition(ConnectionState::Idle);
                inner.last_reason = Some(reason);
                inner
                    .registry
                    .resolve(OperationKind::Disconnect, Outcome::Success, sink);
                if self.config.report_auth_failure && reason.is_auth_failure() {
                    inner.registry.resolve(
                        OperationKind::Connect,
                        Outcome::failed(BAD_PASSWORD),
                        sink,
                    );
                }
                sink.notify(Notification::Disconnected { ssid, mac, reason });
            }
            NetworkEvent::AuthModeChanged { old_mode, new_mode } => {
                info!("Auth mode changed: {} -> {}", old_mode, new_mode);
                sink.notify(Notification::AuthChange { old_mode, new_mode });
            }
            NetworkEvent::ApStationJoined { mac } => {
                sink.notify(Notification::StaJoined { mac });
            }
            NetworkEvent::ApStationLeft { mac } => {
                sink.notify(Notification::StaLeft { mac });
            }
            NetworkEvent::ProbeRequest { mac, rssi } => {
                sink.notify(Notification::ProbeRecv { mac, rssi });
            }
            NetworkEvent::ScanDone => {
                if !inner.registry.is_pending(OperationKind::Scan) {
                    debug!("Scan done with no scan pending");
                    return;
                }
                let outcome = match scan::collect_batch(&mut inner.driver) {
                    Ok(batch) => {
                        info!("Scan complete: {} access points", batch.len());
                        Outcome::Networks(batch)
                    }
                    Err(e) => {
                        error!("Failed to read scan results: {}", e);
                        Outcome::failed(e.to_string())
                    }
                };
                inner.registry.resolve(OperationKind::Scan, outcome, sink);
            }
        }
    }

    /// Radio mode, power-save mode and station status.
    pub fn status(&self) -> Result<StatusSnapshot, WifiError> {
        let inner = self.lock();
        Ok(StatusSnapshot {
            mode: inner.driver.mode()?,
            power_save: inner.driver.power_save()?,
            station: inner.station_status(),
        })
    }

    /// Station status and the configured network.
    pub fn details(&self) -> Result<StationDetails, WifiError> {
        let inner = self.lock();
        let config = inner.driver.station_config()?;
        Ok(StationDetails {
            status: inner.station_status(),
            ssid: ssid_from_bytes(&config.ssid, None),
            has_password: config.has_password(),
        })
    }

    /// Station addresses and MAC.
    pub fn ip(&self) -> Result<IpSnapshot, WifiError> {
        let inner = self.lock();
        let addresses = match inner.driver.ip_info(Interface::Station) {
            Ok(addresses) => addresses,
            Err(e) => {
                warn!("Failed to read station IP info: {}", e);
                None
            }
        };
        Ok(IpSnapshot {
            addresses,
            mac: inner.driver.mac(Interface::Station)?,
        })
    }
}
