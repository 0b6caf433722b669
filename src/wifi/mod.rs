//! WiFi station connection management.
//!
//! # Components
//!
//! - [`event`] - Raw radio events and their classification
//! - [`completion`] - Single-shot completion handles, one slot per operation
//! - [`station`] - Connection state machine ([`WifiStation`])
//! - [`scan`] - Scan result aggregation
//! - [`delivery`] - Event-delivery queue and dispatcher
//! - [`driver`] - Radio driver trait
//! - [`sim`] - Simulated radio for host builds and tests
//! - `esp_radio` - ESP-IDF radio driver (ESP32 only)
//!
//! Configuration types (credentials, scan options, manager settings) live in
//! [`config`].

pub mod completion;
pub mod config;
pub mod delivery;
pub mod driver;
mod error;
pub mod event;
pub mod scan;
pub mod sim;
pub mod station;
pub mod types;

#[cfg(feature = "esp32")]
mod esp_radio;

pub use completion::{CompletionHandle, CompletionRegistry, OperationKind, Outcome};
pub use config::{
    ConfigError, ConnectOptions, ManagerConfig, ScanOptions, StationStatus, WifiConfig,
    MAX_PASSWORD_LEN, MAX_SSID_LEN,
};
pub use delivery::{ChannelSink, Dispatcher, EventSink, Notification, Topic};
pub use driver::{DriverError, RadioDriver, RawApRecord, RawStationConfig};
pub use error::WifiError;
pub use event::{classify, EventBase, NetworkEvent, RawEvent, RawPayload};
pub use station::{ConnectionState, IpSnapshot, StationDetails, StatusSnapshot, WifiStation};
pub use types::{
    AccessPointRecord, AuthMode, DisconnectReason, Interface, IpInfo, MacAddr, PowerSave,
    ScanBatch, WifiMode,
};

#[cfg(feature = "esp32")]
pub use esp_radio::{EspRadio, EventSubscription};
