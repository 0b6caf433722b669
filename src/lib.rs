//! ESP32 WiFi station manager library.
//!
//! Drives the station interface through its lifecycle by reacting to radio
//! events, and delivers exactly one completion per `connect`, `disconnect`
//! and `scan` call. Everything except the ESP-IDF driver is
//! platform-independent and can be tested on the host machine.

pub mod console;
pub mod wifi;

// Re-export commonly used items
pub use console::ConsoleCommand;
pub use wifi::{
    CompletionHandle, ConfigError, ConnectOptions, ConnectionState, ManagerConfig, Outcome,
    RadioDriver, WifiConfig, WifiError, WifiStation,
};
