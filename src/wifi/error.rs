use super::config::ConfigError;
use super::driver::DriverError;
use thiserror::Error;

/// Synchronous failure of a station manager call.
///
/// None of these fire the operation's completion: when a call returns an
/// error, no callback was registered for it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WifiError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("radio error: {0}")]
    Driver(#[from] DriverError),
    #[error("A scan is already in progress.")]
    ScanInProgress,
}
