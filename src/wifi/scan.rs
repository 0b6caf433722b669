//! Scan aggregation.
//!
//! When a scan finishes the driver holds the results. [`collect_batch`] reads
//! the count, fetches that many records in one call, and converts them into a
//! [`ScanBatch`] in the order the driver reported them.

use super::driver::{DriverError, RadioDriver, RawApRecord};
use super::types::{ssid_from_bytes, AccessPointRecord, AuthMode, MacAddr, ScanBatch};
use log::debug;

impl From<&RawApRecord> for AccessPointRecord {
    fn from(raw: &RawApRecord) -> Self {
        Self {
            ssid: ssid_from_bytes(&raw.ssid, None),
            mac: MacAddr(raw.bssid),
            channel: raw.channel,
            rssi: raw.rssi,
            auth_mode: AuthMode::from_raw(raw.authmode),
        }
    }
}

/// Build the batch for a completed scan.
///
/// A count of zero yields an empty batch without fetching records.
pub fn collect_batch<D>(driver: &mut D) -> Result<ScanBatch, DriverError>
where
    D: RadioDriver + ?Sized,
{
    let count = driver.ap_count()?;
    if count == 0 {
        debug!("Scan found no access points");
        return Ok(ScanBatch::default());
    }

    let records = driver.ap_records(count)?;
    debug!("Scan reported {} access points, fetched {}", count, records.len());
    Ok(records.iter().map(AccessPointRecord::from).collect())
}
