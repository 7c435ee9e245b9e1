//! Discovery of Airthings devices from BLE advertisements.
//!
//! Airthings sensors advertise manufacturer-specific data carrying the
//! Bluetooth SIG company identifier of Corentium AS (820). Any device
//! advertising that identifier is reported as a candidate for polling.

#[cfg(feature = "bluer")]
pub mod bluer;

use crate::mac_address::MacAddress;
use std::collections::BTreeSet;
use std::future::Future;
use std::io::{self, Write};
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Corentium AS (Airthings) company identifier.
pub const AIRTHINGS_COMPANY_ID: u16 = 820;

/// [`AIRTHINGS_COMPANY_ID`] as it appears on air (little-endian).
pub const AIRTHINGS_COMPANY_ID_BYTES: [u8; 2] = AIRTHINGS_COMPANY_ID.to_le_bytes();

/// Bluetooth manufacturer-specific data type (AD type 0xFF).
pub const MANUFACTURER_DATA_TYPE: u8 = 0xff;

/// Channel buffer size for received advertisements.
pub const ADVERTISEMENT_CHANNEL_BUFFER_SIZE: usize = 100;

/// Manufacturer-specific data seen in one advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub mac: MacAddress,
    /// The AD value as transmitted: company identifier (little-endian)
    /// followed by the manufacturer payload.
    pub manufacturer_data: Vec<u8>,
}

impl Advertisement {
    pub fn is_airthings(&self) -> bool {
        company_id(&self.manufacturer_data) == Some(AIRTHINGS_COMPANY_ID)
    }
}

/// Company identifier at the start of a manufacturer-data AD value.
pub fn company_id(manufacturer_data: &[u8]) -> Option<u16> {
    match manufacturer_data {
        [low, high, ..] => Some(u16::from_le_bytes([*low, *high])),
        _ => None,
    }
}

/// Error type for discovery.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// Bluetooth/adapter related error
    #[error("Bluetooth error: {0}")]
    Bluetooth(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Source of advertisements, so discovery can run without Bluetooth hardware.
pub trait Scanner {
    fn start_scan(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, DiscoveryError>> + '_>>;
}

/// Collect candidate devices for `scan_time`.
///
/// Each new candidate address is logged and written as one line to `out`.
/// Scanning ends early when the scanner closes its channel. Returns the
/// candidates in the order they were first seen.
pub async fn discover(
    scanner: &dyn Scanner,
    scan_time: Duration,
    out: &mut dyn Write,
) -> Result<Vec<MacAddress>, DiscoveryError> {
    let mut advertisements = scanner.start_scan().await?;
    let deadline = tokio::time::Instant::now() + scan_time;

    let mut seen = BTreeSet::new();
    let mut found = Vec::new();

    while let Ok(Some(advertisement)) = tokio::time::timeout_at(deadline, advertisements.recv()).await {
        if !advertisement.is_airthings() {
            debug!(mac = %advertisement.mac, "ignoring non-Airthings advertisement");
            continue;
        }
        if seen.insert(advertisement.mac) {
            info!(mac = %advertisement.mac, "found a potential Airthings device");
            writeln!(out, "{}", advertisement.mac)?;
            found.push(advertisement.mac);
        }
    }

    Ok(found)
}
