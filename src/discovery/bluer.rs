//! BlueZ D-Bus backend for advertisement scanning.
//!
//! Registers an advertisement monitor matching the Airthings company
//! identifier and forwards the manufacturer data of every reported device.
//! Requires the `bluetoothd` daemon to be running.

use super::{
    ADVERTISEMENT_CHANNEL_BUFFER_SIZE, AIRTHINGS_COMPANY_ID_BYTES, Advertisement, DiscoveryError,
    MANUFACTURER_DATA_TYPE, Scanner,
};
use crate::mac_address::MacAddress;
use bluer::monitor::{Monitor, MonitorEvent, Pattern};
use bluer::{Adapter, Address, Session};
use futures::StreamExt;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;
use tracing::debug;

impl From<bluer::Error> for DiscoveryError {
    fn from(err: bluer::Error) -> Self {
        DiscoveryError::Bluetooth(err.to_string())
    }
}

/// Scanner using the default BlueZ adapter.
#[derive(Debug, Default, Clone, Copy)]
pub struct BluerScanner;

impl Scanner for BluerScanner {
    fn start_scan(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<Advertisement>, DiscoveryError>> + '_>>
    {
        Box::pin(start_scan())
    }
}

/// Power on the default adapter and watch for devices whose manufacturer
/// data starts with the Airthings company id (820, little-endian).
///
/// Each matching device is reported as an [`Advertisement`] carrying its
/// address and the reassembled manufacturer data, so [`super::discover`] can
/// recheck the company id. A device that reappears is reported again; callers
/// deduplicate. The background task ends once the receiver is dropped.
pub async fn start_scan() -> Result<mpsc::Receiver<Advertisement>, DiscoveryError> {
    let session = Session::new().await?;
    let adapter = session.default_adapter().await?;
    adapter.set_powered(true).await?;

    let (tx, rx) = mpsc::channel(ADVERTISEMENT_CHANNEL_BUFFER_SIZE);

    let pattern = Pattern {
        data_type: MANUFACTURER_DATA_TYPE,
        start_position: 0,
        content: AIRTHINGS_COMPANY_ID_BYTES.to_vec(),
    };

    let monitor_manager = adapter.monitor().await?;
    let mut monitor_handle = monitor_manager
        .register(Monitor {
            patterns: Some(vec![pattern]),
            ..Default::default()
        })
        .await?;

    tokio::spawn(async move {
        // Dropping these would end the monitor.
        let _session = session;
        let _monitor_manager = monitor_manager;

        while let Some(event) = monitor_handle.next().await {
            if let MonitorEvent::DeviceFound(device_id) = event {
                match advertisements(&adapter, device_id.device).await {
                    Ok(found) => {
                        for advertisement in found {
                            if tx.send(advertisement).await.is_err() {
                                return;
                            }
                        }
                    }
                    Err(error) => debug!(%error, "failed to read advertisement"),
                }
            }
        }
    });

    Ok(rx)
}

/// Manufacturer data of a device, one entry per company identifier.
///
/// BlueZ strips the company identifier into a map key; it is put back in
/// front of the payload to restore the on-air AD value.
async fn advertisements(
    adapter: &Adapter,
    address: Address,
) -> Result<Vec<Advertisement>, DiscoveryError> {
    let device = adapter.device(address)?;
    let mac: MacAddress = address.into();

    let Some(manufacturer_data) = device.manufacturer_data().await? else {
        return Ok(Vec::new());
    };

    Ok(manufacturer_data
        .into_iter()
        .map(|(company, payload)| {
            let mut data = company.to_le_bytes().to_vec();
            data.extend_from_slice(&payload);
            Advertisement {
                mac,
                manufacturer_data: data,
            }
        })
        .collect())
}
