//! BlueZ D-Bus transport.
//!
//! This backend uses the `bluer` crate to connect to a device through the
//! BlueZ daemon. It requires `bluetoothd` to be running. `bluer` is async, so
//! the transport owns a current-thread tokio runtime and blocks on it; the
//! polling core stays synchronous.

use super::{Transport, TransportError, log_release};
use crate::mac_address::MacAddress;
use bluer::{Adapter, Device, Session};
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::debug;
use uuid::Uuid;

/// How long to wait for GATT services to resolve after connecting.
const SERVICES_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Poll interval while waiting for GATT services.
const SERVICES_RESOLVE_POLL: Duration = Duration::from_millis(100);

/// Transport backed by the default BlueZ adapter.
pub struct BluerTransport {
    runtime: Runtime,
    // Keeps the D-Bus connection alive for the adapter.
    _session: Session,
    adapter: Adapter,
}

impl BluerTransport {
    /// Open a BlueZ session and power on the default adapter.
    pub fn new() -> Result<Self, TransportError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TransportError::Adapter(format!("failed to start runtime: {e}")))?;

        let (session, adapter) = runtime
            .block_on(async {
                let session = Session::new().await?;
                let adapter = session.default_adapter().await?;
                adapter.set_powered(true).await?;
                Ok::<_, bluer::Error>((session, adapter))
            })
            .map_err(|e| TransportError::Adapter(e.to_string()))?;

        debug!(adapter = adapter.name(), "using Bluetooth adapter");

        Ok(Self {
            runtime,
            _session: session,
            adapter,
        })
    }
}

fn disconnect_error(e: bluer::Error) -> TransportError {
    TransportError::Disconnect {
        reason: e.to_string(),
    }
}

async fn wait_for_services(device: &Device) -> bluer::Result<()> {
    let deadline = tokio::time::Instant::now() + SERVICES_RESOLVE_TIMEOUT;
    while !device.is_services_resolved().await? {
        if tokio::time::Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep(SERVICES_RESOLVE_POLL).await;
    }
    Ok(())
}

async fn read_by_uuid(device: &Device, characteristic: Uuid) -> Result<Vec<u8>, TransportError> {
    let read_error = |e: bluer::Error| TransportError::Read {
        reason: e.to_string(),
    };

    for service in device.services().await.map_err(read_error)? {
        for candidate in service.characteristics().await.map_err(read_error)? {
            if candidate.uuid().await.map_err(read_error)? == characteristic {
                return candidate.read().await.map_err(read_error);
            }
        }
    }

    Err(TransportError::CharacteristicNotFound(characteristic))
}

impl Transport for BluerTransport {
    type Connection = Device;

    fn open(&mut self, device: MacAddress) -> Result<Device, TransportError> {
        let connection_error = |e: bluer::Error| TransportError::Connection {
            device,
            reason: e.to_string(),
        };

        let peripheral = self.adapter.device(device.into()).map_err(connection_error)?;
        self.runtime.block_on(async {
            peripheral.connect().await.map_err(connection_error)?;
            if let Err(e) = wait_for_services(&peripheral).await {
                // Not yet handed to a guard, so release it here.
                log_release(device, peripheral.disconnect().await.map_err(disconnect_error));
                return Err(connection_error(e));
            }
            Ok(())
        })?;

        Ok(peripheral)
    }

    fn read_characteristic(
        &mut self,
        connection: &Device,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, TransportError> {
        self.runtime
            .block_on(read_by_uuid(connection, characteristic))
    }

    fn close(&mut self, connection: Device) -> Result<(), TransportError> {
        self.runtime
            .block_on(connection.disconnect())
            .map_err(disconnect_error)
    }
}
