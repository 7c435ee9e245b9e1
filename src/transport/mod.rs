//! Bluetooth LE transport abstraction.
//!
//! The polling core only needs three things from the link: open a connection
//! to a device, read one GATT characteristic, and close the connection. The
//! [`Transport`] trait captures exactly that so the core can be exercised
//! without hardware, and [`ConnectionGuard`] scopes one connection to one
//! read attempt.

#[cfg(feature = "bluer")]
pub mod bluer;

use crate::mac_address::MacAddress;
use crate::sensors::PayloadLengthError;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// GATT characteristic holding the current Wave Plus sensor record.
pub const WAVE_PLUS_CHARACTERISTIC: Uuid =
    Uuid::from_u128(0xb42e2a68_ade7_11e4_89d3_123b93f75cba);

/// Errors raised by a transport while talking to a device.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The local Bluetooth adapter could not be set up.
    #[error("Bluetooth adapter unavailable: {0}")]
    Adapter(String),
    /// The device could not be connected.
    #[error("failed to connect to {device}: {reason}")]
    Connection { device: MacAddress, reason: String },
    /// The connection was established but reading failed.
    #[error("failed to read characteristic: {reason}")]
    Read { reason: String },
    /// The device does not expose the requested characteristic.
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),
    /// The characteristic returned a record of the wrong size.
    #[error(transparent)]
    PayloadLength(#[from] PayloadLengthError),
    /// Closing the connection failed.
    #[error("failed to disconnect: {reason}")]
    Disconnect { reason: String },
}

/// Blocking access to a Bluetooth LE link.
pub trait Transport {
    /// An open connection to one device.
    type Connection;

    fn open(&mut self, device: MacAddress) -> Result<Self::Connection, TransportError>;

    fn read_characteristic(
        &mut self,
        connection: &Self::Connection,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, TransportError>;

    /// Release a connection. Callers treat failures as best-effort.
    fn close(&mut self, connection: Self::Connection) -> Result<(), TransportError>;
}

/// Log the outcome of releasing a connection. Failures are not propagated.
pub(crate) fn log_release(device: MacAddress, result: Result<(), TransportError>) {
    match result {
        Ok(()) => debug!(%device, "disconnected"),
        Err(error) => warn!(%device, %error, "failed to disconnect"),
    }
}

/// An open connection that is closed when the guard goes out of scope.
///
/// Dropping the guard closes the connection whether the attempt succeeded,
/// returned an error or unwound from a panic. Close failures are logged and
/// otherwise ignored.
pub struct ConnectionGuard<'a, T: Transport> {
    transport: &'a mut T,
    connection: Option<T::Connection>,
    device: MacAddress,
}

impl<'a, T: Transport> ConnectionGuard<'a, T> {
    /// Open a connection to `device`.
    pub fn open(transport: &'a mut T, device: MacAddress) -> Result<Self, TransportError> {
        let connection = transport.open(device)?;
        debug!(%device, "connected");
        Ok(Self {
            transport,
            connection: Some(connection),
            device,
        })
    }

    /// Read a characteristic over the guarded connection.
    pub fn read_characteristic(&mut self, characteristic: Uuid) -> Result<Vec<u8>, TransportError> {
        match self.connection.as_ref() {
            Some(connection) => self.transport.read_characteristic(connection, characteristic),
            None => Err(TransportError::Read {
                reason: "connection already closed".into(),
            }),
        }
    }
}

impl<T: Transport> Drop for ConnectionGuard<'_, T> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            log_release(self.device, self.transport.close(connection));
        }
    }
}
