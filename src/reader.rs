//! Retrying reads of the Wave Plus sensor characteristic.

use crate::mac_address::MacAddress;
use crate::retry::{Exhausted, RetryPolicy, retry};
use crate::sensors::RawPayload;
use crate::transport::{ConnectionGuard, Transport, TransportError, WAVE_PLUS_CHARACTERISTIC};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Reading the sensor failed on every attempt.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("giving up after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },
}

impl From<Exhausted<TransportError>> for ReadError {
    fn from(exhausted: Exhausted<TransportError>) -> Self {
        ReadError::Exhausted {
            attempts: exhausted.attempts,
            source: exhausted.last,
        }
    }
}

/// Obtains sensor records from a device over an unreliable link.
///
/// Every attempt opens its own connection, reads the sensor characteristic
/// and closes the connection again before the next attempt starts.
pub struct WaveReader<T: Transport> {
    transport: T,
    policy: RetryPolicy,
    sleep: Box<dyn FnMut(Duration)>,
}

impl<T: Transport> WaveReader<T> {
    /// Create a reader with the default policy (8 attempts, 2 s apart).
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
            sleep: Box::new(std::thread::sleep),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace the function used to wait between attempts.
    pub fn with_sleep(mut self, sleep: impl FnMut(Duration) + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Read one fresh record from `device`.
    pub fn get_reading(&mut self, device: MacAddress) -> Result<RawPayload, ReadError> {
        let transport = &mut self.transport;
        let payload = retry(&self.policy, &mut *self.sleep, |attempt| {
            debug!(%device, attempt, "reading sensor record");
            read_once(transport, device)
        })?;
        Ok(payload)
    }
}

fn read_once<T: Transport>(transport: &mut T, device: MacAddress) -> Result<RawPayload, TransportError> {
    let mut connection = ConnectionGuard::open(transport, device)?;
    let bytes = connection.read_characteristic(WAVE_PLUS_CHARACTERISTIC)?;
    Ok(RawPayload::from_bytes(&bytes)?)
}
