//! Hardware address of a Bluetooth LE device.
//!
//! The polling binary receives the address of the sensor on the command line,
//! and the discovery tool reports candidates in the same notation.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A Bluetooth device address stored as six raw octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Errors returned when parsing a device address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseMacError {
    #[error("invalid device address: expected 6 octets, got {0}")]
    OctetCount(usize),
    #[error("invalid device address: octet {index} '{octet}' must be two hex digits")]
    OctetWidth { index: usize, octet: String },
    #[error("invalid device address: '{0}' is not hexadecimal")]
    NotHex(String),
}

impl FromStr for MacAddress {
    type Err = ParseMacError;

    /// Parse `AA:BB:CC:DD:EE:FF` (or `aa-bb-cc-dd-ee-ff`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let octets: Vec<&str> = s.trim().split([':', '-']).collect();
        if octets.len() != 6 {
            return Err(ParseMacError::OctetCount(octets.len()));
        }

        let mut address = [0u8; 6];
        for (index, (slot, octet)) in address.iter_mut().zip(&octets).enumerate() {
            if octet.len() != 2 {
                return Err(ParseMacError::OctetWidth {
                    index,
                    octet: (*octet).to_string(),
                });
            }
            if !octet.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(ParseMacError::NotHex((*octet).to_string()));
            }
            *slot =
                u8::from_str_radix(octet, 16).map_err(|_| ParseMacError::NotHex(octet.to_string()))?;
        }

        Ok(MacAddress(address))
    }
}

impl From<[u8; 6]> for MacAddress {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

#[cfg(feature = "bluer")]
impl From<bluer::Address> for MacAddress {
    fn from(addr: bluer::Address) -> Self {
        Self(addr.0)
    }
}

#[cfg(feature = "bluer")]
impl From<MacAddress> for bluer::Address {
    fn from(addr: MacAddress) -> Self {
        bluer::Address(addr.0)
    }
}
