//! Wave Plus sensor payload decoding.
//!
//! The sensor characteristic holds a fixed 20-byte record: four unsigned
//! 8-bit fields followed by eight unsigned 16-bit fields, little-endian.
//! [`RawPayload`] is that record unpacked into integers; [`Sensors`] is the
//! validated set of physical measurements derived from it.

use std::fmt;
use thiserror::Error;

/// Size of the sensor record on the wire.
pub const PAYLOAD_LEN: usize = 20;

/// The only payload version this decoder understands.
pub const SUPPORTED_VERSION: u8 = 1;

/// Highest radon level the sensor can report (14-bit value).
pub const MAX_RADON_LEVEL: u16 = 16383;

/// Byte length of a characteristic read did not match the sensor record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected a {len}-byte sensor record, got {actual} bytes", len = PAYLOAD_LEN)]
pub struct PayloadLengthError {
    pub actual: usize,
}

/// The twelve integer fields of one sensor record, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawPayload(pub [u16; 12]);

impl RawPayload {
    /// Unpack the wire record (`u8 x4`, then `u16 x8` little-endian).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PayloadLengthError> {
        let bytes: &[u8; PAYLOAD_LEN] = bytes
            .try_into()
            .map_err(|_| PayloadLengthError { actual: bytes.len() })?;

        let mut fields = [0u16; 12];
        for (field, byte) in fields.iter_mut().zip(&bytes[..4]) {
            *field = u16::from(*byte);
        }
        for (field, pair) in fields[4..].iter_mut().zip(bytes[4..].chunks_exact(2)) {
            *field = u16::from_le_bytes([pair[0], pair[1]]);
        }

        Ok(RawPayload(fields))
    }
}

/// Which of the two radon averages failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadonField {
    ShortTermAverage,
    LongTermAverage,
}

impl fmt::Display for RadonField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadonField::ShortTermAverage => write!(f, "radon_short_term_average"),
            RadonField::LongTermAverage => write!(f, "radon_long_term_average"),
        }
    }
}

/// A sensor record that does not describe a valid measurement.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unsupported sensor version: {0}")]
    UnsupportedVersion(u16),
    #[error("invalid radon level {value} in {field} (expected 0..={max})", max = MAX_RADON_LEVEL)]
    InvalidRadonLevel { field: RadonField, value: u16 },
}

/// Decoded measurements from one Wave Plus reading.
///
/// Units:
/// - humidity: %rH
/// - light, accel: unitless
/// - radon averages: Bq/m3
/// - temperature: degrees Celsius
/// - pressure: hPa
/// - carbon dioxide: ppm
/// - VOC: ppb
///
/// Only [`Sensors::decode`] constructs this type, so every instance has passed
/// the version and radon range checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensors {
    version: u8,
    humidity: f64,
    light: f64,
    accel: f64,
    radon_short_term_average: f64,
    radon_long_term_average: f64,
    temperature: f64,
    pressure: f64,
    carbon_dioxide_level: f64,
    voc_level: f64,
}

impl Sensors {
    /// Validate and convert a raw record.
    ///
    /// The version is checked before any other field is looked at.
    pub fn decode(raw: &RawPayload) -> Result<Self, DecodeError> {
        let r = &raw.0;
        if r[0] != u16::from(SUPPORTED_VERSION) {
            return Err(DecodeError::UnsupportedVersion(r[0]));
        }

        Ok(Sensors {
            version: SUPPORTED_VERSION,
            humidity: f64::from(r[1]) / 2.0,
            light: f64::from(r[2]),
            accel: f64::from(r[3]),
            radon_short_term_average: radon(RadonField::ShortTermAverage, r[4])?,
            radon_long_term_average: radon(RadonField::LongTermAverage, r[5])?,
            temperature: f64::from(r[6]) / 100.0,
            pressure: f64::from(r[7]) / 50.0,
            carbon_dioxide_level: f64::from(r[8]),
            voc_level: f64::from(r[9]),
        })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn humidity(&self) -> f64 {
        self.humidity
    }

    pub fn light(&self) -> f64 {
        self.light
    }

    pub fn accel(&self) -> f64 {
        self.accel
    }

    pub fn radon_short_term_average(&self) -> f64 {
        self.radon_short_term_average
    }

    pub fn radon_long_term_average(&self) -> f64 {
        self.radon_long_term_average
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn pressure(&self) -> f64 {
        self.pressure
    }

    pub fn carbon_dioxide_level(&self) -> f64 {
        self.carbon_dioxide_level
    }

    pub fn voc_level(&self) -> f64 {
        self.voc_level
    }
}

fn radon(field: RadonField, value: u16) -> Result<f64, DecodeError> {
    if value > MAX_RADON_LEVEL {
        return Err(DecodeError::InvalidRadonLevel { field, value });
    }
    Ok(f64::from(value))
}
