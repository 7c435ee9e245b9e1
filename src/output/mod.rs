//! Metric sinks for decoded sensor readings.
//!
//! This module provides a trait for shipping named numeric samples to a
//! time-series collector, and an implementation speaking the Graphite
//! plaintext protocol.

pub mod graphite;

use std::io;
use thiserror::Error;

/// A sample could not be delivered.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("failed to send metric {name}: {source}")]
    Send {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Destination for named numeric samples.
///
/// Implementations own naming conventions such as a namespace prefix; callers
/// pass bare metric names.
pub trait MetricSink {
    /// Deliver one sample.
    ///
    /// # Arguments
    /// * `name` - Metric name without any namespace prefix
    /// * `value` - Sample value
    fn send(&mut self, name: &str, value: f64) -> Result<(), SinkError>;
}
