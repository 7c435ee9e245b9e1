//! `wave-plus-exporter` library.
//!
//! The binaries (`src/main.rs`, `src/bin/wave-plus-discover.rs`) are
//! responsible for CLI parsing, logging setup and process exit codes. The
//! polling cycle lives in [`crate::app`] and the scan logic in
//! [`crate::discovery`], where both can be tested with injected transports,
//! sinks and scanners.

pub mod app;
pub mod discovery;
pub mod duration;
pub mod forward;
pub mod logging;
pub mod mac_address;
pub mod output;
pub mod reader;
pub mod retry;
pub mod sensors;
pub mod transport;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use app::{Options, RunError, run_cycle};
pub use forward::{Sample, forward};
pub use mac_address::MacAddress;
pub use output::graphite::{GraphiteSink, LazyTcpStream};
pub use output::{MetricSink, SinkError};
pub use reader::{ReadError, WaveReader};
pub use retry::RetryPolicy;
pub use sensors::{DecodeError, RawPayload, Sensors};
pub use transport::{Transport, TransportError};
