//! One polling cycle: read the sensor, decode the record, forward the samples.
//!
//! This module is decoupled from the real Bluetooth stack, the Graphite
//! socket and process exit codes so the whole cycle can be tested against
//! fakes.

use crate::forward::forward;
use crate::logging::LogLevel;
use crate::mac_address::MacAddress;
use crate::output::{MetricSink, SinkError};
use crate::reader::{ReadError, WaveReader};
use crate::retry::RetryPolicy;
use crate::sensors::{DecodeError, Sensors};
use crate::transport::{Transport, TransportError};
use clap::Parser;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Exit codes for the application
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_ERROR: i32 = 1;
pub const EXIT_PANIC: i32 = 2;

/// Command-line configuration for a polling cycle.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Bluetooth address of the Wave Plus, e.g. 80:6F:B0:12:34:56
    #[arg(value_name = "MAC")]
    pub mac: MacAddress,

    /// Graphite (Carbon) host to send metrics to
    pub graphite_host: String,

    /// Prefix prepended to every metric name, e.g. home.basement
    pub graphite_prefix: String,

    /// Carbon plaintext port
    #[arg(long, default_value_t = crate::output::graphite::DEFAULT_PORT)]
    pub graphite_port: u16,

    /// Log samples instead of sending them to Graphite
    #[arg(long)]
    pub graphite_dryrun: bool,

    /// Log level
    #[arg(long, value_enum, default_value_t)]
    pub log_level: LogLevel,

    /// Total connection attempts before giving up
    #[arg(long, default_value_t = RetryPolicy::default().max_attempts)]
    pub max_attempts: u32,

    /// Pause between connection attempts.
    /// Accepts duration with suffix: 500ms, 2s, 1m.
    #[arg(long, value_parser = crate::duration::parse_duration, default_value = "2s")]
    pub retry_delay: Duration,
}

impl Options {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_delay)
    }
}

/// Errors that end a polling cycle.
#[derive(Error, Debug)]
pub enum RunError {
    /// The transport could not be set up.
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Run one read, decode, forward cycle and return the decoded reading.
pub fn run_cycle<T: Transport>(
    options: &Options,
    reader: &mut WaveReader<T>,
    sink: &mut dyn MetricSink,
) -> Result<Sensors, RunError> {
    let raw = reader.get_reading(options.mac)?;
    let sensors = Sensors::decode(&raw)?;
    forward(&sensors, options.graphite_dryrun, sink)?;

    info!(
        device = %options.mac,
        temperature = sensors.temperature(),
        radon = sensors.radon_short_term_average(),
        co2 = sensors.carbon_dioxide_level(),
        dry_run = options.graphite_dryrun,
        "reading processed"
    );
    Ok(sensors)
}

/// Run `cycle` and map its outcome to a process exit code.
///
/// A panic is caught only after the stack has unwound, so any connection
/// guard held by the cycle has already released its device.
pub fn exit_code(cycle: impl FnOnce() -> Result<(), RunError>) -> i32 {
    match panic::catch_unwind(AssertUnwindSafe(cycle)) {
        Ok(Ok(())) => EXIT_SUCCESS,
        Ok(Err(why)) => {
            eprintln!("error: {}", why);
            EXIT_ERROR
        }
        Err(_) => EXIT_PANIC,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::graphite::GraphiteSink;
    use crate::test_utils::{SAMPLE_BYTES, TEST_MAC};
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::SystemTime;
    use uuid::Uuid;

    /// Hands out queued characteristic values, one per connection.
    struct FakeTransport {
        reads: VecDeque<Vec<u8>>,
    }

    impl FakeTransport {
        fn new(reads: impl IntoIterator<Item = Vec<u8>>) -> Self {
            Self {
                reads: reads.into_iter().collect(),
            }
        }
    }

    impl Transport for FakeTransport {
        type Connection = ();

        fn open(&mut self, device: MacAddress) -> Result<(), TransportError> {
            if self.reads.is_empty() {
                return Err(TransportError::Connection {
                    device,
                    reason: "out of range".into(),
                });
            }
            Ok(())
        }

        fn read_characteristic(&mut self, _: &(), _: Uuid) -> Result<Vec<u8>, TransportError> {
            self.reads.pop_front().ok_or(TransportError::Read {
                reason: "no data".into(),
            })
        }

        fn close(&mut self, _: ()) -> Result<(), TransportError> {
            Ok(())
        }
    }

    /// Connects fine, then faults in the middle of the read.
    struct FaultyTransport {
        closed: Arc<AtomicU32>,
    }

    impl Transport for FaultyTransport {
        type Connection = ();

        fn open(&mut self, _: MacAddress) -> Result<(), TransportError> {
            Ok(())
        }

        fn read_characteristic(&mut self, _: &(), _: Uuid) -> Result<Vec<u8>, TransportError> {
            panic!("GATT stack fault");
        }

        fn close(&mut self, _: ()) -> Result<(), TransportError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn options(args: &[&str]) -> Options {
        let base = ["wave-plus-exporter", "80:6F:B0:12:34:56", "graphite.local", "home.basement"];
        Options::try_parse_from(base.iter().chain(args)).unwrap()
    }

    fn reader(reads: impl IntoIterator<Item = Vec<u8>>) -> WaveReader<FakeTransport> {
        WaveReader::new(FakeTransport::new(reads)).with_sleep(|_| {})
    }

    fn fixed_clock() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000)
    }

    #[test]
    fn test_options_defaults() {
        let options = options(&[]);
        assert_eq!(options.mac, TEST_MAC);
        assert_eq!(options.graphite_host, "graphite.local");
        assert_eq!(options.graphite_prefix, "home.basement");
        assert_eq!(options.graphite_port, 2003);
        assert!(!options.graphite_dryrun);
        assert_eq!(options.log_level, LogLevel::Info);
        assert_eq!(options.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn test_options_overrides() {
        let options = options(&[
            "--graphite-port",
            "2103",
            "--graphite-dryrun",
            "--log-level",
            "warning",
            "--max-attempts",
            "3",
            "--retry-delay",
            "500ms",
        ]);
        assert_eq!(options.graphite_port, 2103);
        assert!(options.graphite_dryrun);
        assert_eq!(options.log_level, LogLevel::Warning);
        assert_eq!(
            options.retry_policy(),
            RetryPolicy::new(3, Duration::from_millis(500))
        );
    }

    #[test]
    fn test_options_invalid_mac() {
        let result = Options::try_parse_from(["wave-plus-exporter", "not-a-mac", "host", "prefix"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_cycle_graphite() {
        let options = options(&[]);
        let mut sink = GraphiteSink::new(Vec::new(), &options.graphite_prefix).with_clock(fixed_clock);

        let sensors = run_cycle(&options, &mut reader([SAMPLE_BYTES.to_vec()]), &mut sink).unwrap();

        assert_eq!(sensors.temperature(), 22.0);
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(
            out.lines().collect::<Vec<_>>(),
            [
                "home.basement.humidity 50 1600000000",
                "home.basement.light 0 1600000000",
                "home.basement.accel 0 1600000000",
                "home.basement.radon_short_term_average 50 1600000000",
                "home.basement.radon_long_term_average 60 1600000000",
                "home.basement.temperature 22 1600000000",
                "home.basement.pressure 20.26 1600000000",
                "home.basement.carbon_dioxide_level 400 1600000000",
                "home.basement.voc_level 250 1600000000",
            ]
        );
    }

    #[test]
    fn test_run_cycle_dry_run() {
        let options = options(&["--graphite-dryrun"]);
        let mut sink = GraphiteSink::new(Vec::new(), &options.graphite_prefix);

        run_cycle(&options, &mut reader([SAMPLE_BYTES.to_vec()]), &mut sink).unwrap();

        assert!(sink.into_inner().is_empty());
    }

    #[test]
    fn test_run_cycle_decode_error() {
        let mut bytes = SAMPLE_BYTES.to_vec();
        bytes[0] = 2;
        let options = options(&[]);
        let mut sink = GraphiteSink::new(Vec::new(), &options.graphite_prefix);
        // A second valid record is queued but must never be read.
        let mut reader = reader([bytes, SAMPLE_BYTES.to_vec()]);

        let err = run_cycle(&options, &mut reader, &mut sink).unwrap_err();

        assert!(matches!(err, RunError::Decode(DecodeError::UnsupportedVersion(2))));
        assert_eq!(reader.transport().reads.len(), 1);
        assert!(sink.into_inner().is_empty());
    }

    #[test]
    fn test_run_cycle_exhausted() {
        let options = options(&["--max-attempts", "2"]);
        let mut reader = reader(Vec::new()).with_policy(options.retry_policy());
        let mut sink = GraphiteSink::new(Vec::new(), &options.graphite_prefix);

        let err = run_cycle(&options, &mut reader, &mut sink).unwrap_err();

        assert!(matches!(
            err,
            RunError::Read(ReadError::Exhausted { attempts: 2, .. })
        ));
        assert_eq!(
            err.to_string(),
            "giving up after 2 attempts: failed to connect to 80:6F:B0:12:34:56: out of range"
        );
    }

    #[test]
    fn test_exit_code() {
        let options = options(&["--max-attempts", "1"]);
        let cycle = |reads: Vec<Vec<u8>>| {
            let options = options.clone();
            move || {
                let mut sink = GraphiteSink::new(Vec::new(), &options.graphite_prefix);
                run_cycle(&options, &mut reader(reads), &mut sink).map(|_| ())
            }
        };

        assert_eq!(exit_code(cycle(vec![SAMPLE_BYTES.to_vec()])), EXIT_SUCCESS);
        assert_eq!(exit_code(cycle(Vec::new())), EXIT_ERROR);
    }

    #[test]
    fn test_exit_code_panic_releases_connection() {
        let options = options(&[]);
        let closed = Arc::new(AtomicU32::new(0));
        let transport = FaultyTransport {
            closed: Arc::clone(&closed),
        };

        let code = exit_code(|| {
            let mut reader = WaveReader::new(transport).with_sleep(|_| {});
            let mut sink = GraphiteSink::new(Vec::new(), &options.graphite_prefix);
            run_cycle(&options, &mut reader, &mut sink).map(|_| ())
        });

        assert_eq!(code, EXIT_PANIC);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }
}
