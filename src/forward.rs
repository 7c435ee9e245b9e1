//! Flattening readings into named samples and shipping them to a sink.

use crate::output::{MetricSink, SinkError};
use crate::sensors::Sensors;
use tracing::{debug, warn};

/// Number of samples produced per reading (every field except the version).
pub const SAMPLE_COUNT: usize = 9;

/// A named metric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub name: &'static str,
    pub value: f64,
}

impl Sensors {
    /// All measurements as samples, in a fixed order.
    ///
    /// The payload version is not a measurement and is left out.
    pub fn samples(&self) -> [Sample; SAMPLE_COUNT] {
        let sensors = self;
        macro_rules! sample {
            ($field:ident) => {
                Sample {
                    name: stringify!($field),
                    value: sensors.$field(),
                }
            };
        }

        [
            sample!(humidity),
            sample!(light),
            sample!(accel),
            sample!(radon_short_term_average),
            sample!(radon_long_term_average),
            sample!(temperature),
            sample!(pressure),
            sample!(carbon_dioxide_level),
            sample!(voc_level),
        ]
    }
}

/// Send every sample of `sensors` to `sink`, in order.
///
/// With `dry_run` the samples are only logged. The first failing send aborts
/// the batch; samples sent before it are not taken back.
pub fn forward(sensors: &Sensors, dry_run: bool, sink: &mut dyn MetricSink) -> Result<(), SinkError> {
    let samples = sensors.samples();
    debug!(?samples, "metrics");

    for Sample { name, value } in samples {
        if dry_run {
            warn!("dry-run: not sending {name}={value}");
        } else {
            sink.send(name, value)?;
        }
    }

    Ok(())
}
