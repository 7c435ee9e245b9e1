use clap::Parser;
use std::panic::{self, PanicHookInfo};
use wave_plus_exporter::app::{self, Options, RunError};
use wave_plus_exporter::logging;
use wave_plus_exporter::output::graphite::{GraphiteSink, LazyTcpStream};
use wave_plus_exporter::reader::WaveReader;
use wave_plus_exporter::transport::bluer::BluerTransport;

/// Poll the sensor once and ship the reading to Graphite.
///
/// # Errors
/// Returns `RunError` if the adapter is unavailable, every read attempt
/// failed, the record is invalid or a sample could not be sent.
fn run(options: Options) -> Result<(), RunError> {
    let transport = BluerTransport::new()?;
    let mut reader = WaveReader::new(transport).with_policy(options.retry_policy());

    // Connects on the first sample, so dry runs never touch the network.
    let stream = LazyTcpStream::new(options.graphite_host.clone(), options.graphite_port);
    let mut sink = GraphiteSink::new(stream, &options.graphite_prefix);

    app::run_cycle(&options, &mut reader, &mut sink)?;
    Ok(())
}

fn main() {
    // Only report here; the unwind must continue so open connections are
    // released before `exit_code` maps the panic to its exit status.
    panic::set_hook(Box::new(|info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
    }));

    let options = Options::parse();
    logging::init(options.log_level);

    std::process::exit(app::exit_code(|| run(options)));
}
