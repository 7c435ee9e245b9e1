//! Scan for Airthings devices and print the address of each candidate.

use clap::Parser;
use std::time::Duration;
use wave_plus_exporter::discovery::{self, DiscoveryError, bluer::BluerScanner};
use wave_plus_exporter::logging::{self, LogLevel};

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(author, version, about = "Find Airthings devices by their advertised company identifier")]
struct Options {
    /// How long to listen for advertisements.
    /// Accepts duration with suffix: 500ms, 5s, 1m.
    #[arg(long, value_parser = wave_plus_exporter::duration::parse_duration, default_value = "5s")]
    scan_time: Duration,

    /// Log level
    #[arg(long, value_enum, default_value_t)]
    log_level: LogLevel,
}

async fn run(options: Options) -> Result<(), DiscoveryError> {
    let mut stdout = std::io::stdout();
    let found = discovery::discover(&BluerScanner, options.scan_time, &mut stdout).await?;
    if found.is_empty() {
        tracing::info!("no Airthings devices found");
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let options = Options::parse();
    logging::init(options.log_level);

    match run(options).await {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}
