use clap::Parser;
use log::LevelFilter;
use std::panic::{self, PanicHookInfo};

use zephy_monitor::app::{self, Options, RunError};
use zephy_monitor::transport::btleplug::BtleTransport;
use zephy_monitor::uploader::http::HttpUploader;

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

/// Main application entry point that wires the real backends together.
///
/// This function:
/// 1. Opens the Bluetooth adapter and spawns the event pump
/// 2. Creates the HTTP uploader for the configured endpoint
/// 3. Hands both to the pipeline, which scans, connects and streams
///    samples until the connection ends
///
/// # Errors
/// Returns `RunError` if Bluetooth initialization fails, no matching
/// peripheral is found, or the connection cannot be established
async fn run(options: Options) -> Result<(), RunError> {
    let (transport, events) = BtleTransport::new(options.device_name.clone()).await?;
    let uploader = HttpUploader::new(options.endpoint.clone());

    let summary = app::run(options, transport.as_ref(), events, &uploader).await?;

    log::info!(
        "done: {} batch(es) uploaded, {} batch(es) dropped, {} sample(s) dropped",
        summary.batches_uploaded,
        summary.batches_dropped,
        summary.samples_dropped
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if options.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    match run(options).await {
        Ok(()) => std::process::exit(EXIT_SUCCESS),
        Err(why) => {
            eprintln!("error: {}", why);
            std::process::exit(EXIT_ERROR);
        }
    }
}
