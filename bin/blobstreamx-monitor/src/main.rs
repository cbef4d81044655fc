#![deny(unused_crate_dependencies)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![warn(unused_imports)]

//! A monitor of the `BlobstreamX` contract
//!
//! Subscribes to `DataCommitmentStored` events and pushes the submitted
//! nonces and heights to an OTLP collector.

use clap::Parser;
use eyre::Result;
use tokio_util::sync::CancellationToken;

use chain_events::CommitmentEvents;
use cli::{Args, Command, StartArgs};
use config::StartConfig;
use telemetry::{
    bridge::{self, DEFAULT_BUFFER_CAPACITY},
    Teardown, Telemetry, SUBMITTED_HEIGHTS_GAUGE, SUBMITTED_NONCES_GAUGE,
};
use watcher::Watcher;

mod cli;
mod config;
mod error;
mod signal;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    dotenvy::dotenv().ok();

    let args = Args::parse();

    match args.command {
        Command::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Start(start_args) => start(start_args).await,
    }
}

async fn start(args: StartArgs) -> Result<()> {
    let config = match args.config_path.clone() {
        Some(path) => StartConfig::from_file(path)?,
        None => StartConfig::from(args),
    };

    let settings = config.validate()?;

    let sentry_guard = vlog::init(
        settings.log_level,
        settings.log_format,
        config.sentry_url.as_deref(),
    );

    if sentry_guard.is_some() {
        vlog::info!("Reporting errors to sentry");
    } else {
        vlog::info!("No sentry url configured");
    }

    // Everything registered here is released on every exit path below,
    // `Teardown` runs whatever is left when it is dropped.
    let mut teardown = Teardown::new();

    vlog::info!(
        "Starting the monitor of {:?} on {}",
        settings.contract,
        config.evm.rpc
    );

    let events = CommitmentEvents::connect(&config.evm.rpc, settings.contract).await?;

    let (nonces_tx, nonces_rx) = bridge::channel(SUBMITTED_NONCES_GAUGE, DEFAULT_BUFFER_CAPACITY);
    let (heights_tx, heights_rx) = bridge::channel(SUBMITTED_HEIGHTS_GAUGE, DEFAULT_BUFFER_CAPACITY);

    let telemetry = Telemetry::start(&config.metrics, &format!("{:?}", settings.contract))?;
    let meters = telemetry.init_meters(nonces_rx, heights_rx);
    teardown.register("telemetry", move || telemetry.shutdown());

    let cancel = CancellationToken::new();
    tokio::spawn(signal::trap_signal(cancel.clone()));

    let mut watcher = Watcher::new(events, settings.retry, meters, nonces_tx, heights_tx);

    let stopped = watcher.run(cancel.clone()).await;
    cancel.cancel();

    vlog::info!(
        "Shutting down after {} commitments",
        watcher.processed()
    );

    // Flushing the exporter blocks on its reader thread.
    let failed = tokio::task::block_in_place(|| teardown.run());
    if failed > 0 {
        vlog::warn!("{failed} teardown actions failed");
    }

    match stopped {
        watcher::Error::Cancelled => Ok(()),
        e => Err(e.into()),
    }
}
