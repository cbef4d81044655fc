use std::path::PathBuf;

use chain_events::{DEFAULT_RESUBSCRIBE_ATTEMPTS, DEFAULT_RESUBSCRIBE_BACKOFF};
use clap::{Args as ClapArgs, Parser, Subcommand};

pub(crate) const DEFAULT_EVM_RPC: &str = "http://localhost:8545";
pub(crate) const DEFAULT_METRICS_ENDPOINT: &str = "localhost:4318";

#[derive(Parser, Debug)]
#[command(version, author, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Watch the contract and export metrics until interrupted.
    Start(StartArgs),

    /// Print the version of the monitor.
    Version,
}

#[derive(ClapArgs, Debug, Clone, PartialEq, Eq)]
pub(crate) struct StartArgs {
    /// Chain node endpoint, `http(s)` is turned into `ws(s)`.
    #[arg(
        long = "evm.rpc",
        env = "BLOBSTREAMX_MONITOR_EVM_RPC",
        default_value = DEFAULT_EVM_RPC
    )]
    pub(crate) evm_rpc: String,

    /// Address of the `BlobstreamX` contract.
    #[arg(long = "evm.contract-address", env = "BLOBSTREAMX_MONITOR_EVM_CONTRACT_ADDRESS")]
    pub(crate) evm_contract_address: Option<String>,

    /// `host:port` of the OTLP/HTTP collector.
    #[arg(
        long = "metrics.endpoint",
        env = "BLOBSTREAMX_MONITOR_METRICS_ENDPOINT",
        default_value = DEFAULT_METRICS_ENDPOINT
    )]
    pub(crate) metrics_endpoint: String,

    /// Talk to the collector over `https`.
    #[arg(long = "metrics.tls", env = "BLOBSTREAMX_MONITOR_METRICS_TLS")]
    pub(crate) metrics_tls: bool,

    /// Instance id reported with the metrics.
    #[arg(
        long = "metrics.label",
        env = "BLOBSTREAMX_MONITOR_METRICS_LABEL",
        default_value = telemetry::DEFAULT_LABEL
    )]
    pub(crate) metrics_label: String,

    /// One of trace, debug, info, warn, error, fatal, panic.
    #[arg(long = "log.level", env = "BLOBSTREAMX_MONITOR_LOG_LEVEL", default_value = "info")]
    pub(crate) log_level: String,

    /// `plain` or `json`.
    #[arg(long = "log.format", env = "BLOBSTREAMX_MONITOR_LOG_FORMAT", default_value = "plain")]
    pub(crate) log_format: String,

    /// Sentry DSN errors are reported to.
    #[arg(long = "sentry-url", env = "BLOBSTREAMX_MONITOR_SENTRY_URL")]
    pub(crate) sentry_url: Option<String>,

    /// Resubscription attempts per failure, `0` makes any failure fatal.
    #[arg(
        long = "retry.attempts",
        env = "BLOBSTREAMX_MONITOR_RETRY_ATTEMPTS",
        default_value_t = DEFAULT_RESUBSCRIBE_ATTEMPTS
    )]
    pub(crate) retry_attempts: usize,

    /// Seconds between two resubscription attempts.
    #[arg(
        long = "retry.backoff-secs",
        env = "BLOBSTREAMX_MONITOR_RETRY_BACKOFF_SECS",
        default_value_t = DEFAULT_RESUBSCRIBE_BACKOFF.as_secs()
    )]
    pub(crate) retry_backoff_secs: u64,

    /// TOML file with the settings, replaces every flag above.
    #[arg(long, env = "BLOBSTREAMX_MONITOR_CONFIG_PATH")]
    pub(crate) config_path: Option<PathBuf>,
}
