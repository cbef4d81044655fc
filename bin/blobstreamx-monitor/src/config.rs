use std::{fs, path::Path, time::Duration};

use chain_events::{RetryPolicy, DEFAULT_RESUBSCRIBE_ATTEMPTS, DEFAULT_RESUBSCRIBE_BACKOFF};
use ethers::types::Address;
use serde::Deserialize;
use vlog::{LogFormat, LogLevel};

use crate::{
    cli::{StartArgs, DEFAULT_EVM_RPC, DEFAULT_METRICS_ENDPOINT},
    error::Error,
};

/// Settings of the `start` command, from flags or a TOML file.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct StartConfig {
    #[serde(default)]
    pub(crate) evm: EvmConfig,

    #[serde(default = "default_metrics")]
    pub(crate) metrics: telemetry::Config,

    #[serde(default)]
    pub(crate) log: LogConfig,

    #[serde(default)]
    pub(crate) retry: RetryConfig,

    pub(crate) sentry_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct EvmConfig {
    #[serde(default = "default_evm_rpc")]
    pub(crate) rpc: String,

    #[serde(default)]
    pub(crate) contract_address: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogConfig {
    #[serde(default = "default_log_level")]
    pub(crate) level: String,

    #[serde(default = "default_log_format")]
    pub(crate) format: String,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub(crate) attempts: usize,

    #[serde(default = "default_retry_backoff_secs")]
    pub(crate) backoff_secs: u64,
}

/// Checked settings the monitor runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Validated {
    pub(crate) contract: Address,
    pub(crate) log_level: LogLevel,
    pub(crate) log_format: LogFormat,
    pub(crate) retry: RetryPolicy,
}

fn default_evm_rpc() -> String {
    DEFAULT_EVM_RPC.to_string()
}

fn default_metrics() -> telemetry::Config {
    telemetry::Config {
        endpoint: DEFAULT_METRICS_ENDPOINT.to_string(),
        tls: false,
        label: telemetry::DEFAULT_LABEL.to_string(),
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "plain".to_string()
}

fn default_retry_attempts() -> usize {
    DEFAULT_RESUBSCRIBE_ATTEMPTS
}

fn default_retry_backoff_secs() -> u64 {
    DEFAULT_RESUBSCRIBE_BACKOFF.as_secs()
}

impl Default for EvmConfig {
    fn default() -> Self {
        Self {
            rpc: default_evm_rpc(),
            contract_address: String::new(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            backoff_secs: default_retry_backoff_secs(),
        }
    }
}

impl From<StartArgs> for StartConfig {
    fn from(args: StartArgs) -> Self {
        Self {
            evm: EvmConfig {
                rpc: args.evm_rpc,
                contract_address: args.evm_contract_address.unwrap_or_default(),
            },
            metrics: telemetry::Config {
                endpoint: args.metrics_endpoint,
                tls: args.metrics_tls,
                label: args.metrics_label,
            },
            log: LogConfig {
                level: args.log_level,
                format: args.log_format,
            },
            retry: RetryConfig {
                attempts: args.retry_attempts,
                backoff_secs: args.retry_backoff_secs,
            },
            sentry_url: args.sentry_url,
        }
    }
}

impl StartConfig {
    pub(crate) fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, Error> {
        let contents = fs::read_to_string(config_path)?;

        let config: StartConfig = toml::from_str(&contents)?;

        Ok(config)
    }

    /// Check everything that has to be right before connecting anywhere.
    pub(crate) fn validate(&self) -> Result<Validated, Error> {
        let contract =
            client::validate_address(&self.evm.contract_address).map_err(Error::ContractAddress)?;
        let log_level = self.log.level.parse().map_err(Error::LogLevel)?;
        let log_format = self.log.format.parse().map_err(Error::LogFormat)?;

        Ok(Validated {
            contract,
            log_level,
            log_format,
            retry: RetryPolicy::new(
                self.retry.attempts,
                Duration::from_secs(self.retry.backoff_secs),
            ),
        })
    }
}
