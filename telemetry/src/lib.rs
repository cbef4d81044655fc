#![deny(unused_crate_dependencies)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![warn(unused_imports)]

//! Metrics of the monitor and their export over OTLP.
//!
//! The meter provider is owned by a [`Telemetry`] value that is created
//! once at startup and handed to whoever needs to emit metrics; nothing is
//! registered globally.

use std::time::Duration;

use opentelemetry::{
    metrics::{Counter, Meter, MeterProvider, ObservableGauge},
    KeyValue,
};
use opentelemetry_otlp::{Compression, MetricExporter, Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::{
    metrics::{ManualReader, PeriodicReader, SdkMeterProvider},
    Resource,
};
use serde::Deserialize;

pub mod bridge;
mod error;
pub mod teardown;

use bridge::SampleSource;
pub use error::{Error, Result};
pub use teardown::Teardown;

const METRICS_COLLECT_INTERVAL: Duration = Duration::from_secs(10);

/// Namespace every metric of this service is reported under.
pub const METRICS_NAMESPACE: &str = "blobstreamx-watcher";

/// Counter of observed commitments.
pub const PROCESSED_NONCES_COUNTER: &str = "blobstreamx_monitor_submitted_nonces_counter";

/// Gauge of the last observed proof nonce.
pub const SUBMITTED_NONCES_GAUGE: &str = "blobstreamx_monitor_submitted_nonces";

/// Gauge of the last observed committed height.
pub const SUBMITTED_HEIGHTS_GAUGE: &str = "blobstreamx_monitor_submitted_heights";

/// Default metric label.
pub const DEFAULT_LABEL: &str = "blobstream x";

/// Configuration of the metrics export.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// `host:port` of the OTLP/HTTP collector.
    pub endpoint: String,

    /// Use `https` to talk to the collector.
    #[serde(default)]
    pub tls: bool,

    /// Reported as the instance id of the service.
    #[serde(default = "default_label")]
    pub label: String,
}

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

impl Config {
    /// Full URL of the collector's metrics route.
    ///
    /// An explicit scheme in `endpoint` wins over the `tls` flag.
    pub fn exporter_url(&self) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');

        if endpoint.contains("://") {
            return format!("{endpoint}/v1/metrics");
        }

        let scheme = if self.tls { "https" } else { "http" };

        format!("{scheme}://{endpoint}/v1/metrics")
    }
}

/// Owner of the meter provider.
pub struct Telemetry {
    provider: SdkMeterProvider,
    meter: Meter,
}

/// Instruments updated by the event loop.
pub struct Meters {
    processed_nonces: Counter<u64>,
    _submitted_nonces: ObservableGauge<i64>,
    _submitted_heights: ObservableGauge<i64>,
}

impl Meters {
    /// Count one more processed commitment.
    pub fn record_processed(&self) {
        self.processed_nonces.add(1, &[]);
        tracing::debug!("incrementing metric '{PROCESSED_NONCES_COUNTER}'");
    }
}

// One non-blocking poll of `source` on behalf of a gauge callback.
fn take_sample<S: SampleSource + ?Sized>(source: &S) -> Option<i64> {
    match source.try_take() {
        Ok(Some(sample)) => {
            tracing::debug!("recording metric '{}'", source.series());
            Some(sample)
        }
        Ok(None) => None,
        Err(e) => {
            vlog::error!("error reading sample in gauge callback: {e}");
            None
        }
    }
}

impl Telemetry {
    /// Start exporting metrics to the collector described by `config`.
    ///
    /// The periodic reader collects and exports on a thread of its own, every
    /// request body is gzip compressed.
    ///
    /// # Arguments
    ///
    /// * `config`: collector settings
    /// * `service_name`: reported as the service name, usually the contract address
    pub fn start(config: &Config, service_name: &str) -> Result<Self> {
        let exporter = MetricExporter::builder()
            .with_http()
            .with_protocol(Protocol::HttpBinary)
            .with_endpoint(config.exporter_url())
            .with_timeout(METRICS_COLLECT_INTERVAL)
            .with_compression(Compression::Gzip)
            .build()
            .map_err(|e| Error::Exporter(e.to_string()))?;

        let reader = PeriodicReader::builder(exporter)
            .with_interval(METRICS_COLLECT_INTERVAL)
            .build();

        let resource = Resource::builder_empty()
            .with_attributes([
                KeyValue::new("service.namespace", METRICS_NAMESPACE),
                KeyValue::new("service.name", service_name.to_string()),
                KeyValue::new("service.instance.id", config.label.clone()),
            ])
            .build();

        let provider = SdkMeterProvider::builder()
            .with_reader(reader)
            .with_resource(resource)
            .build();

        vlog::info!(
            "meter provider set up, namespace: {METRICS_NAMESPACE}, service name: {service_name}, instance id: {}, collector: {}",
            config.label,
            config.exporter_url(),
        );

        Ok(Self::with_provider(provider))
    }

    /// Wrap an already built provider.
    pub fn with_provider(provider: SdkMeterProvider) -> Self {
        let meter = provider.meter(METRICS_NAMESPACE);

        Self { provider, meter }
    }

    /// A provider that records but never exports.
    ///
    /// Nothing collects from its manual reader, so the gauge callbacks and
    /// the sample sources they own stay registered but are never polled.
    pub fn without_export() -> Self {
        let provider = SdkMeterProvider::builder()
            .with_reader(ManualReader::builder().build())
            .build();

        Self::with_provider(provider)
    }

    /// Register the instruments of the monitor.
    ///
    /// The gauges take at most one sample from their source every time the
    /// provider collects; the sources are polled from the reader's thread.
    pub fn init_meters<N, H>(&self, nonces: N, heights: H) -> Meters
    where
        N: SampleSource + 'static,
        H: SampleSource + 'static,
    {
        let processed_nonces = self
            .meter
            .u64_counter(PROCESSED_NONCES_COUNTER)
            .with_description(
                "the count of the nonces that have been successfully submitted to blobstreamx contract",
            )
            .build();

        let submitted_nonces = self
            .meter
            .i64_observable_gauge(SUBMITTED_NONCES_GAUGE)
            .with_description("the last nonce submitted to blobstreamx contract")
            .with_callback(move |observer| {
                if let Some(nonce) = take_sample(&nonces) {
                    observer.observe(nonce, &[]);
                }
            })
            .build();

        let submitted_heights = self
            .meter
            .i64_observable_gauge(SUBMITTED_HEIGHTS_GAUGE)
            .with_description("the last height committed to blobstreamx contract")
            .with_callback(move |observer| {
                if let Some(height) = take_sample(&heights) {
                    observer.observe(height, &[]);
                }
            })
            .build();

        Meters {
            processed_nonces,
            _submitted_nonces: submitted_nonces,
            _submitted_heights: submitted_heights,
        }
    }

    /// Flush pending data and stop the provider.
    ///
    /// Shutdown is attempted even if the flush fails; a shutdown error is
    /// reported in preference to a flush error.
    pub fn shutdown(self) -> Result<()> {
        let flushed = self
            .provider
            .force_flush()
            .map_err(|e| Error::Flush(e.to_string()));

        self.provider
            .shutdown()
            .map_err(|e| Error::Shutdown(e.to_string()))?;

        flushed
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry_sdk::metrics::{
        data::{AggregatedMetrics, MetricData},
        InMemoryMetricExporter, InMemoryMetricExporterBuilder, Temporality,
    };
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::bridge::{channel, BridgeError};

    fn config(endpoint: &str, tls: bool) -> Config {
        Config {
            endpoint: endpoint.to_string(),
            tls,
            label: DEFAULT_LABEL.to_string(),
        }
    }

    #[test]
    fn exporter_url_follows_tls_flag() {
        assert_eq!(
            config("localhost:4318", false).exporter_url(),
            "http://localhost:4318/v1/metrics"
        );
        assert_eq!(
            config("collector.example.com:4318/", true).exporter_url(),
            "https://collector.example.com:4318/v1/metrics"
        );
    }

    #[test]
    fn exporter_url_keeps_explicit_scheme() {
        assert_eq!(
            config("https://otel:4318", false).exporter_url(),
            "https://otel:4318/v1/metrics"
        );
    }

    #[test]
    fn config_defaults_label() {
        let config: Config = toml::from_str(r#"endpoint = "localhost:4318""#).unwrap();

        assert_eq!(config, self::config("localhost:4318", false));
    }

    #[test]
    fn sample_polled_once_per_callback() {
        let (tx, rx) = channel(SUBMITTED_NONCES_GAUGE, 4);
        tx.offer(10);
        tx.offer(11);

        assert_eq!(take_sample(&rx), Some(10));
        assert_eq!(take_sample(&rx), Some(11));
        assert_eq!(take_sample(&rx), None);
    }

    #[test]
    fn disconnected_source_observes_nothing() {
        let (tx, rx) = channel(SUBMITTED_HEIGHTS_GAUGE, 4);
        drop(tx);

        assert_eq!(
            rx.try_take(),
            Err(BridgeError::Disconnected(SUBMITTED_HEIGHTS_GAUGE))
        );
        assert_eq!(take_sample(&rx), None);
    }

    #[test]
    fn sources_stay_registered_without_export() {
        let telemetry = Telemetry::without_export();
        let (nonces_tx, nonces_rx) = channel(SUBMITTED_NONCES_GAUGE, 4);
        let (heights_tx, heights_rx) = channel(SUBMITTED_HEIGHTS_GAUGE, 4);

        let meters = telemetry.init_meters(nonces_rx, heights_rx);
        meters.record_processed();

        assert!(nonces_tx.offer(1));
        assert!(heights_tx.offer(100));
        assert_eq!(nonces_tx.len(), 1);
        assert_eq!(heights_tx.len(), 1);

        telemetry.shutdown().unwrap();
    }

    // Values the last collection reported for `gauge`.
    fn gauge_values(exporter: &InMemoryMetricExporter, gauge: &str) -> Vec<i64> {
        let exported = exporter.get_finished_metrics().unwrap();
        let Some(last) = exported.last() else {
            return Vec::new();
        };

        last.scope_metrics()
            .flat_map(|scope| scope.metrics())
            .filter(|metric| metric.name() == gauge)
            .flat_map(|metric| match metric.data() {
                AggregatedMetrics::I64(MetricData::Gauge(gauge)) => {
                    gauge.data_points().map(|point| point.value()).collect()
                }
                _ => Vec::new(),
            })
            .collect()
    }

    #[test]
    fn gauge_takes_one_sample_per_collection() {
        let exporter = InMemoryMetricExporterBuilder::new()
            .with_temporality(Temporality::Cumulative)
            .build();
        let reader = PeriodicReader::builder(exporter.clone())
            .with_interval(Duration::from_secs(3600))
            .build();
        let provider = SdkMeterProvider::builder().with_reader(reader).build();
        let telemetry = Telemetry::with_provider(provider.clone());

        let (nonces_tx, nonces_rx) = channel(SUBMITTED_NONCES_GAUGE, 4);
        let (_heights_tx, heights_rx) = channel(SUBMITTED_HEIGHTS_GAUGE, 4);
        let _meters = telemetry.init_meters(nonces_rx, heights_rx);

        for nonce in 1..=3 {
            assert!(nonces_tx.offer(nonce));
        }

        let mut observed = Vec::new();
        for _ in 0..4 {
            exporter.reset();
            provider.force_flush().unwrap();
            observed.push((gauge_values(&exporter, SUBMITTED_NONCES_GAUGE), nonces_tx.len()));
        }

        // The fourth collection finds the buffer empty and leaves the last
        // observed value in place.
        assert_eq!(
            observed,
            vec![
                (vec![1], 2),
                (vec![2], 1),
                (vec![3], 0),
                (vec![3], 0),
            ]
        );

        telemetry.shutdown().unwrap();
    }
}
