#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum Error {
    #[error("failed to build the OTLP metrics exporter: {0}")]
    Exporter(String),

    #[error("failed to flush the meter provider: {0}")]
    Flush(String),

    #[error("failed to shut down the meter provider: {0}")]
    Shutdown(String),
}

/// The crate result type.
pub type Result<T> = std::result::Result<T, Error>;
