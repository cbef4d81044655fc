#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    #[error("{0}: flag --evm.contract-address")]
    ContractAddress(#[source] client::AddressError),

    #[error("{0}: flag --log.level")]
    LogLevel(#[source] vlog::Error),

    #[error("{0}: flag --log.format")]
    LogFormat(#[source] vlog::Error),
}
