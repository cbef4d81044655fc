use ethers::prelude::MiddlewareError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(missing_docs)]
pub enum Error {
    #[error("Middleware error {0}")]
    Middleware(String),

    #[error("failed to connect to {url}: {reason}")]
    Connection { url: String, reason: String },

    #[error("invalid chain endpoint {0:?}")]
    InvalidEndpoint(String),

    #[error("subscription stream closed")]
    SubscriptionClosed,

    #[error("cancelled")]
    Cancelled,
}

impl<M: MiddlewareError> From<M> for Error {
    fn from(value: M) -> Self {
        Self::Middleware(value.to_string())
    }
}

/// The crate result type.
pub type Result<T> = std::result::Result<T, Error>;
