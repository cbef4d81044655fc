#![deny(unused_crate_dependencies)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]
#![warn(unused_imports)]

//! Subscriptions to `DataCommitmentStored` events and their recovery.

mod commitment_events;
mod error;
mod retry;
mod subscription;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use commitment_events::{pubsub_url, CommitmentEvents, EVENTS_CHANNEL_CAPACITY};
pub use error::{Error, Result};
pub use retry::{RetryPolicy, DEFAULT_RESUBSCRIBE_ATTEMPTS, DEFAULT_RESUBSCRIBE_BACKOFF};
pub use subscription::{Subscriber, Subscription};
