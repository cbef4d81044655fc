//! The loop that turns commitment events into metrics.

use std::convert::Infallible;

use chain_events::{RetryPolicy, Subscriber, Subscription};
use client::CommitmentEvent;
use futures::StreamExt;
use telemetry::{bridge::SampleSender, Meters};
use tokio_util::sync::CancellationToken;

/// Errors that end the watch loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(missing_docs)]
pub enum Error {
    #[error(transparent)]
    Subscription(chain_events::Error),

    #[error("watcher cancelled")]
    Cancelled,
}

impl From<chain_events::Error> for Error {
    fn from(value: chain_events::Error) -> Self {
        match value {
            chain_events::Error::Cancelled => Self::Cancelled,
            e => Self::Subscription(e),
        }
    }
}

/// The crate result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Where the watch loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Opening the first subscription.
    Starting,

    /// Handling events of a live subscription.
    Running,

    /// Replacing a failed subscription.
    Recovering,

    /// The loop has returned.
    Terminated,
}

/// Watches commitment events and reports them as metrics.
pub struct Watcher<S> {
    subscriber: S,
    retry: RetryPolicy,
    meters: Meters,
    nonces: SampleSender,
    heights: SampleSender,
    state: WatchState,
    processed: u64,
}

impl<S: Subscriber> Watcher<S> {
    /// Create a new `Watcher`.
    ///
    /// # Arguments
    ///
    /// * `subscriber`: source of subscriptions
    /// * `retry`: how failed subscriptions are replaced
    /// * `meters`: instruments to update per event
    /// * `nonces`: producer half of the nonce samples buffer
    /// * `heights`: producer half of the height samples buffer
    pub fn new(
        subscriber: S,
        retry: RetryPolicy,
        meters: Meters,
        nonces: SampleSender,
        heights: SampleSender,
    ) -> Self {
        Self {
            subscriber,
            retry,
            meters,
            nonces,
            heights,
            state: WatchState::Starting,
            processed: 0,
        }
    }

    /// Current state of the loop.
    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Number of events handled since the watcher was created.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Run until `cancel` fires or the subscription can not be recovered,
    /// returns the reason the loop stopped.
    ///
    /// A failure to open the first subscription is returned as is,
    /// cancellation is reported as [`Error::Cancelled`].
    pub async fn run(&mut self, cancel: CancellationToken) -> Error {
        let err = match self.watch(&cancel).await {
            Ok(never) => match never {},
            Err(e) => e,
        };

        self.state = WatchState::Terminated;

        match &err {
            Error::Cancelled => vlog::info!("watcher shutting down"),
            e => vlog::error!("watcher terminated: {e}"),
        }

        err
    }

    async fn watch(&mut self, cancel: &CancellationToken) -> Result<Infallible> {
        self.state = WatchState::Starting;
        vlog::info!("subscribing to commitment events");

        let mut subscription = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            subscription = self.subscriber.subscribe() => subscription?,
        };

        self.state = WatchState::Running;
        vlog::info!("waiting for commitment events");

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    subscription.unsubscribe();
                    return Err(Error::Cancelled);
                }
                item = subscription.next() => item,
            };

            let cause = match item {
                Some(Ok(event)) => {
                    self.handle_event(event);
                    continue;
                }
                Some(Err(e)) => e,
                None => chain_events::Error::SubscriptionClosed,
            };

            subscription = self.recover(subscription, cause, cancel).await?;
        }
    }

    async fn recover(
        &mut self,
        failed: Subscription,
        cause: chain_events::Error,
        cancel: &CancellationToken,
    ) -> Result<Subscription> {
        vlog::error!("commitment events subscription failed: {cause}");

        failed.unsubscribe();
        drop(failed);

        self.state = WatchState::Recovering;

        let subscription = self
            .retry
            .resubscribe(&mut self.subscriber, cause, cancel)
            .await?;

        self.state = WatchState::Running;
        vlog::info!("commitment events subscription recovered");

        Ok(subscription)
    }

    fn handle_event(&mut self, event: CommitmentEvent) {
        vlog::info!(
            "new data commitment stored, nonce: {}, commitment: {}, blocks: {}..{}",
            event.proof_nonce,
            event.data_commitment_hex(),
            event.start_block,
            event.end_block,
        );

        self.processed += 1;
        self.meters.record_processed();

        self.nonces.offer(event.nonce_sample());
        self.heights.offer(event.height_sample());
    }
}
