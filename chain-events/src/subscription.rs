use std::{
    pin::Pin,
    task::{Context, Poll},
};

use async_trait::async_trait;
use auto_impl::auto_impl;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use client::CommitmentEvent;

use crate::Result;

/// A live stream of commitment events.
///
/// Yields events in the order the transport delivers them. An `Err` item
/// or the end of the stream means the subscription has failed and has to
/// be replaced. Dropping the subscription unsubscribes it.
#[derive(Debug)]
pub struct Subscription {
    events: ReceiverStream<Result<CommitmentEvent>>,
    token: CancellationToken,
}

impl Subscription {
    /// Create a subscription fed by `events`.
    ///
    /// # Arguments
    ///
    /// * `events`: receiving end of the producer's channel
    /// * `token`: cancelled on unsubscribe, the producer is expected to stop on it
    pub fn new(events: mpsc::Receiver<Result<CommitmentEvent>>, token: CancellationToken) -> Self {
        Self {
            events: ReceiverStream::new(events),
            token,
        }
    }

    /// Stop the producer of this subscription. Idempotent.
    pub fn unsubscribe(&self) {
        self.token.cancel();
    }

    /// Whether `unsubscribe` has been called.
    pub fn is_unsubscribed(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Stream for Subscription {
    type Item = Result<CommitmentEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_next_unpin(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Something that can open a new [`Subscription`].
#[async_trait]
#[auto_impl(&mut, Box)]
pub trait Subscriber: Send {
    /// Open a new subscription.
    async fn subscribe(&mut self) -> Result<Subscription>;
}
