//! A scripted [`Subscriber`] for driving subscription consumers in tests.

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use client::CommitmentEvent;

use crate::{Error, Result, Subscriber, Subscription};

const SCRIPTED_CHANNEL_CAPACITY: usize = 100;

/// Producer side of a subscription handed out by [`ScriptedSubscriber`].
#[derive(Debug)]
pub struct SubscriptionHandle {
    sender: mpsc::Sender<Result<CommitmentEvent>>,
    token: CancellationToken,
}

impl SubscriptionHandle {
    /// Deliver an event on this subscription.
    pub async fn emit(&self, event: CommitmentEvent) {
        // The consumer may already have replaced this subscription.
        let _ = self.sender.send(Ok(event)).await;
    }

    /// Report a transport failure on this subscription.
    pub async fn fail(&self, error: Error) {
        let _ = self.sender.send(Err(error)).await;
    }

    /// Whether the consumer unsubscribed.
    pub fn is_unsubscribed(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Subscriber that fails or succeeds according to a script.
///
/// Once the script is exhausted every further attempt succeeds. The producer
/// side of each successful subscription is sent to the receiver returned
/// from the constructor.
pub struct ScriptedSubscriber {
    script: VecDeque<Result<()>>,
    attempts: Arc<AtomicUsize>,
    handles: mpsc::UnboundedSender<SubscriptionHandle>,
}

impl ScriptedSubscriber {
    /// Create a subscriber playing `script` on successive `subscribe` calls.
    pub fn new<I>(script: I) -> (Self, mpsc::UnboundedReceiver<SubscriptionHandle>)
    where
        I: IntoIterator<Item = Result<()>>,
    {
        let (handles, handles_rx) = mpsc::unbounded_channel();

        (
            Self {
                script: script.into_iter().collect(),
                attempts: Arc::new(AtomicUsize::new(0)),
                handles,
            },
            handles_rx,
        )
    }

    /// A subscriber whose every attempt succeeds.
    pub fn succeeding() -> (Self, mpsc::UnboundedReceiver<SubscriptionHandle>) {
        Self::new(Vec::new())
    }

    /// Shared count of `subscribe` calls made so far.
    pub fn attempts(&self) -> Arc<AtomicUsize> {
        self.attempts.clone()
    }
}

#[async_trait]
impl Subscriber for ScriptedSubscriber {
    async fn subscribe(&mut self) -> Result<Subscription> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        self.script.pop_front().unwrap_or(Ok(()))?;

        let (sender, receiver) = mpsc::channel(SCRIPTED_CHANNEL_CAPACITY);
        let token = CancellationToken::new();

        let _ = self.handles.send(SubscriptionHandle {
            sender,
            token: token.clone(),
        });

        Ok(Subscription::new(receiver, token))
    }
}
