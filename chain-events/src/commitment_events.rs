use async_trait::async_trait;
use ethers::{
    abi::{Address, RawLog},
    contract::EthEvent,
    providers::{Middleware, Provider, Ws},
    types::Filter,
};
use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use url::Url;

use client::{CommitmentEvent, DataCommitmentStoredFilter};

use crate::{Error, Result, Subscriber, Subscription};

/// Capacity of the channel between a log subscription and its consumer.
pub const EVENTS_CHANNEL_CAPACITY: usize = 100;

/// Listener of `DataCommitmentStored` events of a single contract.
///
/// `ethers` log subscriptions borrow the provider they were opened on, so
/// every subscription runs in its own task owning its provider and hands
/// decoded events over a channel.
pub struct CommitmentEvents {
    url: Url,
    contract: Address,
    provider: Option<Provider<Ws>>,
}

/// Turn an `http(s)` endpoint into the matching `ws(s)` one.
///
/// Log subscriptions need a pubsub transport, other schemes are kept as is.
pub fn pubsub_url(endpoint: &str) -> Result<Url> {
    let mut url = Url::parse(endpoint).map_err(|_| Error::InvalidEndpoint(endpoint.to_string()))?;

    let scheme = match url.scheme() {
        "http" => Some("ws"),
        "https" => Some("wss"),
        _ => None,
    };

    if let Some(scheme) = scheme {
        url.set_scheme(scheme)
            .map_err(|_| Error::InvalidEndpoint(endpoint.to_string()))?;
    }

    Ok(url)
}

impl CommitmentEvents {
    /// Connect to the node at `endpoint`.
    ///
    /// # Arguments
    ///
    /// * `endpoint`: URL of the node, `http(s)` is rewritten to `ws(s)`
    /// * `contract`: address of the `BlobstreamX` contract
    pub async fn connect(endpoint: &str, contract: Address) -> Result<Self> {
        let url = pubsub_url(endpoint)?;
        let provider = Self::dial(&url).await?;

        Ok(Self {
            url,
            contract,
            provider: Some(provider),
        })
    }

    async fn dial(url: &Url) -> Result<Provider<Ws>> {
        Provider::<Ws>::connect_with_reconnects(url.as_str(), 0)
            .await
            .map_err(|e| Error::Connection {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    fn filter(&self) -> Filter {
        Filter::new()
            .address(self.contract)
            .topic0(vec![DataCommitmentStoredFilter::signature()])
    }
}

#[async_trait]
impl Subscriber for CommitmentEvents {
    // The connection made in `connect` serves the first subscription, any
    // later one dials the node again as the old socket is likely dead.
    async fn subscribe(&mut self) -> Result<Subscription> {
        let provider = match self.provider.take() {
            Some(provider) => provider,
            None => Self::dial(&self.url).await?,
        };

        let (sender, receiver) = mpsc::channel(EVENTS_CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = oneshot::channel();
        let token = CancellationToken::new();

        tokio::spawn(forward_logs(
            provider,
            self.filter(),
            sender,
            ready_tx,
            token.clone(),
        ));

        ready_rx.await.map_err(|_| Error::SubscriptionClosed)??;

        vlog::info!(
            "subscribed to commitment events of {:?} at {}",
            self.contract,
            self.url
        );

        Ok(Subscription::new(receiver, token))
    }
}

async fn forward_logs(
    provider: Provider<Ws>,
    filter: Filter,
    sender: mpsc::Sender<Result<CommitmentEvent>>,
    ready: oneshot::Sender<Result<()>>,
    token: CancellationToken,
) {
    let logs = match provider.subscribe_logs(&filter).await {
        Ok(logs) => {
            let _ = ready.send(Ok(()));
            logs
        }
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };
    tokio::pin!(logs);

    loop {
        let log = tokio::select! {
            _ = token.cancelled() => {
                if let Err(e) = logs.unsubscribe().await {
                    vlog::debug!("failed to unsubscribe from commitment events: {e}");
                }
                return;
            }
            log = logs.next() => log,
        };

        let Some(log) = log else {
            vlog::warn!("commitment events stream ended");
            let _ = sender.send(Err(Error::SubscriptionClosed)).await;
            return;
        };

        let raw_log: RawLog = log.into();

        let event: CommitmentEvent = match DataCommitmentStoredFilter::decode_log(&raw_log) {
            Ok(event) => event.into(),
            Err(e) => {
                vlog::warn!("skipping undecodable commitment log: {e}");
                continue;
            }
        };

        if sender.send(Ok(event)).await.is_err() {
            return;
        }
    }
}
