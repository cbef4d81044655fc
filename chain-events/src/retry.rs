use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{Error, Result, Subscriber, Subscription};

/// Default number of resubscription attempts after a subscription fails.
pub const DEFAULT_RESUBSCRIBE_ATTEMPTS: usize = 50;

/// Default delay between two resubscription attempts.
pub const DEFAULT_RESUBSCRIBE_BACKOFF: Duration = Duration::from_secs(30);

/// Bounded resubscription with a constant delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// How many times to try to subscribe again within one failure episode.
    pub attempts: usize,

    /// Delay between two consecutive attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RESUBSCRIBE_ATTEMPTS,
            backoff: DEFAULT_RESUBSCRIBE_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Create a new `RetryPolicy`.
    pub fn new(attempts: usize, backoff: Duration) -> Self {
        Self { attempts, backoff }
    }

    /// Replace a failed subscription.
    ///
    /// Every call starts a new failure episode with a full budget of attempts.
    /// The backoff is interrupted by `cancel`, in which case [`Error::Cancelled`]
    /// is returned.
    ///
    /// # Arguments
    ///
    /// * `subscriber`: used to open the new subscription
    /// * `cause`: the error the old subscription failed with, returned as is if
    ///   the policy allows no attempts
    /// * `cancel`: shutdown signal
    pub async fn resubscribe<S>(
        &self,
        subscriber: &mut S,
        cause: Error,
        cancel: &CancellationToken,
    ) -> Result<Subscription>
    where
        S: Subscriber + ?Sized,
    {
        let mut last_error = cause;

        for attempt in 1..=self.attempts {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match subscriber.subscribe().await {
                Ok(subscription) => {
                    vlog::info!("resubscribed on attempt {attempt}/{}", self.attempts);
                    return Ok(subscription);
                }
                Err(e) => {
                    vlog::error!(
                        "subscription failed, attempt {attempt}/{}, retrying in {:?}: {e}",
                        self.attempts,
                        self.backoff,
                    );
                    last_error = e;
                }
            }

            if attempt == self.attempts {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::ScriptedSubscriber;

    fn fast(attempts: usize) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(1))
    }

    fn failure(n: usize) -> Error {
        Error::Middleware(format!("failure {n}"))
    }

    #[test]
    fn default_matches_documented_values() {
        assert_eq!(
            RetryPolicy::default(),
            RetryPolicy::new(50, Duration::from_secs(30))
        );
    }

    #[tokio::test]
    async fn recovers_after_failures_below_bound() {
        let (mut subscriber, _handles) =
            ScriptedSubscriber::new([Err(failure(1)), Err(failure(2)), Ok(())]);
        let attempts = subscriber.attempts();

        let res = fast(3)
            .resubscribe(&mut subscriber, Error::SubscriptionClosed, &CancellationToken::new())
            .await;

        assert!(res.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let (mut subscriber, _handles) =
            ScriptedSubscriber::new([Err(failure(1)), Err(failure(2)), Err(failure(3))]);
        let attempts = subscriber.attempts();

        let res = fast(3)
            .resubscribe(&mut subscriber, Error::SubscriptionClosed, &CancellationToken::new())
            .await;

        assert_eq!(res.unwrap_err(), failure(3));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn no_attempts_returns_cause() {
        let (mut subscriber, _handles) = ScriptedSubscriber::succeeding();
        let attempts = subscriber.attempts();

        let res = fast(0)
            .resubscribe(&mut subscriber, Error::SubscriptionClosed, &CancellationToken::new())
            .await;

        assert_eq!(res.unwrap_err(), Error::SubscriptionClosed);
        assert_eq!(attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancellation_interrupts_backoff() {
        let (mut subscriber, _handles) = ScriptedSubscriber::new([Err(failure(1)), Ok(())]);
        let attempts = subscriber.attempts();
        let cancel = CancellationToken::new();
        let policy = RetryPolicy::new(2, Duration::from_secs(3600));

        let (res, ()) = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::join!(
                policy.resubscribe(&mut subscriber, Error::SubscriptionClosed, &cancel),
                async {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    cancel.cancel();
                }
            )
        })
        .await
        .unwrap();

        assert_eq!(res.unwrap_err(), Error::Cancelled);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
