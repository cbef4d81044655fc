//! Bounded hand-off of metric samples from the event loop to the
//! gauge callbacks of the meter provider.
//!
//! Both ends are non-blocking: a full buffer drops the newest sample,
//! an empty buffer yields no observation for the current tick.

use auto_impl::auto_impl;
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

/// Capacity of each per-series buffer.
pub const DEFAULT_BUFFER_CAPACITY: usize = 100;

/// Failure of a sample source, distinct from having no data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[allow(missing_docs)]
pub enum BridgeError {
    #[error("producer of {0} samples is gone")]
    Disconnected(&'static str),
}

/// A source of metric samples that is polled on the exporter's schedule.
#[auto_impl(&, Arc, Box)]
pub trait SampleSource: Send + Sync {
    /// Name of the metric series this source feeds.
    fn series(&self) -> &'static str;

    /// Take at most one sample without waiting.
    ///
    /// Returns `Ok(None)` if no sample is buffered.
    fn try_take(&self) -> Result<Option<i64>, BridgeError>;
}

/// Producing half of a sample buffer.
#[derive(Debug)]
pub struct SampleSender {
    series: &'static str,
    sender: Sender<i64>,
}

/// Consuming half of a sample buffer.
#[derive(Debug)]
pub struct SampleReceiver {
    series: &'static str,
    receiver: Receiver<i64>,
}

/// Create a bounded sample buffer for the metric `series`.
pub fn channel(series: &'static str, capacity: usize) -> (SampleSender, SampleReceiver) {
    let (sender, receiver) = crossbeam_channel::bounded(capacity);

    (
        SampleSender { series, sender },
        SampleReceiver { series, receiver },
    )
}

impl SampleSender {
    /// Enqueue a sample if there is room for it.
    ///
    /// Returns `false` if the sample was dropped.
    pub fn offer(&self, sample: i64) -> bool {
        match self.sender.try_send(sample) {
            Ok(()) => true,
            Err(TrySendError::Full(sample)) => {
                tracing::debug!("{} buffer is full, dropping sample {sample}", self.series);
                false
            }
            Err(TrySendError::Disconnected(sample)) => {
                tracing::debug!("{} buffer has no consumer, dropping sample {sample}", self.series);
                false
            }
        }
    }

    /// Number of samples waiting to be observed.
    pub fn len(&self) -> usize {
        self.sender.len()
    }

    /// Whether there are no samples waiting to be observed.
    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}

impl SampleSource for SampleReceiver {
    fn series(&self) -> &'static str {
        self.series
    }

    fn try_take(&self) -> Result<Option<i64>, BridgeError> {
        match self.receiver.try_recv() {
            Ok(sample) => Ok(Some(sample)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(BridgeError::Disconnected(self.series)),
        }
    }
}
