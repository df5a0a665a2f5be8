//! Host notification.
//!
//! The adapter calls [`StateObserver::state_changed`] once after every
//! successfully applied inbound message and every local mutation. The host
//! decides what to do with it; the adapter never polls.

use futures::stream::{self, Stream};
use tokio::sync::broadcast;
use tracing::debug;

use crate::state::DeviceState;

/// Default channel capacity for [`ChannelObserver`].
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Receives a snapshot whenever the adapter's observable state changes.
pub trait StateObserver: Send + Sync {
    fn state_changed(&self, state: &DeviceState);
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StateObserver for NoopObserver {
    fn state_changed(&self, _state: &DeviceState) {}
}

/// Observer that fans snapshots out over a broadcast channel.
///
/// Slow subscribers may miss intermediate snapshots; the latest one always
/// reflects the full device state.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: broadcast::Sender<DeviceState>,
}

impl ChannelObserver {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to state snapshots.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceState> {
        self.tx.subscribe()
    }

    /// Subscribe as a stream, skipping over lagged snapshots.
    pub fn stream(&self) -> impl Stream<Item = DeviceState> + Send + 'static {
        stream::unfold(self.tx.subscribe(), |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(state) => return Some((state, rx)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "State subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }

    /// Get the number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChannelObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl StateObserver for ChannelObserver {
    fn state_changed(&self, state: &DeviceState) {
        // No subscribers is fine; the host may not be listening yet.
        let _ = self.tx.send(state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_channel_observer_delivers() {
        let observer = ChannelObserver::new();
        let mut rx = observer.subscribe();
        assert_eq!(observer.subscriber_count(), 1);

        observer.state_changed(&DeviceState::new());
        let state = rx.recv().await.unwrap();
        assert_eq!(state, DeviceState::new());
    }

    #[tokio::test]
    async fn test_channel_observer_stream() {
        let observer = ChannelObserver::new();
        let mut stream = Box::pin(observer.stream());

        observer.state_changed(&DeviceState::new());
        assert_eq!(stream.next().await, Some(DeviceState::new()));
    }

    #[test]
    fn test_send_without_subscribers() {
        ChannelObserver::new().state_changed(&DeviceState::new());
    }
}
