//! Update stream for UI subscribers

use crate::progress::EventOutcome;
use crate::session::SessionStatus;
use castate_traits::BalanceSnapshot;
use tokio::sync::broadcast;

/// A change to one of the adapter's records
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterUpdate {
    /// The session moved to a new status
    SessionChanged(SessionStatus),
    /// The cached balance snapshot was replaced
    BalanceUpdated(BalanceSnapshot),
    /// The SDK asked for allowances on this many sources
    AllowanceRequested {
        /// Number of sources
        sources: usize,
    },
    /// The allowance request was cleared
    AllowanceCleared,
    /// The SDK proposed a transfer plan
    IntentRequested,
    /// The transfer plan was re-quoted
    IntentRefreshed,
    /// The intent record was reset
    IntentCleared,
    /// A progress event was handled
    Progress(EventOutcome),
}

pub(crate) struct UpdateBus {
    sender: broadcast::Sender<AdapterUpdate>,
}

impl UpdateBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, update: AdapterUpdate) {
        // no subscribers is fine
        if self.sender.send(update).is_err() {
            tracing::trace!("update dropped, no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AdapterUpdate> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = UpdateBus::new(4);
        bus.publish(AdapterUpdate::IntentCleared);

        let mut rx = bus.subscribe();
        bus.publish(AdapterUpdate::AllowanceCleared);
        assert_eq!(rx.recv().await.unwrap(), AdapterUpdate::AllowanceCleared);
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let bus = UpdateBus::new(1);
        let mut rx = bus.subscribe();
        bus.publish(AdapterUpdate::IntentRequested);
        bus.publish(AdapterUpdate::IntentRefreshed);

        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Lagged(1))));
        assert_eq!(rx.recv().await.unwrap(), AdapterUpdate::IntentRefreshed);
    }
}
