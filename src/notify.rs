// Change notification for the bet registry
//
// Events carry no state a consumer should trust beyond "bet X changed";
// watchers re-query and replace their view instead of patching it.

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::BetError;
use crate::feed::FeedProjector;
use crate::models::BetCard;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Created,
    Accepted,
    Settled,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RegistryEvent {
    pub bet_id: Uuid,
    pub kind: ChangeKind,
}

impl RegistryEvent {
    pub fn new(bet_id: Uuid, kind: ChangeKind) -> Self {
        Self { bet_id, kind }
    }
}

/// Fan-out of registry changes to any number of subscribers
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    tx: broadcast::Sender<RegistryEvent>,
}

impl ChangeNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: RegistryEvent) {
        // no subscribers is not an error
        match self.tx.send(event) {
            Ok(receivers) => debug!(bet_id = %event.bet_id, kind = ?event.kind, receivers, "registry change published"),
            Err(_) => debug!(bet_id = %event.bet_id, kind = ?event.kind, "registry change with no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RegistryEvent> {
        self.tx.subscribe()
    }
}

/// Keeps the latest public feed, refreshed wholesale on every registry change
pub struct FeedWatcher {
    feed: FeedProjector,
    events: broadcast::Receiver<RegistryEvent>,
    snapshot: Vec<BetCard>,
}

impl FeedWatcher {
    /// Subscribes before the first fetch so no change can slip between the two
    pub fn new(feed: FeedProjector, notifier: &ChangeNotifier) -> Result<Self, BetError> {
        let events = notifier.subscribe();
        let snapshot = feed.public_cards(0, None)?;
        Ok(Self {
            feed,
            events,
            snapshot,
        })
    }

    pub fn snapshot(&self) -> &[BetCard] {
        &self.snapshot
    }

    /// Waits for the next change, then re-fetches the feed.
    /// Returns None once the notifier is gone.
    pub async fn changed(&mut self) -> Option<Result<(), BetError>> {
        match self.events.recv().await {
            Ok(_) => {}
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "feed watcher lagged, refreshing");
            }
            Err(RecvError::Closed) => return None,
        }

        // a burst of changes needs only one re-fetch
        loop {
            match self.events.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }

        Some(self.refresh())
    }

    fn refresh(&mut self) -> Result<(), BetError> {
        self.snapshot = self.feed.public_cards(0, None)?;
        Ok(())
    }
}
