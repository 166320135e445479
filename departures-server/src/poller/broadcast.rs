//! Topic-keyed "new snapshot" notifications.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::debug;

const CHANNEL_CAPACITY: usize = 16;

/// Signal that a topic's snapshot was replaced. Carries no data; readers
/// fetch the snapshot themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotUpdated;

/// One broadcast channel per topic, created on first use.
#[derive(Debug, Default)]
pub struct Broadcaster {
    channels: Mutex<HashMap<String, broadcast::Sender<SnapshotUpdated>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<SnapshotUpdated> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<SnapshotUpdated> {
        self.sender(topic).subscribe()
    }

    /// Notify subscribers of `topic`. Returns how many were reached; having
    /// none is fine.
    pub fn publish(&self, topic: &str) -> usize {
        let receivers = self.sender(topic).send(SnapshotUpdated).unwrap_or(0);
        debug!(%topic, receivers, "published snapshot update");
        receivers
    }
}
