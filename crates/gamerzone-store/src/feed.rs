use tokio::sync::broadcast;

/// A write landed in `collection`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub collection: String,
}

/// Fans out write notifications to every live query.
pub struct ChangeFeed {
    tx: broadcast::Sender<Change>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }

    pub fn publish(&self, collection: &str) {
        // No receivers just means nobody is watching.
        let _ = self.tx.send(Change {
            collection: collection.to_string(),
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}
