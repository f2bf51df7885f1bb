use tracing::{error, warn};

use gamerzone_store::{Document, LiveQuery};
use gamerzone_types::{ChatMessage, UserProfile};

use crate::error::ClientError;

/// Typed decoding of a delivered document.
pub trait FromDocument: Sized {
    fn from_document(doc: &Document) -> anyhow::Result<Self>;
}

impl FromDocument for ChatMessage {
    fn from_document(doc: &Document) -> anyhow::Result<Self> {
        let mut message: ChatMessage = doc.decode()?;
        message.id = doc.id.clone();
        Ok(message)
    }
}

impl FromDocument for UserProfile {
    fn from_document(doc: &Document) -> anyhow::Result<Self> {
        doc.decode()
    }
}

/// Consumer side of a live query. Each delivery replaces the whole view.
pub struct LiveView<T> {
    live: LiveQuery,
    items: Vec<T>,
    loaded: bool,
    chronological: bool,
}

impl<T: FromDocument> LiveView<T> {
    pub(crate) fn new(live: LiveQuery) -> Self {
        Self {
            live,
            items: Vec::new(),
            loaded: false,
            chronological: false,
        }
    }

    /// Deliveries arrive newest first; present them oldest first.
    pub(crate) fn chronological(mut self) -> Self {
        self.chronological = true;
        self
    }

    /// Waits for the next delivery and returns the refreshed view. `None` once
    /// the registration has ended.
    pub async fn next(&mut self) -> Option<&[T]> {
        loop {
            match self.live.next().await? {
                Ok(docs) => {
                    let mut items: Vec<T> = docs
                        .iter()
                        .filter_map(|doc| match T::from_document(doc) {
                            Ok(item) => Some(item),
                            Err(e) => {
                                warn!("Skipping document {}: {:#}", doc.id, e);
                                None
                            }
                        })
                        .collect();
                    if self.chronological {
                        items.reverse();
                    }
                    self.items = items;
                    self.loaded = true;
                    return Some(&self.items);
                }
                Err(e) => {
                    // Best effort: keep the last good view and wait for the next change.
                    error!("{}", ClientError::Subscription(e));
                }
            }
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// True until the first delivery.
    pub fn is_loading(&self) -> bool {
        !self.loaded
    }

    pub async fn unsubscribe(self) {
        self.live.unsubscribe().await;
    }
}
