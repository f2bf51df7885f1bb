use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use anyhow::{Result, anyhow};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::clock::ServerClock;
use crate::feed::{Change, ChangeFeed};
use crate::query::Query;
use crate::{Document, DocumentStore, Fields, resolve_server_timestamps};

type Collections = HashMap<String, BTreeMap<String, Fields>>;

/// Process-local store. Used by tests and as a throwaway backend.
pub struct MemoryStore {
    collections: RwLock<Collections>,
    clock: ServerClock,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            clock: ServerClock::new(),
            feed: ChangeFeed::new(),
        }
    }

    /// Number of live queries currently registered against this store.
    pub fn watcher_count(&self) -> usize {
        self.feed.subscriber_count()
    }

    fn write<F, T>(&self, collection: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut BTreeMap<String, Fields>, &ServerClock) -> Result<T>,
    {
        let out = {
            let mut collections = self
                .collections
                .write()
                .map_err(|e| anyhow!("store lock poisoned: {}", e))?;
            let docs = collections.entry(collection.to_string()).or_default();
            f(docs, &self.clock)?
        };
        self.feed.publish(collection);
        Ok(out)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let collections = self
            .collections
            .read()
            .map_err(|e| anyhow!("store lock poisoned: {}", e))?;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.get(id))
            .map(|data| Document {
                id: id.to_string(),
                data: data.clone(),
            }))
    }

    fn set(&self, collection: &str, id: &str, mut data: Fields) -> Result<()> {
        self.write(collection, |docs, clock| {
            resolve_server_timestamps(&mut data, clock.now());
            docs.insert(id.to_string(), data);
            Ok(())
        })
    }

    fn merge(&self, collection: &str, id: &str, mut fields: Fields) -> Result<()> {
        self.write(collection, |docs, clock| {
            let existing = docs
                .get_mut(id)
                .ok_or_else(|| anyhow!("document {}/{} not found", collection, id))?;
            resolve_server_timestamps(&mut fields, clock.now());
            existing.extend(fields);
            Ok(())
        })
    }

    fn add(&self, collection: &str, mut data: Fields) -> Result<String> {
        self.write(collection, |docs, clock| {
            let id = Uuid::new_v4().simple().to_string();
            resolve_server_timestamps(&mut data, clock.now());
            docs.insert(id.clone(), data);
            Ok(id)
        })
    }

    fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        let docs: Vec<Document> = {
            let collections = self
                .collections
                .read()
                .map_err(|e| anyhow!("store lock poisoned: {}", e))?;
            collections
                .get(collection)
                .map(|docs| {
                    docs.iter()
                        .map(|(id, data)| Document {
                            id: id.clone(),
                            data: data.clone(),
                        })
                        .collect()
                })
                .unwrap_or_default()
        };
        Ok(query.apply(docs))
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.feed.subscribe()
    }
}
