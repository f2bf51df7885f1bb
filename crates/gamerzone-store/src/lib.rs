//! Document store seam.
//!
//! A schemaless collection-of-documents store with ordered/limited queries,
//! a per-write change feed and live queries layered on top of it. Backends
//! are blocking handles; async callers move work onto the blocking pool.

pub mod clock;
pub mod feed;
pub mod live;
pub mod memory;
pub mod migrations;
pub mod query;
pub mod sqlite;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::broadcast;

pub use feed::{Change, ChangeFeed};
pub use live::LiveQuery;
pub use memory::MemoryStore;
pub use query::{Direction, Filter, Op, Query};
pub use sqlite::SqliteStore;

/// Top-level fields of a document.
pub type Fields = serde_json::Map<String, Value>;

const SERVER_TIMESTAMP: &str = "$serverTimestamp";

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Fields,
}

impl Document {
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.data.clone()))
            .with_context(|| format!("malformed document {}", self.id))
    }
}

pub trait DocumentStore: Send + Sync {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Create or replace the whole document.
    fn set(&self, collection: &str, id: &str, data: Fields) -> Result<()>;

    /// Overwrite only the given top-level fields. Fails if the document is missing.
    fn merge(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Insert under a store-assigned id and return it.
    fn add(&self, collection: &str, data: Fields) -> Result<String>;

    fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>>;

    fn changes(&self) -> broadcast::Receiver<Change>;
}

/// Sentinel replaced by the store clock when the write is applied.
pub fn server_timestamp() -> Value {
    let mut marker = Fields::new();
    marker.insert(SERVER_TIMESTAMP.to_string(), Value::Bool(true));
    Value::Object(marker)
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn resolve_server_timestamps(fields: &mut Fields, now: DateTime<Utc>) {
    let stamp = Value::String(format_timestamp(now));
    for value in fields.values_mut() {
        if is_server_timestamp(value) {
            *value = stamp.clone();
        }
    }
}

fn is_server_timestamp(value: &Value) -> bool {
    match value {
        Value::Object(map) => {
            map.len() == 1 && map.get(SERVER_TIMESTAMP) == Some(&Value::Bool(true))
        }
        _ => false,
    }
}
