use std::path::Path;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::ServerClock;
use crate::feed::{Change, ChangeFeed};
use crate::migrations;
use crate::query::{Direction, Filter, Op, Query};
use crate::{Document, DocumentStore, Fields, resolve_server_timestamps};

/// Documents persisted as JSON text, one row per `(collection, id)`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    clock: ServerClock,
    feed: ChangeFeed,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self::with_connection(conn)?;
        info!("Document store opened at {}", path.display());
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        register_functions(&conn)?;
        migrations::run(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: ServerClock::new(),
            feed: ChangeFeed::new(),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }

    /// Runs a write under the connection lock, then notifies watchers.
    fn write<F, T>(&self, collection: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Connection, &ServerClock) -> Result<T>,
    {
        let out = self.with_conn(|conn| f(conn, &self.clock))?;
        self.feed.publish(collection);
        Ok(out)
    }
}

impl DocumentStore for SqliteStore {
    fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        self.with_conn(|conn| {
            let data = query_data(conn, collection, id)?;
            Ok(data.map(|data| Document {
                id: id.to_string(),
                data,
            }))
        })
    }

    fn set(&self, collection: &str, id: &str, mut data: Fields) -> Result<()> {
        self.write(collection, |conn, clock| {
            resolve_server_timestamps(&mut data, clock.now());
            upsert(conn, collection, id, data)
        })
    }

    fn merge(&self, collection: &str, id: &str, mut fields: Fields) -> Result<()> {
        self.write(collection, |conn, clock| {
            let mut existing = query_data(conn, collection, id)?
                .ok_or_else(|| anyhow!("document {}/{} not found", collection, id))?;
            resolve_server_timestamps(&mut fields, clock.now());
            existing.extend(fields);
            upsert(conn, collection, id, existing)
        })
    }

    fn add(&self, collection: &str, mut data: Fields) -> Result<String> {
        self.write(collection, |conn, clock| {
            let id = Uuid::new_v4().simple().to_string();
            resolve_server_timestamps(&mut data, clock.now());
            upsert(conn, collection, &id, data)?;
            Ok(id)
        })
    }

    fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        let plan = Plan::new(collection, query);
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&plan.sql)?;
            let rows = stmt
                .query_map(params_from_iter(plan.params.iter()), |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        let docs = rows
            .into_iter()
            .filter_map(|(id, raw)| match parse_fields(&raw) {
                Ok(data) => Some(Document { id, data }),
                Err(e) => {
                    warn!("Skipping corrupt document {}/{}: {:#}", collection, id, e);
                    None
                }
            })
            .collect();

        Ok(plan.rest.apply(docs))
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.feed.subscribe()
    }
}

fn query_data(conn: &Connection, collection: &str, id: &str) -> Result<Option<Fields>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
            [collection, id],
            |row| row.get(0),
        )
        .optional()?;

    raw.map(|raw| parse_fields(&raw)).transpose()
}

fn upsert(conn: &Connection, collection: &str, id: &str, data: Fields) -> Result<()> {
    let raw = serde_json::to_string(&Value::Object(data))?;
    conn.execute(
        "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)
         ON CONFLICT(collection, id)
         DO UPDATE SET data = excluded.data, updated_at = datetime('now')",
        (collection, id, &raw),
    )?;
    Ok(())
}

/// SQL for a [`Query`]. Whatever SQL cannot express exactly is left in
/// `rest` and applied to the fetched rows.
struct Plan {
    sql: String,
    params: Vec<SqlValue>,
    rest: Query,
}

impl Plan {
    fn new(collection: &str, query: &Query) -> Self {
        let mut sql = String::from(
            "SELECT id, data FROM documents WHERE collection = ? AND json_valid(data)",
        );
        let mut params = vec![SqlValue::Text(collection.to_string())];
        let mut rest = Query::new();

        for filter in &query.filters {
            match filter_sql(filter) {
                Some((clause, value)) => {
                    sql.push_str(" AND ");
                    sql.push_str(&clause);
                    params.extend(value);
                }
                None => rest.filters.push(filter.clone()),
            }
        }

        match &query.order_by {
            Some((field, direction)) => match json_path(field) {
                Some(path) => {
                    let dir = match direction {
                        Direction::Asc => "ASC",
                        Direction::Desc => "DESC",
                    };
                    sql.push_str(&format!(
                        " AND json_type(data, '{path}') IS NOT NULL \
                         ORDER BY sort_key(json_extract(data, '{path}')) {dir}, id {dir}"
                    ));
                }
                None => {
                    rest.order_by = Some((field.clone(), *direction));
                    sql.push_str(" ORDER BY id");
                }
            },
            None => sql.push_str(" ORDER BY id"),
        }

        match query.limit {
            Some(limit) if rest.filters.is_empty() && rest.order_by.is_none() => {
                sql.push_str(" LIMIT ?");
                params.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
            }
            limit => rest.limit = limit,
        }

        Self { sql, params, rest }
    }
}

/// `$.field` for plain identifiers; anything else is filtered in memory.
fn json_path(field: &str) -> Option<String> {
    let plain = !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    plain.then(|| format!("$.{field}"))
}

/// Only same-typed comparisons match, like [`Query::apply`].
fn filter_sql(filter: &Filter) -> Option<(String, Option<SqlValue>)> {
    let path = json_path(&filter.field)?;
    let op = match filter.op {
        Op::Eq => "=",
        Op::Gt => ">",
        Op::Ge => ">=",
        Op::Lt => "<",
        Op::Le => "<=",
    };
    let (types, value) = match &filter.value {
        Value::String(s) => ("'text'", SqlValue::Text(s.clone())),
        Value::Number(n) => match n.as_i64() {
            Some(i) => ("'integer', 'real'", SqlValue::Integer(i)),
            None => ("'integer', 'real'", SqlValue::Real(n.as_f64()?)),
        },
        Value::Bool(b) => ("'true', 'false'", SqlValue::Integer(i64::from(*b))),
        Value::Null if filter.op == Op::Eq => {
            return Some((format!("json_type(data, '{path}') = 'null'"), None));
        }
        _ => return None,
    };
    Some((
        format!(
            "json_type(data, '{path}') IN ({types}) \
             AND sort_key(json_extract(data, '{path}')) {op} sort_key(?)"
        ),
        Some(value),
    ))
}

/// `sort_key(x)`: RFC 3339 text becomes fixed-width UTC text so timestamps
/// order as instants; other values pass through unchanged.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "sort_key",
        1,
        FunctionFlags::SQLITE_UTF8
            | FunctionFlags::SQLITE_DETERMINISTIC
            | FunctionFlags::SQLITE_INNOCUOUS,
        |ctx| {
            let key = match ctx.get_raw(0) {
                ValueRef::Text(raw) => {
                    let text = String::from_utf8_lossy(raw);
                    match DateTime::parse_from_rfc3339(&text) {
                        Ok(ts) => SqlValue::Text(
                            ts.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::Nanos, true),
                        ),
                        Err(_) => SqlValue::Text(text.into_owned()),
                    }
                }
                ValueRef::Integer(i) => SqlValue::Integer(i),
                ValueRef::Real(f) => SqlValue::Real(f),
                ValueRef::Blob(b) => SqlValue::Blob(b.to_vec()),
                ValueRef::Null => SqlValue::Null,
            };
            Ok(key)
        },
    )?;
    Ok(())
}

fn parse_fields(raw: &str) -> Result<Fields> {
    match serde_json::from_str(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("document body is not an object: {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server_timestamp;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn set_then_get_round_trips_the_body() {
        let store = SqliteStore::open_in_memory().unwrap();
        let body = fields(json!({ "uid": "u1", "games": [{ "gameId": "mlbb" }] }));
        store.set("users", "u1", body.clone()).unwrap();

        let doc = store.get("users", "u1").unwrap().unwrap();
        assert_eq!(doc.data, body);
        assert!(store.get("users", "u2").unwrap().is_none());
    }

    #[test]
    fn set_replaces_the_whole_document() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .set("users", "u1", fields(json!({ "a": 1, "b": 2 })))
            .unwrap();
        store.set("users", "u1", fields(json!({ "a": 3 }))).unwrap();

        let doc = store.get("users", "u1").unwrap().unwrap();
        assert_eq!(doc.data, fields(json!({ "a": 3 })));
    }

    #[test]
    fn merge_requires_existing_document() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.merge("users", "u1", fields(json!({ "a": 1 }))).is_err());

        store.set("users", "u1", fields(json!({ "a": 1, "b": 2 }))).unwrap();
        store.merge("users", "u1", fields(json!({ "b": 5 }))).unwrap();
        let doc = store.get("users", "u1").unwrap().unwrap();
        assert_eq!(doc.data, fields(json!({ "a": 1, "b": 5 })));
    }

    #[test]
    fn query_is_scoped_to_collection() {
        let store = SqliteStore::open_in_memory().unwrap();
        for text in ["one", "two", "three"] {
            store
                .add("messages", fields(json!({ "text": text, "createdAt": server_timestamp() })))
                .unwrap();
        }
        store.set("users", "u1", fields(json!({ "createdAt": "x" }))).unwrap();

        let latest = store
            .query("messages", &Query::new().order_by("createdAt", Direction::Desc).limit(2))
            .unwrap();
        let texts: Vec<_> = latest.iter().map(|d| d.data["text"].clone()).collect();
        assert_eq!(texts, vec![json!("three"), json!("two")]);
    }

    #[test]
    fn ordering_compares_instants_across_offsets() {
        let store = SqliteStore::open_in_memory().unwrap();
        let stamps = [
            // 07:00Z, lexically the largest.
            ("a", "2026-10-16T09:00:00+02:00"),
            ("b", "2026-10-16T08:10:00Z"),
            ("c", "2026-10-16T08:00:00.5Z"),
        ];
        for (id, stamp) in stamps {
            store.set("users", id, fields(json!({ "lastActive": stamp }))).unwrap();
        }
        store.set("users", "d", fields(json!({ "username": "idle" }))).unwrap();

        let query = Query::new()
            .filter("lastActive", Op::Gt, "2026-10-16T07:30:00Z")
            .order_by("lastActive", Direction::Desc);
        let docs = store.query("users", &query).unwrap();
        let ids: Vec<_> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn filters_only_match_values_of_the_same_type() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("users", "a", fields(json!({ "n": 2 }))).unwrap();
        store.set("users", "b", fields(json!({ "n": "3" }))).unwrap();
        store.set("users", "c", fields(json!({ "n": 2.5, "guest": true }))).unwrap();

        let over_one = store.query("users", &Query::new().filter("n", Op::Gt, 1)).unwrap();
        let ids: Vec<_> = over_one.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        let guests = store.query("users", &Query::new().filter("guest", Op::Eq, true)).unwrap();
        assert_eq!(guests.len(), 1);
    }

    #[test]
    fn structured_filters_fall_back_to_memory() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.set("users", "a", fields(json!({ "games": [], "n": 1 }))).unwrap();
        store.set("users", "b", fields(json!({ "games": ["mlbb"], "n": 2 }))).unwrap();
        store.set("users", "c", fields(json!({ "games": [], "n": 3 }))).unwrap();

        let query = Query::new()
            .filter("games", Op::Eq, json!([]))
            .order_by("n", Direction::Desc)
            .limit(1);
        let docs = store.query("users", &query).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id, "c");
    }

    #[test]
    fn corrupt_rows_do_not_break_queries() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .add("messages", fields(json!({ "text": "ok", "createdAt": server_timestamp() })))
            .unwrap();
        store
            .with_conn(|conn| {
                conn.execute(
                    "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)",
                    ("messages", "bad", "[1, 2]"),
                )?;
                Ok(())
            })
            .unwrap();

        let docs = store
            .query("messages", &Query::new().order_by("createdAt", Direction::Desc).limit(50))
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].data["text"], json!("ok"));
    }
}
