use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::feed::Change;
use crate::query::Query;
use crate::{Document, DocumentStore};

/// Standing registration over a query. Every change to the watched
/// collection re-runs the query and delivers the whole result set, never a
/// delta. Dropping the handle cancels the registration.
pub struct LiveQuery {
    rx: mpsc::UnboundedReceiver<Result<Vec<Document>>>,
    task: Option<JoinHandle<()>>,
}

impl LiveQuery {
    pub fn watch(store: Arc<dyn DocumentStore>, collection: &str, query: Query) -> Self {
        Self::spawn(store, collection, None, move || query.clone())
    }

    /// Like [`LiveQuery::watch`], but also re-runs every `every` and rebuilds
    /// the query each time, so relative-time filters keep sliding without writes.
    pub fn watch_rolling<F>(
        store: Arc<dyn DocumentStore>,
        collection: &str,
        every: Duration,
        make_query: F,
    ) -> Self
    where
        F: Fn() -> Query + Send + 'static,
    {
        Self::spawn(store, collection, Some(every), make_query)
    }

    fn spawn<F>(
        store: Arc<dyn DocumentStore>,
        collection: &str,
        every: Option<Duration>,
        make_query: F,
    ) -> Self
    where
        F: Fn() -> Query + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let collection = collection.to_string();

        // Subscribe before the first read so no write slips in between.
        let mut changes = store.changes();

        // A zero period would panic the timer; such a query only follows writes.
        let every = every.filter(|period| {
            if period.is_zero() {
                warn!("Live query on {} has a zero refresh period, ignoring it", collection);
            }
            !period.is_zero()
        });

        let task = tokio::spawn(async move {
            let mut ticker = every.map(|period| {
                let start = tokio::time::Instant::now() + period;
                let mut ticker = tokio::time::interval_at(start, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker
            });

            loop {
                let snapshot = run_query(store.clone(), collection.clone(), make_query()).await;
                if let Ok(docs) = &snapshot {
                    debug!(collection = %collection, count = docs.len(), "live query delivery");
                }
                if tx.send(snapshot).is_err() {
                    break;
                }
                if !next_trigger(&mut changes, &collection, &mut ticker).await {
                    break;
                }
            }

            debug!(collection = %collection, "live query stopped");
        });

        Self {
            rx,
            task: Some(task),
        }
    }

    /// Next full result set. `None` once the registration has ended.
    /// Deliveries that queued up while nobody was reading are collapsed into
    /// the newest one.
    pub async fn next(&mut self) -> Option<Result<Vec<Document>>> {
        let mut latest = self.rx.recv().await?;
        while let Ok(newer) = self.rx.try_recv() {
            latest = newer;
        }
        Some(latest)
    }

    /// Cancels the registration and waits until it has released its change
    /// feed subscription.
    pub async fn unsubscribe(mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            let _ = task.await;
        }
    }
}

impl Drop for LiveQuery {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_query(
    store: Arc<dyn DocumentStore>,
    collection: String,
    query: Query,
) -> Result<Vec<Document>> {
    tokio::task::spawn_blocking(move || store.query(&collection, &query))
        .await
        .map_err(|e| anyhow!("live query task failed: {}", e))?
}

/// Waits for the next reason to re-run. Returns false when the feed is gone.
async fn next_trigger(
    changes: &mut broadcast::Receiver<Change>,
    collection: &str,
    ticker: &mut Option<Interval>,
) -> bool {
    loop {
        tokio::select! {
            change = changes.recv() => match change {
                Ok(change) if change.collection == collection => return true,
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    warn!("Live query on {} lagged by {} changes, re-running", collection, n);
                    return true;
                }
                Err(RecvError::Closed) => return false,
            },
            _ = tick(ticker) => return true,
        }
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
