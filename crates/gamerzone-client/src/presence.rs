use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use gamerzone_store::{
    Direction, DocumentStore, Fields, LiveQuery, Op, Query, format_timestamp, server_timestamp,
};
use gamerzone_types::{USERS, UserProfile};

use crate::blocking;
use crate::view::LiveView;

pub type PresenceFeed = LiveView<UserProfile>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceConfig {
    /// Users active within this window count as online.
    pub window: Duration,
    /// How often the window slides forward when no writes arrive.
    pub refresh: Duration,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(5 * 60),
            refresh: Duration::from_secs(30),
        }
    }
}

#[derive(Clone)]
pub struct PresenceTracker {
    store: Arc<dyn DocumentStore>,
    config: PresenceConfig,
}

impl PresenceTracker {
    /// A zero `refresh` falls back to the default period.
    pub fn new(store: Arc<dyn DocumentStore>, mut config: PresenceConfig) -> Self {
        if config.refresh.is_zero() {
            warn!("Presence refresh period is zero, using the default");
            config.refresh = PresenceConfig::default().refresh;
        }
        Self { store, config }
    }

    pub fn config(&self) -> PresenceConfig {
        self.config
    }

    /// Live view of recently active users, most recent first. The threshold
    /// is recomputed on every re-run.
    pub fn subscribe(&self) -> PresenceFeed {
        let window =
            chrono::Duration::from_std(self.config.window).unwrap_or(chrono::Duration::MAX);
        let make_query = move || {
            let threshold = Utc::now()
                .checked_sub_signed(window)
                .unwrap_or(DateTime::<Utc>::MIN_UTC);
            Query::new()
                .filter("lastActive", Op::Gt, format_timestamp(threshold))
                .order_by("lastActive", Direction::Desc)
        };
        let store = self.store.clone();
        LiveView::new(LiveQuery::watch_rolling(store, USERS, self.config.refresh, make_query))
    }

    /// Activity heartbeat. Best effort; returns whether the write landed.
    pub async fn touch(&self, uid: &str) -> bool {
        let mut fields = Fields::new();
        fields.insert("lastActive".into(), server_timestamp());

        let store = self.store.clone();
        let uid = uid.to_string();
        match blocking(move || store.merge(USERS, &uid, fields)).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Presence update failed: {:#}", e);
                false
            }
        }
    }
}
