use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error};

use gamerzone_store::{Direction, DocumentStore, Fields, LiveQuery, Query, server_timestamp};
use gamerzone_types::{AccountType, ChatMessage, Identity, MESSAGES, USERS, UserProfile};

use crate::blocking;
use crate::view::LiveView;

/// Size of the live chat window.
pub const MESSAGE_WINDOW: usize = 50;

pub type MessageFeed = LiveView<ChatMessage>;

#[derive(Clone)]
pub struct MessageStream {
    store: Arc<dyn DocumentStore>,
}

impl MessageStream {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Live view of the latest [`MESSAGE_WINDOW`] messages, oldest first.
    pub fn subscribe(&self) -> MessageFeed {
        let query = Query::new()
            .order_by("createdAt", Direction::Desc)
            .limit(MESSAGE_WINDOW);
        LiveView::new(LiveQuery::watch(self.store.clone(), MESSAGES, query)).chronological()
    }

    /// Posts `text` as `identity`. Best effort: blank text or no identity is
    /// a no-op and failures are only logged. Returns the new message id.
    pub async fn send_message(&self, identity: Option<&Identity>, text: &str) -> Option<String> {
        let identity = identity?;
        if text.trim().is_empty() {
            return None;
        }

        let store = self.store.clone();
        let identity = identity.clone();
        let text = text.to_string();
        let result = blocking(move || {
            let profile = store
                .get(USERS, &identity.uid)?
                .map(|doc| doc.decode::<UserProfile>())
                .transpose()?;

            let (is_guest, game_roles) = match &profile {
                Some(profile) => (
                    profile.account_type == AccountType::Guest,
                    profile.role_labels(),
                ),
                None => (identity.is_anonymous, Vec::new()),
            };

            let mut fields = Fields::new();
            fields.insert("text".into(), json!(text));
            fields.insert("userId".into(), json!(identity.uid));
            fields.insert("username".into(), json!(identity.display_name_or_guest()));
            fields.insert("userPhotoURL".into(), json!(identity.photo_url));
            fields.insert("isGuest".into(), json!(is_guest));
            fields.insert("gameRoles".into(), json!(game_roles));
            fields.insert("createdAt".into(), server_timestamp());

            store.add(MESSAGES, fields)
        })
        .await;

        match result {
            Ok(id) => {
                debug!("Sent message {}", id);
                Some(id)
            }
            Err(e) => {
                error!("Error sending message: {:#}", e);
                None
            }
        }
    }
}
