use std::sync::Arc;

use anyhow::anyhow;
use chrono::Utc;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{error, info};

use gamerzone_store::{DocumentStore, Fields, server_timestamp};
use gamerzone_types::{AccountType, GamePreference, Identity, USERS, UserProfile};

use crate::blocking;
use crate::error::{ClientError, ClientResult};
use crate::form::GameForm;

/// Reads and writes the per-user profile document.
#[derive(Clone)]
pub struct PreferenceStore {
    store: Arc<dyn DocumentStore>,
}

impl PreferenceStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn load_profile(&self, uid: &str) -> ClientResult<Option<UserProfile>> {
        let store = self.store.clone();
        let uid = uid.to_string();
        blocking(move || {
            store
                .get(USERS, &uid)?
                .map(|doc| doc.decode::<UserProfile>())
                .transpose()
        })
        .await
        .map_err(|e| {
            error!("Error fetching user preferences: {:#}", e);
            ClientError::Persistence(e)
        })
    }

    /// Creates or replaces the whole profile. Nothing is written unless the
    /// form validates.
    pub async fn save_profile(
        &self,
        identity: &Identity,
        form: &GameForm,
    ) -> ClientResult<UserProfile> {
        let games = form.preferences()?;
        let now = Utc::now();
        let profile = UserProfile {
            uid: identity.uid.clone(),
            username: identity.display_name_or_guest().to_string(),
            account_type: AccountType::of(identity),
            games,
            created_at: Some(now),
            last_updated: Some(now),
            last_active: Some(now),
        };

        let store = self.store.clone();
        let written = profile.clone();
        blocking(move || store.set(USERS, &written.uid, to_fields(&written)?))
            .await
            .map_err(|e| {
                error!("Error saving preferences: {:#}", e);
                ClientError::Persistence(e)
            })?;

        info!("Saved {} game preferences for {}", profile.games.len(), profile.uid);
        Ok(profile)
    }

    /// Replaces only `games` and `lastUpdated`; every other field is kept.
    pub async fn update_profile(
        &self,
        uid: &str,
        form: &GameForm,
    ) -> ClientResult<Vec<GamePreference>> {
        let games = form.preferences()?;
        let encoded = serde_json::to_value(&games).map_err(|e| ClientError::Persistence(e.into()))?;

        let mut fields = Fields::new();
        fields.insert("games".into(), encoded);
        fields.insert("lastUpdated".into(), json!(Utc::now()));

        let store = self.store.clone();
        let uid = uid.to_string();
        blocking(move || store.merge(USERS, &uid, fields))
            .await
            .map_err(|e| {
                error!("Error updating preferences: {:#}", e);
                ClientError::Persistence(e)
            })?;

        Ok(games)
    }

    /// Initial document for a guest who has not picked any games yet.
    pub async fn register_guest(&self, identity: &Identity, username: &str) -> ClientResult<()> {
        let mut fields = Fields::new();
        fields.insert("uid".into(), json!(identity.uid));
        fields.insert("username".into(), json!(username));
        fields.insert("type".into(), json!(AccountType::Guest));
        fields.insert("games".into(), json!([]));
        fields.insert("createdAt".into(), server_timestamp());
        fields.insert("lastActive".into(), server_timestamp());

        let store = self.store.clone();
        let uid = identity.uid.clone();
        blocking(move || store.set(USERS, &uid, fields))
            .await
            .map_err(ClientError::Persistence)
    }
}

pub(crate) fn to_fields<T: Serialize>(value: &T) -> anyhow::Result<Fields> {
    match serde_json::to_value(value)? {
        Value::Object(fields) => Ok(fields),
        other => Err(anyhow!("expected a JSON object, got {}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gamerzone_store::MemoryStore;
    use gamerzone_types::GameId;

    fn guest(uid: &str) -> Identity {
        Identity {
            uid: uid.into(),
            display_name: Some("kai".into()),
            photo_url: None,
            is_anonymous: true,
        }
    }

    fn valorant_duelist() -> GameForm {
        let mut form = GameForm::new();
        form.toggle(GameId::Valorant);
        form.set_role(GameId::Valorant, "Duelist").unwrap();
        form.set_rank(GameId::Valorant, "Gold").unwrap();
        form
    }

    #[tokio::test]
    async fn save_then_load_returns_same_games() {
        let prefs = PreferenceStore::new(Arc::new(MemoryStore::new()));
        let saved = prefs.save_profile(&guest("u1"), &valorant_duelist()).await.unwrap();

        let loaded = prefs.load_profile("u1").await.unwrap().unwrap();
        assert_eq!(loaded.games, saved.games);
        assert_eq!(loaded.account_type, AccountType::Guest);
        assert_eq!(loaded.username, "kai");
    }

    #[tokio::test]
    async fn invalid_form_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let prefs = PreferenceStore::new(store.clone());

        let mut form = GameForm::new();
        form.toggle(GameId::Genshin);
        form.set_role(GameId::Genshin, "Healer").unwrap();

        let err = prefs.save_profile(&guest("u1"), &form).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(err.to_string(), "Please select role and rank for Genshin Impact");
        assert!(store.get(USERS, "u1").unwrap().is_none());
    }

    #[tokio::test]
    async fn update_keeps_unrelated_fields() {
        let prefs = PreferenceStore::new(Arc::new(MemoryStore::new()));
        let identity = guest("u1");
        prefs.register_guest(&identity, "kai").await.unwrap();
        let before = prefs.load_profile("u1").await.unwrap().unwrap();

        prefs.update_profile("u1", &valorant_duelist()).await.unwrap();

        let after = prefs.load_profile("u1").await.unwrap().unwrap();
        assert_eq!(after.username, before.username);
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.games.len(), 1);
        assert!(after.last_updated.is_some());
    }

    #[tokio::test]
    async fn update_of_missing_profile_is_a_persistence_error() {
        let prefs = PreferenceStore::new(Arc::new(MemoryStore::new()));
        let err = prefs.update_profile("ghost", &valorant_duelist()).await.unwrap_err();
        assert!(matches!(err, ClientError::Persistence(_)));
    }

    #[tokio::test]
    async fn unknown_uid_loads_as_none() {
        let prefs = PreferenceStore::new(Arc::new(MemoryStore::new()));
        assert!(prefs.load_profile("nobody").await.unwrap().is_none());
    }
}
