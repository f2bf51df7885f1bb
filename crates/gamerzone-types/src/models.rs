use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::GameId;

/// Session principal issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub uid: String,
    pub display_name: Option<String>,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
    pub is_anonymous: bool,
}

impl Identity {
    pub fn display_name_or_guest(&self) -> &str {
        self.display_name.as_deref().unwrap_or("Guest User")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Guest,
    Registered,
}

impl AccountType {
    pub fn of(identity: &Identity) -> Self {
        if identity.is_anonymous {
            AccountType::Guest
        } else {
            AccountType::Registered
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GamePreference {
    pub game_id: GameId,
    pub name: String,
    pub main_role: String,
    pub rank: String,
}

impl GamePreference {
    /// Badge shown next to chat messages, e.g. "Valorant Duelist".
    pub fn role_label(&self) -> String {
        format!("{} {}", self.name, self.main_role)
    }
}

/// One document per uid in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub username: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    #[serde(default)]
    pub games: Vec<GamePreference>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn has_games(&self) -> bool {
        !self.games.is_empty()
    }

    pub fn role_labels(&self) -> Vec<String> {
        self.games.iter().map(GamePreference::role_label).collect()
    }
}

/// Chat messages are immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, skip_serializing)]
    pub id: String,
    pub text: String,
    pub user_id: String,
    pub username: String,
    #[serde(rename = "userPhotoURL")]
    pub user_photo_url: Option<String>,
    pub is_guest: bool,
    #[serde(default)]
    pub game_roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_reads_stored_field_names() {
        let profile: UserProfile = serde_json::from_value(json!({
            "uid": "u1",
            "username": "kai",
            "type": "guest",
            "games": [
                { "gameId": "valorant", "name": "Valorant", "mainRole": "Duelist", "rank": "Gold" }
            ],
            "createdAt": "2026-10-16T08:00:00.000000Z",
            "lastActive": "2026-10-16T08:00:00.000000Z"
        }))
        .unwrap();

        assert_eq!(profile.account_type, AccountType::Guest);
        assert_eq!(profile.role_labels(), vec!["Valorant Duelist".to_string()]);
        assert!(profile.last_updated.is_none());
    }

    #[test]
    fn guest_profile_without_games_is_valid() {
        let profile: UserProfile = serde_json::from_value(json!({
            "uid": "u2",
            "username": "nova",
            "type": "guest"
        }))
        .unwrap();
        assert!(!profile.has_games());
    }

    #[test]
    fn anonymous_identities_are_guests() {
        let identity = Identity {
            uid: "u3".into(),
            display_name: None,
            photo_url: None,
            is_anonymous: true,
        };
        assert_eq!(AccountType::of(&identity), AccountType::Guest);
        assert_eq!(identity.display_name_or_guest(), "Guest User");
    }
}
