use gamerzone_types::{GameId, GamePreference, UserProfile};

use crate::error::{ClientResult, ValidationError};
use crate::form::GameForm;
use crate::preferences::PreferenceStore;

/// Edits the games of an existing profile. Saving merges `games` and
/// `lastUpdated` only.
#[derive(Debug, Clone)]
pub struct ProfileEditor {
    uid: String,
    form: GameForm,
}

impl ProfileEditor {
    pub fn new(profile: &UserProfile) -> Self {
        Self {
            uid: profile.uid.clone(),
            form: GameForm::from_preferences(&profile.games),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn form(&self) -> &GameForm {
        &self.form
    }

    pub fn toggle_game(&mut self, game: GameId) {
        self.form.toggle(game);
    }

    pub fn set_role(&mut self, game: GameId, role: &str) -> Result<(), ValidationError> {
        self.form.set_role(game, role)
    }

    pub fn set_rank(&mut self, game: GameId, rank: &str) -> Result<(), ValidationError> {
        self.form.set_rank(game, rank)
    }

    /// Disabled with zero games selected.
    pub fn can_save(&self) -> bool {
        self.form.has_selection()
    }

    pub async fn save(&self, preferences: &PreferenceStore) -> ClientResult<Vec<GamePreference>> {
        preferences.update_profile(&self.uid, &self.form).await
    }
}
