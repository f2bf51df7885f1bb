//! Structured form state for picking games, roles and ranks.

use std::collections::HashMap;

use gamerzone_types::{GameId, GamePreference};

use crate::error::ValidationError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Choice {
    role: Option<String>,
    rank: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GameForm {
    /// Selection order is kept; it becomes the order of the saved games.
    selected: Vec<GameId>,
    choices: HashMap<GameId, Choice>,
}

impl GameForm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-filled from stored preferences. Entries that no longer match the
    /// catalog are dropped back to "not chosen".
    pub fn from_preferences(games: &[GamePreference]) -> Self {
        let mut form = Self::new();
        for pref in games {
            if form.is_selected(pref.game_id) {
                continue;
            }
            form.selected.push(pref.game_id);
            let entry = pref.game_id.entry();
            form.choices.insert(
                pref.game_id,
                Choice {
                    role: entry.has_role(&pref.main_role).then(|| pref.main_role.clone()),
                    rank: entry.has_rank(&pref.rank).then(|| pref.rank.clone()),
                },
            );
        }
        form
    }

    pub fn toggle(&mut self, game: GameId) {
        if self.is_selected(game) {
            self.selected.retain(|g| *g != game);
            self.choices.remove(&game);
        } else {
            self.selected.push(game);
            self.choices.entry(game).or_default();
        }
    }

    pub fn is_selected(&self, game: GameId) -> bool {
        self.selected.contains(&game)
    }

    pub fn selected(&self) -> &[GameId] {
        &self.selected
    }

    pub fn has_selection(&self) -> bool {
        !self.selected.is_empty()
    }

    pub fn set_role(&mut self, game: GameId, role: &str) -> Result<(), ValidationError> {
        let entry = game.entry();
        if !entry.has_role(role) {
            return Err(ValidationError::NotInCatalog {
                game: entry.name,
                field: "role",
                value: role.to_string(),
            });
        }
        self.choice_mut(game)?.role = Some(role.to_string());
        Ok(())
    }

    pub fn set_rank(&mut self, game: GameId, rank: &str) -> Result<(), ValidationError> {
        let entry = game.entry();
        if !entry.has_rank(rank) {
            return Err(ValidationError::NotInCatalog {
                game: entry.name,
                field: "rank",
                value: rank.to_string(),
            });
        }
        self.choice_mut(game)?.rank = Some(rank.to_string());
        Ok(())
    }

    pub fn role(&self, game: GameId) -> Option<&str> {
        self.choices.get(&game)?.role.as_deref()
    }

    pub fn rank(&self, game: GameId) -> Option<&str> {
        self.choices.get(&game)?.rank.as_deref()
    }

    /// Every selected game must have both a role and a rank. The error names
    /// the first game in selection order that does not.
    pub fn preferences(&self) -> Result<Vec<GamePreference>, ValidationError> {
        if self.selected.is_empty() {
            return Err(ValidationError::NoGames);
        }

        self.selected
            .iter()
            .map(|&game| {
                let entry = game.entry();
                let choice = self.choices.get(&game);
                match choice.map(|c| (c.role.as_ref(), c.rank.as_ref())) {
                    Some((Some(role), Some(rank))) => Ok(GamePreference {
                        game_id: game,
                        name: entry.name.to_string(),
                        main_role: role.clone(),
                        rank: rank.clone(),
                    }),
                    _ => Err(ValidationError::MissingChoice { game: entry.name }),
                }
            })
            .collect()
    }

    fn choice_mut(&mut self, game: GameId) -> Result<&mut Choice, ValidationError> {
        if !self.is_selected(game) {
            return Err(ValidationError::NotSelected {
                game: game.entry().name,
            });
        }
        Ok(self.choices.entry(game).or_default())
    }
}

/// Guest usernames: 3-20 characters of ASCII letters, digits or underscore.
pub fn validate_username(username: &str) -> Result<&str, ValidationError> {
    let username = username.trim();
    let len = username.chars().count();
    let allowed = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_');

    if (3..=20).contains(&len) && allowed {
        Ok(username)
    } else {
        Err(ValidationError::InvalidUsername)
    }
}
