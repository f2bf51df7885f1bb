//! The static game catalog.
//!
//! Both the onboarding wizard and the profile editor read from this single
//! table, so the valid role and rank sets can never diverge between them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::forum::Category;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameId {
    Valorant,
    Mlbb,
    Genshin,
}

#[derive(Debug)]
pub struct GameEntry {
    pub id: GameId,
    pub name: &'static str,
    pub icon: &'static str,
    pub category: Category,
    pub roles: &'static [&'static str],
    pub ranks: &'static [&'static str],
}

pub static CATALOG: [GameEntry; 3] = [
    GameEntry {
        id: GameId::Valorant,
        name: "Valorant",
        icon: "🎯",
        category: Category::Fps,
        roles: &["Duelist", "Controller", "Sentinel", "Initiator"],
        ranks: &["Iron", "Bronze", "Silver", "Gold", "Platinum"],
    },
    GameEntry {
        id: GameId::Mlbb,
        name: "Mobile Legends",
        icon: "⚔️",
        category: Category::Moba,
        roles: &["Marksman", "Tank", "Fighter", "Assassin", "Mage", "Support"],
        ranks: &["Warrior", "Elite", "Master", "Grandmaster", "Epic"],
    },
    GameEntry {
        id: GameId::Genshin,
        name: "Genshin Impact",
        icon: "🎮",
        category: Category::Rpg,
        roles: &["Main DPS", "Sub DPS", "Support", "Healer"],
        ranks: &["AR 1-20", "AR 21-40", "AR 41-55", "AR 56+"],
    },
];

impl GameId {
    pub const ALL: [GameId; 3] = [GameId::Valorant, GameId::Mlbb, GameId::Genshin];

    pub fn entry(self) -> &'static GameEntry {
        match self {
            GameId::Valorant => &CATALOG[0],
            GameId::Mlbb => &CATALOG[1],
            GameId::Genshin => &CATALOG[2],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GameId::Valorant => "valorant",
            GameId::Mlbb => "mlbb",
            GameId::Genshin => "genshin",
        }
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GameId::ALL
            .into_iter()
            .find(|id| id.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown game '{s}'"))
    }
}

impl GameEntry {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_rank(&self, rank: &str) -> bool {
        self.ranks.contains(&rank)
    }
}
