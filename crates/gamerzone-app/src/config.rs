use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tracing::info;

use gamerzone_client::PresenceConfig;
use gamerzone_types::GameId;

/// Headless onboarding answer: one game with its role and rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameChoice {
    pub game: GameId,
    pub role: String,
    pub rank: String,
}

pub struct Config {
    pub db_path: PathBuf,
    pub session_path: PathBuf,
    pub username: String,
    pub games: Vec<GameChoice>,
    pub presence: PresenceConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            db_path: load_or("GAMERZONE_DB_PATH", "gamerzone.db")?,
            session_path: load_or("GAMERZONE_SESSION_PATH", "gamerzone-session.json")?,
            username: load_or("GAMERZONE_USERNAME", "player_one")?,
            games: match env::var("GAMERZONE_GAMES") {
                Ok(raw) => parse_games(&raw)?,
                Err(_) => Vec::new(),
            },
            presence: presence_config(
                load_or("GAMERZONE_PRESENCE_WINDOW_SECS", "300")?,
                load_or("GAMERZONE_PRESENCE_REFRESH_SECS", "30")?,
            )?,
        })
    }
}

fn presence_config(window_secs: u64, refresh_secs: u64) -> Result<PresenceConfig> {
    if refresh_secs == 0 {
        bail!("GAMERZONE_PRESENCE_REFRESH_SECS must be > 0");
    }
    Ok(PresenceConfig {
        window: Duration::from_secs(window_secs),
        refresh: Duration::from_secs(refresh_secs),
    })
}

fn load_or<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow!("invalid {key} value {raw:?}: {e}"))
}

/// `valorant=Duelist/Gold,mlbb=Tank/Epic`
pub fn parse_games(raw: &str) -> Result<Vec<GameChoice>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (game, choice) = entry
                .split_once('=')
                .with_context(|| format!("expected game=Role/Rank, got {entry:?}"))?;
            let (role, rank) = choice
                .split_once('/')
                .with_context(|| format!("expected Role/Rank for {game}, got {choice:?}"))?;
            let game: GameId = game.parse().map_err(|e| anyhow!("{e}"))?;
            if role.trim().is_empty() || rank.trim().is_empty() {
                bail!("empty role or rank for {game}");
            }
            Ok(GameChoice {
                game,
                role: role.trim().to_string(),
                rank: rank.trim().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_game_choices() {
        let games = parse_games("valorant=Duelist/Gold, genshin=Main DPS/AR 56+").unwrap();
        assert_eq!(
            games,
            vec![
                GameChoice {
                    game: GameId::Valorant,
                    role: "Duelist".into(),
                    rank: "Gold".into(),
                },
                GameChoice {
                    game: GameId::Genshin,
                    role: "Main DPS".into(),
                    rank: "AR 56+".into(),
                },
            ]
        );
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(parse_games("valorant").is_err());
        assert!(parse_games("valorant=Duelist").is_err());
        assert!(parse_games("dota=Carry/Herald").is_err());
        assert!(parse_games("").unwrap().is_empty());
    }

    #[test]
    fn zero_presence_refresh_is_rejected() {
        let err = presence_config(300, 0).unwrap_err();
        assert_eq!(err.to_string(), "GAMERZONE_PRESENCE_REFRESH_SECS must be > 0");

        let presence = presence_config(300, 30).unwrap();
        assert_eq!(presence.refresh, Duration::from_secs(30));
        assert_eq!(presence.window, Duration::from_secs(300));
    }
}
