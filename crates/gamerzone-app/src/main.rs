mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use gamerzone_client::{Forum, Landing, LocalIdentityProvider};
use gamerzone_store::SqliteStore;
use gamerzone_types::forum::threads_for;
use gamerzone_types::{ChatMessage, GameId, UserProfile};

use config::{Config, GameChoice};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gamerzone=info".into()),
        )
        .init();

    let config = Config::load()?;

    let store = Arc::new(SqliteStore::open(&config.db_path)?);
    let provider = Arc::new(LocalIdentityProvider::persistent(&config.session_path));
    let forum = Forum::with_presence_config(provider, store, config.presence);

    let mut profile = match forum.landing().await? {
        Landing::Ready(profile) => Some(profile),
        Landing::Onboarding => onboard(&forum, &config.games).await?,
        Landing::SignIn => {
            forum.continue_as_guest(&config.username).await?;
            onboard(&forum, &config.games).await?
        }
    };

    let identity = forum
        .session
        .current_identity()
        .context("no session after sign-in")?;
    info!("Signed in as {} ({})", identity.display_name_or_guest(), identity.uid);
    forum.presence.touch(&identity.uid).await;

    let mut messages = forum.messages.subscribe();
    let mut online = forum.presence.subscribe();
    let mut heartbeat = tokio::time::interval(forum.presence.config().refresh);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut presence_open = true;

    println!("Type a message, or /online, /threads [game], /profile, /quit");

    loop {
        tokio::select! {
            window = messages.next() => match window {
                Some(window) => print_window(window),
                None => break,
            },
            users = online.next(), if presence_open => match users {
                Some(users) => info!("{} online", users.len()),
                None => {
                    warn!("Presence feed ended");
                    presence_open = false;
                }
            },
            _ = heartbeat.tick() => {
                forum.presence.touch(&identity.uid).await;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "/quit" => break,
                    "/online" => print_online(online.items()),
                    "/profile" => {
                        match forum.preferences.load_profile(&identity.uid).await {
                            Ok(Some(stored)) => profile = Some(stored),
                            Ok(None) => {}
                            Err(e) => warn!("Could not refresh profile: {}", e),
                        }
                        print_profile(profile.as_ref());
                    }
                    cmd if cmd.starts_with("/threads") => {
                        let game = cmd.trim_start_matches("/threads").trim();
                        let filter = if game.is_empty() {
                            None
                        } else {
                            match game.parse::<GameId>() {
                                Ok(id) => Some(id),
                                Err(e) => {
                                    println!("{e}");
                                    continue;
                                }
                            }
                        };
                        for thread in threads_for(filter) {
                            let hot = if thread.hot { " [hot]" } else { "" };
                            println!(
                                "#{} {}{} by {} ({} replies, {} views)",
                                thread.id,
                                thread.title,
                                hot,
                                thread.author,
                                thread.replies,
                                thread.views
                            );
                        }
                    }
                    text => {
                        forum.messages.send_message(Some(&identity), text).await;
                    }
                }
            }
        }
    }

    messages.unsubscribe().await;
    online.unsubscribe().await;
    info!("Bye");
    Ok(())
}

/// Answers the onboarding wizard from configuration.
async fn onboard(forum: &Forum, choices: &[GameChoice]) -> Result<Option<UserProfile>> {
    if choices.is_empty() {
        warn!("GAMERZONE_GAMES not set, skipping onboarding");
        return Ok(None);
    }

    let mut wizard = forum.onboarding();
    wizard.get_started();
    for choice in choices {
        wizard.toggle_game(choice.game);
    }
    wizard.next()?;
    for choice in choices {
        wizard.form_mut().set_role(choice.game, &choice.role)?;
        wizard.form_mut().set_rank(choice.game, &choice.rank)?;
    }

    let profile = wizard.submit(&forum.session, &forum.preferences).await?;
    Ok(Some(profile))
}

fn print_window(window: &[ChatMessage]) {
    println!("----- chat ({} messages) -----", window.len());
    for message in window {
        let roles = if message.game_roles.is_empty() {
            String::new()
        } else {
            format!(" [{}]", message.game_roles.join(", "))
        };
        let guest = if message.is_guest { " (guest)" } else { "" };
        println!(
            "{} {}{}{}: {}",
            message.created_at.format("%H:%M"),
            message.username,
            guest,
            roles,
            message.text
        );
    }
}

fn print_online(users: &[UserProfile]) {
    println!("Online ({})", users.len());
    for user in users {
        let games: Vec<_> = user.games.iter().map(|g| g.name.as_str()).collect();
        println!("  {} {}", user.username, games.join(", "));
    }
}

fn print_profile(profile: Option<&UserProfile>) {
    let Some(profile) = profile else {
        println!("No profile yet");
        return;
    };
    println!("{} ({:?})", profile.username, profile.account_type);
    for game in &profile.games {
        println!("  {}: {} / {}", game.name, game.main_role, game.rank);
    }
}
