pub mod catalog;
pub mod forum;
pub mod models;

pub use catalog::{GameEntry, GameId};
pub use models::{AccountType, ChatMessage, GamePreference, Identity, UserProfile};

/// Collection holding one profile document per uid.
pub const USERS: &str = "users";

/// Collection holding chat messages.
pub const MESSAGES: &str = "messages";
