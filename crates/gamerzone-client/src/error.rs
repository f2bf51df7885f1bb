use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("sign-in failed: {0:#}")]
    Auth(anyhow::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("store request failed: {0:#}")]
    Persistence(anyhow::Error),

    #[error("live view delivery failed: {0:#}")]
    Subscription(anyhow::Error),
}

/// Blocks progression; shown inline next to the form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please select role and rank for {game}")]
    MissingChoice { game: &'static str },

    #[error("{value} is not a valid {field} for {game}")]
    NotInCatalog {
        game: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("{game} is not selected")]
    NotSelected { game: &'static str },

    #[error("Select at least one game")]
    NoGames,

    #[error("Username must be 3-20 characters: letters, numbers and underscore only")]
    InvalidUsername,

    #[error("Finish the previous step first")]
    WrongStep,
}
