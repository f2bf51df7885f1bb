//! Client-side state for the GamerZone forum.
//!
//! Four services sit on top of two injected backends (an identity provider
//! and a document store): [`SessionManager`], [`MessageStream`],
//! [`PresenceTracker`] and [`PreferenceStore`]. [`Forum`] wires them together.

pub mod editor;
pub mod error;
pub mod form;
pub mod forum;
pub mod identity;
pub mod messages;
pub mod onboarding;
pub mod preferences;
pub mod presence;
pub mod session;
pub mod view;

use anyhow::anyhow;

pub use editor::ProfileEditor;
pub use error::{ClientError, ClientResult, ValidationError};
pub use form::GameForm;
pub use forum::{Forum, Landing};
pub use identity::{FederatedCredential, IdentityProvider, LocalIdentityProvider};
pub use messages::{MESSAGE_WINDOW, MessageFeed, MessageStream};
pub use onboarding::{OnboardingWizard, Step};
pub use preferences::PreferenceStore;
pub use presence::{PresenceConfig, PresenceFeed, PresenceTracker};
pub use session::{SessionManager, SessionStatus};

/// Backend handles block; run them off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {}", e))?
}
