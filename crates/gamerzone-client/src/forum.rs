use std::sync::Arc;

use tracing::info;

use gamerzone_store::DocumentStore;
use gamerzone_types::{Identity, UserProfile};

use crate::editor::ProfileEditor;
use crate::error::ClientResult;
use crate::form::validate_username;
use crate::identity::IdentityProvider;
use crate::messages::MessageStream;
use crate::onboarding::OnboardingWizard;
use crate::preferences::PreferenceStore;
use crate::presence::{PresenceConfig, PresenceTracker};
use crate::session::SessionManager;

/// Which screen the forum opens on.
#[derive(Debug, Clone, PartialEq)]
pub enum Landing {
    SignIn,
    Onboarding,
    Ready(UserProfile),
}

/// Composition root: every service gets its backend handles here.
pub struct Forum {
    pub session: SessionManager,
    pub messages: MessageStream,
    pub presence: PresenceTracker,
    pub preferences: PreferenceStore,
}

impl Forum {
    /// Must be called inside a tokio runtime.
    pub fn new(provider: Arc<dyn IdentityProvider>, store: Arc<dyn DocumentStore>) -> Self {
        Self::with_presence_config(provider, store, PresenceConfig::default())
    }

    pub fn with_presence_config(
        provider: Arc<dyn IdentityProvider>,
        store: Arc<dyn DocumentStore>,
        presence: PresenceConfig,
    ) -> Self {
        Self {
            session: SessionManager::new(provider),
            messages: MessageStream::new(store.clone()),
            presence: PresenceTracker::new(store.clone(), presence),
            preferences: PreferenceStore::new(store),
        }
    }

    /// Waits for the session to settle. Returning users with saved games
    /// skip onboarding.
    pub async fn landing(&self) -> ClientResult<Landing> {
        let Some(identity) = self.session.resolved().await else {
            return Ok(Landing::SignIn);
        };

        match self.preferences.load_profile(&identity.uid).await? {
            Some(profile) if profile.has_games() => Ok(Landing::Ready(profile)),
            _ => Ok(Landing::Onboarding),
        }
    }

    /// Guest sign-in form: anonymous sign-in under the chosen username plus
    /// an initial profile without games.
    pub async fn continue_as_guest(&self, username: &str) -> ClientResult<Identity> {
        let username = validate_username(username)?;

        self.session.continue_as_guest().await?;
        let identity = self.session.set_display_name(username).await?;
        self.preferences.register_guest(&identity, username).await?;

        info!("Guest {} joined as {}", identity.uid, username);
        Ok(identity)
    }

    pub fn onboarding(&self) -> OnboardingWizard {
        OnboardingWizard::new()
    }

    pub fn profile_editor(&self, profile: &UserProfile) -> ProfileEditor {
        ProfileEditor::new(profile)
    }
}
