//! First-run wizard: welcome, pick games, pick a role and rank per game.

use tracing::{info, warn};

use gamerzone_types::{GameId, UserProfile};

use crate::error::{ClientError, ClientResult, ValidationError};
use crate::form::GameForm;
use crate::preferences::PreferenceStore;
use crate::session::SessionManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Welcome,
    GameSelection,
    RoleCustomization,
    Saved,
}

#[derive(Debug, Clone)]
pub struct OnboardingWizard {
    step: Step,
    form: GameForm,
    error: Option<String>,
}

impl Default for OnboardingWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl OnboardingWizard {
    pub fn new() -> Self {
        Self {
            step: Step::Welcome,
            form: GameForm::new(),
            error: None,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn form(&self) -> &GameForm {
        &self.form
    }

    /// Role and rank choices; only meaningful once past game selection.
    pub fn form_mut(&mut self) -> &mut GameForm {
        &mut self.form
    }

    /// Last error shown inline on the current step.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn get_started(&mut self) {
        if self.step == Step::Welcome {
            self.step = Step::GameSelection;
        }
    }

    pub fn toggle_game(&mut self, game: GameId) {
        if self.step == Step::GameSelection {
            self.form.toggle(game);
        }
    }

    /// "Next" is enabled once at least one game is selected.
    pub fn can_advance(&self) -> bool {
        self.step == Step::GameSelection && self.form.has_selection()
    }

    pub fn next(&mut self) -> Result<(), ValidationError> {
        match self.step {
            Step::GameSelection if self.form.has_selection() => {
                self.step = Step::RoleCustomization;
                self.error = None;
                Ok(())
            }
            Step::GameSelection => Err(ValidationError::NoGames),
            _ => Err(ValidationError::WrongStep),
        }
    }

    pub fn back(&mut self) {
        self.step = match self.step {
            Step::GameSelection => Step::Welcome,
            Step::RoleCustomization => Step::GameSelection,
            other => other,
        };
        self.error = None;
    }

    /// Validates, makes sure there is an identity (signing in as a guest if
    /// needed) and saves the profile. On failure the wizard stays on role
    /// customization with the message in [`OnboardingWizard::error`].
    pub async fn submit(
        &mut self,
        session: &SessionManager,
        preferences: &PreferenceStore,
    ) -> ClientResult<UserProfile> {
        if self.step != Step::RoleCustomization {
            return Err(ValidationError::WrongStep.into());
        }

        let result = self.save(session, preferences).await;
        match &result {
            Ok(profile) => {
                info!("Onboarding complete for {}", profile.uid);
                self.step = Step::Saved;
                self.error = None;
            }
            Err(e) => {
                if !matches!(e, ClientError::Validation(_)) {
                    warn!("Onboarding save failed: {}", e);
                }
                self.error = Some(e.to_string());
            }
        }
        result
    }

    async fn save(
        &self,
        session: &SessionManager,
        preferences: &PreferenceStore,
    ) -> ClientResult<UserProfile> {
        // No sign-in happens for a form that cannot be saved anyway.
        self.form.preferences()?;

        let identity = match session.resolved().await {
            Some(identity) => identity,
            None => session.continue_as_guest().await?,
        };
        preferences.save_profile(&identity, &self.form).await
    }
}
