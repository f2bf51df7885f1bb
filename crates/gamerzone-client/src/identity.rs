use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use gamerzone_types::Identity;

/// Profile already verified by an external identity provider (e.g. Google).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedCredential {
    pub provider: String,
    pub subject: String,
    pub display_name: Option<String>,
    pub photo_url: Option<String>,
}

/// The managed authentication service. Calls may block on the network.
pub trait IdentityProvider: Send + Sync {
    /// Session persisted from an earlier run, if any.
    fn restore_session(&self) -> Result<Option<Identity>>;

    fn sign_in_anonymously(&self) -> Result<Identity>;

    fn sign_in_federated(&self, credential: &FederatedCredential) -> Result<Identity>;

    fn update_display_name(&self, uid: &str, display_name: &str) -> Result<Identity>;

    /// Provider-side session end (expiry or sign-out elsewhere).
    fn sign_out(&self) -> Result<()>;

    /// Fires with the new principal on every sign-in and with `None` on sign-out.
    fn session_changes(&self) -> broadcast::Receiver<Option<Identity>>;
}

#[derive(Default)]
struct LocalState {
    current: Option<Identity>,
    accounts: HashMap<String, Identity>,
    /// (provider, subject) -> uid
    federated: HashMap<(String, String), String>,
}

/// In-process identity provider. Optionally persists the current session to
/// a JSON file so a restart resumes it.
pub struct LocalIdentityProvider {
    state: Mutex<LocalState>,
    session_path: Option<PathBuf>,
    tx: broadcast::Sender<Option<Identity>>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(LocalState::default()),
            session_path: None,
            tx,
        }
    }

    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self {
            session_path: Some(path.into()),
            ..Self::new()
        }
    }

    fn with_state<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut LocalState) -> Result<T>,
    {
        let mut state = self.state.lock().map_err(|e| anyhow!("identity lock poisoned: {}", e))?;
        f(&mut state)
    }

    /// Makes `identity` current, persists it and notifies listeners.
    fn activate(&self, identity: Identity) -> Result<Identity> {
        self.with_state(|state| {
            state.accounts.insert(identity.uid.clone(), identity.clone());
            state.current = Some(identity.clone());
            Ok(())
        })?;
        self.persist(Some(&identity));
        let _ = self.tx.send(Some(identity.clone()));
        Ok(identity)
    }

    fn persist(&self, identity: Option<&Identity>) {
        let Some(path) = &self.session_path else {
            return;
        };
        let result = match identity {
            Some(identity) => serde_json::to_vec_pretty(identity)
                .map_err(anyhow::Error::from)
                .and_then(|bytes| std::fs::write(path, bytes).map_err(Into::into)),
            None => match std::fs::remove_file(path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            },
        };
        if let Err(e) = result {
            warn!("Failed to persist session to {}: {:#}", path.display(), e);
        }
    }
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for LocalIdentityProvider {
    fn restore_session(&self) -> Result<Option<Identity>> {
        if let Some(current) = self.with_state(|state| Ok(state.current.clone()))? {
            return Ok(Some(current));
        }
        let Some(path) = &self.session_path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let bytes = std::fs::read(path)
            .with_context(|| format!("reading session file {}", path.display()))?;
        let identity: Identity = serde_json::from_slice(&bytes)
            .with_context(|| format!("corrupt session file {}", path.display()))?;

        info!("Restored session for {}", identity.uid);
        self.with_state(|state| {
            state.accounts.insert(identity.uid.clone(), identity.clone());
            state.current = Some(identity.clone());
            Ok(())
        })?;
        Ok(Some(identity))
    }

    fn sign_in_anonymously(&self) -> Result<Identity> {
        let identity = Identity {
            uid: Uuid::new_v4().simple().to_string(),
            display_name: None,
            photo_url: None,
            is_anonymous: true,
        };
        info!("Anonymous sign-in as {}", identity.uid);
        self.activate(identity)
    }

    fn sign_in_federated(&self, credential: &FederatedCredential) -> Result<Identity> {
        if credential.subject.is_empty() {
            return Err(anyhow!("{} credential without subject", credential.provider));
        }

        let key = (credential.provider.clone(), credential.subject.clone());
        let identity = self.with_state(|state| {
            let uid = state
                .federated
                .entry(key)
                .or_insert_with(|| Uuid::new_v4().simple().to_string())
                .clone();
            let identity = match state.accounts.get(&uid) {
                Some(existing) => Identity {
                    photo_url: credential.photo_url.clone().or_else(|| existing.photo_url.clone()),
                    ..existing.clone()
                },
                None => Identity {
                    uid,
                    display_name: credential.display_name.clone(),
                    photo_url: credential.photo_url.clone(),
                    is_anonymous: false,
                },
            };
            Ok(identity)
        })?;

        info!("{} sign-in as {}", credential.provider, identity.uid);
        self.activate(identity)
    }

    fn update_display_name(&self, uid: &str, display_name: &str) -> Result<Identity> {
        let (identity, is_current) = self.with_state(|state| {
            let account = state
                .accounts
                .get_mut(uid)
                .ok_or_else(|| anyhow!("unknown account {}", uid))?;
            account.display_name = Some(display_name.to_string());
            let identity = account.clone();

            let is_current = state.current.as_ref().is_some_and(|c| c.uid == uid);
            if is_current {
                state.current = Some(identity.clone());
            }
            Ok((identity, is_current))
        })?;

        if is_current {
            self.persist(Some(&identity));
            let _ = self.tx.send(Some(identity.clone()));
        }
        Ok(identity)
    }

    fn sign_out(&self) -> Result<()> {
        self.with_state(|state| {
            state.current = None;
            Ok(())
        })?;
        self.persist(None);
        let _ = self.tx.send(None);
        Ok(())
    }

    fn session_changes(&self) -> broadcast::Receiver<Option<Identity>> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn google(subject: &str) -> FederatedCredential {
        FederatedCredential {
            provider: "google.com".into(),
            subject: subject.into(),
            display_name: Some("Kai".into()),
            photo_url: Some("https://example.com/kai.png".into()),
        }
    }

    #[test]
    fn anonymous_sign_ins_get_fresh_uids() {
        let provider = LocalIdentityProvider::new();
        let a = provider.sign_in_anonymously().unwrap();
        let b = provider.sign_in_anonymously().unwrap();
        assert!(a.is_anonymous);
        assert_ne!(a.uid, b.uid);
    }

    #[test]
    fn federated_subject_maps_to_a_stable_uid() {
        let provider = LocalIdentityProvider::new();
        let first = provider.sign_in_federated(&google("123")).unwrap();
        provider.sign_out().unwrap();
        let second = provider.sign_in_federated(&google("123")).unwrap();

        assert_eq!(first.uid, second.uid);
        assert!(!second.is_anonymous);
        assert_eq!(second.display_name.as_deref(), Some("Kai"));
    }

    #[test]
    fn display_name_update_is_broadcast_for_current_session() {
        let provider = LocalIdentityProvider::new();
        let identity = provider.sign_in_anonymously().unwrap();
        let mut changes = provider.session_changes();

        let updated = provider.update_display_name(&identity.uid, "kai_99").unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("kai_99"));
        assert_eq!(changes.try_recv().unwrap(), Some(updated));
    }

    #[test]
    fn persistent_session_survives_restart() {
        let path = std::env::temp_dir().join(format!("gamerzone_session_{}.json", Uuid::new_v4()));

        let identity = {
            let provider = LocalIdentityProvider::persistent(&path);
            provider.sign_in_anonymously().unwrap()
        };

        let restarted = LocalIdentityProvider::persistent(&path);
        assert_eq!(restarted.restore_session().unwrap(), Some(identity));

        restarted.sign_out().unwrap();
        assert!(!path.exists());
    }
}
