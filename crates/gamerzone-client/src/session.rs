use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use gamerzone_types::Identity;

use crate::blocking;
use crate::error::{ClientError, ClientResult};
use crate::identity::{FederatedCredential, IdentityProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// No notification from the provider yet. Not the same as signed out.
    Loading,
    SignedOut,
    SignedIn(Identity),
}

impl SessionStatus {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionStatus::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionStatus::Loading)
    }
}

/// Tracks the current principal and broadcasts every change to dependents.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    status: Arc<watch::Sender<SessionStatus>>,
    relay: JoinHandle<()>,
}

impl SessionManager {
    /// Must be called inside a tokio runtime.
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (status, _) = watch::channel(SessionStatus::Loading);
        let status = Arc::new(status);

        // Subscribe before restoring so a sign-in racing the restore is not lost.
        let mut changes = provider.session_changes();

        let relay = tokio::spawn({
            let provider = provider.clone();
            let status = status.clone();
            async move {
                match blocking(move || provider.restore_session()).await {
                    Ok(restored) => {
                        // An explicit sign-in may already have resolved the session.
                        status.send_if_modified(|current| {
                            if current.is_loading() {
                                *current = into_status(restored);
                                true
                            } else {
                                false
                            }
                        });
                    }
                    Err(e) => {
                        warn!("Session restore failed, treating as signed out: {:#}", e);
                        status.send_if_modified(|current| {
                            if current.is_loading() {
                                *current = SessionStatus::SignedOut;
                                true
                            } else {
                                false
                            }
                        });
                    }
                }

                loop {
                    match changes.recv().await {
                        Ok(mut identity) => {
                            // Only the newest queued notification is current.
                            while let Ok(newer) = changes.try_recv() {
                                identity = newer;
                            }
                            publish(&status, identity);
                        }
                        Err(RecvError::Lagged(n)) => {
                            warn!("Session relay lagged by {} notifications", n);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        });

        Self {
            provider,
            status,
            relay,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.status.borrow().identity().cloned()
    }

    /// Receives every status change, starting from the current one.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Waits out the loading window and returns the settled identity.
    pub async fn resolved(&self) -> Option<Identity> {
        let mut rx = self.subscribe();
        match rx.wait_for(|status| !status.is_loading()).await {
            Ok(status) => status.identity().cloned(),
            // The sender lives as long as `self`.
            Err(_) => None,
        }
    }

    /// Signs in anonymously; the new identity becomes current before this returns.
    pub async fn continue_as_guest(&self) -> ClientResult<Identity> {
        let provider = self.provider.clone();
        let identity = blocking(move || provider.sign_in_anonymously())
            .await
            .map_err(ClientError::Auth)?;

        info!("Continuing as guest {}", identity.uid);
        publish(&self.status, Some(identity.clone()));
        Ok(identity)
    }

    pub async fn sign_in_federated(
        &self,
        credential: FederatedCredential,
    ) -> ClientResult<Identity> {
        let provider = self.provider.clone();
        let identity = blocking(move || provider.sign_in_federated(&credential))
            .await
            .map_err(ClientError::Auth)?;

        publish(&self.status, Some(identity.clone()));
        Ok(identity)
    }

    pub async fn set_display_name(&self, display_name: &str) -> ClientResult<Identity> {
        let current = self
            .current_identity()
            .ok_or_else(|| ClientError::Auth(anyhow::anyhow!("no active session")))?;

        let provider = self.provider.clone();
        let name = display_name.to_string();
        let identity = blocking(move || provider.update_display_name(&current.uid, &name))
            .await
            .map_err(ClientError::Auth)?;

        publish(&self.status, Some(identity.clone()));
        Ok(identity)
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.relay.abort();
    }
}

fn into_status(identity: Option<Identity>) -> SessionStatus {
    match identity {
        Some(identity) => SessionStatus::SignedIn(identity),
        None => SessionStatus::SignedOut,
    }
}

fn publish(status: &watch::Sender<SessionStatus>, identity: Option<Identity>) {
    let next = into_status(identity);
    status.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::LocalIdentityProvider;

    #[tokio::test]
    async fn settles_to_signed_out_without_a_stored_session() {
        let session = SessionManager::new(Arc::new(LocalIdentityProvider::new()));
        assert_eq!(session.resolved().await, None);
        assert_eq!(session.status(), SessionStatus::SignedOut);
    }

    #[tokio::test]
    async fn guest_sign_in_is_broadcast() {
        let session = SessionManager::new(Arc::new(LocalIdentityProvider::new()));
        session.resolved().await;
        let mut rx = session.subscribe();

        let identity = session.continue_as_guest().await.unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().identity(), Some(&identity));
        assert_eq!(session.current_identity(), Some(identity));
    }

    #[tokio::test]
    async fn provider_side_sign_out_propagates() {
        let provider = Arc::new(LocalIdentityProvider::new());
        let session = SessionManager::new(provider.clone());
        session.resolved().await;
        session.continue_as_guest().await.unwrap();

        let mut rx = session.subscribe();
        provider.sign_out().unwrap();

        let status = rx
            .wait_for(|status| *status == SessionStatus::SignedOut)
            .await
            .unwrap()
            .clone();
        assert_eq!(status, SessionStatus::SignedOut);
    }

    #[tokio::test]
    async fn display_name_requires_a_session() {
        let session = SessionManager::new(Arc::new(LocalIdentityProvider::new()));
        session.resolved().await;
        let err = session.set_display_name("kai").await.unwrap_err();
        assert!(matches!(err, ClientError::Auth(_)));
    }
}
