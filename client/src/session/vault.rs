//! Credential vault.
//!
//! Wraps the durable [`TokenStore`] and decides when the stored token may be
//! attached to requests. A token is only released after the session service
//! has established an identity for it, and a token rejected by the backend is
//! revoked exactly once.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::store::{TokenStore, VaultError};

/// Notice that the backend rejected the active token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revocation {
    /// HTTP status that triggered the revocation (401 or 403).
    pub status: u16,
}

/// Gatekeeper for the backend bearer token.
pub struct CredentialVault {
    store: Arc<dyn TokenStore>,
    /// Whether the stored token belongs to an established identity.
    /// Every read-modify-write of the store happens under this lock.
    active: Mutex<bool>,
    revocations: mpsc::UnboundedSender<Revocation>,
}

impl CredentialVault {
    /// Create a vault and the receiving end of its revocation channel.
    pub fn new(store: Arc<dyn TokenStore>) -> (Arc<Self>, mpsc::UnboundedReceiver<Revocation>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let vault = Arc::new(Self {
            store,
            active: Mutex::new(false),
            revocations: tx,
        });
        (vault, rx)
    }

    fn load(&self) -> Option<String> {
        match self.store.load() {
            Ok(token) => token,
            Err(e) => {
                warn!("Failed to read stored token, treating as absent: {}", e);
                None
            }
        }
    }

    fn remove(&self) {
        if let Err(e) = self.store.clear() {
            warn!("Failed to remove stored token: {}", e);
        }
    }

    /// Whether a durable token exists, active or not.
    pub async fn has_stored_token(&self) -> bool {
        let _guard = self.active.lock().await;
        self.load().is_some()
    }

    /// Trust the stored token for the identity that was just established.
    ///
    /// Returns `false` when there is no stored token to trust.
    pub async fn activate(&self) -> bool {
        let mut active = self.active.lock().await;
        *active = self.load().is_some();
        debug!(active = *active, "Vault activation");
        *active
    }

    /// Persist a freshly issued token and release it to requests.
    pub async fn install(&self, token: &str) -> Result<(), VaultError> {
        let mut active = self.active.lock().await;
        self.store.save(token)?;
        *active = true;
        Ok(())
    }

    /// Forget the token (sign-out).
    pub async fn clear(&self) {
        let mut active = self.active.lock().await;
        self.remove();
        *active = false;
    }

    /// Stop releasing the token without removing it from durable storage.
    pub async fn suspend(&self) {
        *self.active.lock().await = false;
    }

    /// Token to attach to an authenticated request, if one may be sent.
    pub async fn bearer(&self) -> Option<String> {
        let active = self.active.lock().await;
        if *active {
            self.load()
        } else {
            None
        }
    }

    /// Whether a token is currently released to requests.
    pub async fn is_active(&self) -> bool {
        *self.active.lock().await
    }

    /// Revoke `token` if it is still the active one.
    ///
    /// Returns `true` for exactly one caller per token: concurrent failures of
    /// requests that carried the same token find it already gone.
    pub async fn revoke_if_current(&self, token: &str, status: u16) -> bool {
        let mut active = self.active.lock().await;
        if !*active || self.load().as_deref() != Some(token) {
            debug!(status, "Ignoring rejection of a token that is no longer current");
            return false;
        }

        self.remove();
        *active = false;
        info!(status, "Backend rejected the session token, revoking");

        if self.revocations.send(Revocation { status }).is_err() {
            warn!("Revocation dropped: session service is not running");
        }
        true
    }
}
