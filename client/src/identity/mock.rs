//! Mock Identity Provider
//!
//! In-memory accounts for development and tests. External credentials carry
//! the user's email as their id token.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ns_common::Identity;
use tokio::sync::watch;
use uuid::Uuid;

use super::{
    ExternalCredential, IdentityError, IdentityProvider, ProfileUpdate, ProviderState,
};

struct Account {
    password: String,
    identity: Identity,
}

/// Identity provider backed by a map of accounts.
pub struct MockIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    state: watch::Sender<ProviderState>,
    sign_outs: AtomicUsize,
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityProvider {
    /// Provider that immediately reports "signed out".
    pub fn new() -> Self {
        let provider = Self::silent();
        provider.state.send_replace(ProviderState::SignedOut);
        provider
    }

    /// Provider that reports nothing until an account signs in or out.
    pub fn silent() -> Self {
        let (state, _) = watch::channel(ProviderState::Initializing);
        Self {
            accounts: Mutex::new(HashMap::new()),
            state,
            sign_outs: AtomicUsize::new(0),
        }
    }

    /// Register an account without signing it in.
    pub fn add_account(&self, email: &str, password: &str, display_name: Option<&str>) -> Identity {
        let identity = Identity {
            uid: Uuid::now_v7().to_string(),
            email: email.to_string(),
            display_name: display_name.map(str::to_string),
            avatar_url: None,
        };
        self.lock_accounts().insert(
            email.to_lowercase(),
            Account {
                password: password.to_string(),
                identity: identity.clone(),
            },
        );
        identity
    }

    /// Report `identity` as signed in, as a provider does when it restores a
    /// session persisted by an earlier run.
    pub fn restore(&self, identity: Identity) {
        self.state.send_replace(ProviderState::SignedIn(identity));
    }

    /// How many times `sign_out` was called.
    pub fn sign_out_count(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }

    fn lock_accounts(&self) -> std::sync::MutexGuard<'_, HashMap<String, Account>> {
        self.accounts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn signed_in(&self, identity: Identity) -> Identity {
        self.state.send_replace(ProviderState::SignedIn(identity.clone()));
        identity
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    fn state(&self) -> watch::Receiver<ProviderState> {
        self.state.subscribe()
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<Identity, IdentityError> {
        if self.lock_accounts().contains_key(&email.to_lowercase()) {
            return Err(IdentityError::AccountExists);
        }
        let identity = self.add_account(email, password, None);
        Ok(self.signed_in(identity))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, IdentityError> {
        let identity = {
            let accounts = self.lock_accounts();
            match accounts.get(&email.to_lowercase()) {
                Some(account) if account.password == password => account.identity.clone(),
                _ => return Err(IdentityError::InvalidCredentials),
            }
        };
        Ok(self.signed_in(identity))
    }

    async fn sign_in_with_credential(
        &self,
        credential: ExternalCredential,
    ) -> Result<Identity, IdentityError> {
        let email = credential.id_token.ok_or(IdentityError::Cancelled)?;
        let existing = self
            .lock_accounts()
            .get(&email.to_lowercase())
            .map(|account| account.identity.clone());
        let identity = match existing {
            Some(identity) => identity,
            None => self.add_account(&email, &Uuid::now_v7().to_string(), None),
        };
        Ok(self.signed_in(identity))
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(ProviderState::SignedOut);
        Ok(())
    }

    async fn update_profile(&self, update: ProfileUpdate) -> Result<Identity, IdentityError> {
        let current = self
            .state
            .borrow()
            .identity()
            .cloned()
            .ok_or(IdentityError::NotSignedIn)?;

        let identity = {
            let mut accounts = self.lock_accounts();
            let account = accounts
                .get_mut(&current.email.to_lowercase())
                .ok_or(IdentityError::NotSignedIn)?;
            if let Some(name) = update.display_name {
                account.identity.display_name = Some(name);
            }
            if let Some(url) = update.avatar_url {
                account.identity.avatar_url = Some(url);
            }
            account.identity.clone()
        };
        Ok(self.signed_in(identity))
    }
}
