//! External identity provider.
//!
//! Sign-in, sign-up and profile management are delegated to a third-party
//! provider. The provider reports every identity change through a watch
//! channel, which the session service treats as the single source of truth
//! for "who is signed in".

pub mod firebase;
pub mod mock;

use async_trait::async_trait;
use ns_common::Identity;
use thiserror::Error;
use tokio::sync::watch;

pub use firebase::FirebaseIdentityProvider;
pub use mock::MockIdentityProvider;

/// Identity state as last reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProviderState {
    /// The provider has not reported anything yet.
    #[default]
    Initializing,
    /// Nobody is signed in.
    SignedOut,
    /// A user is signed in.
    SignedIn(Identity),
}

impl ProviderState {
    /// The signed-in identity, if any.
    pub const fn identity(&self) -> Option<&Identity> {
        match self {
            Self::SignedIn(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Errors reported by identity providers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// Wrong email or password.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Sign-up with an email that is already registered.
    #[error("An account with this email already exists")]
    AccountExists,

    /// Password refused by the provider or by local rules.
    #[error("Password is too weak: {0}")]
    WeakPassword(String),

    /// The user dismissed the external sign-in prompt.
    #[error("Sign-in was cancelled")]
    Cancelled,

    /// Operation needs a signed-in user.
    #[error("Not signed in")]
    NotSignedIn,

    /// The provider refused the request for another reason.
    #[error("Identity provider rejected the request: {0}")]
    Rejected(String),

    /// The provider could not be reached.
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Third-party sign-in methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalProvider {
    Google,
    GitHub,
}

impl ExternalProvider {
    /// Provider id understood by the identity service.
    pub const fn provider_id(self) -> &'static str {
        match self {
            Self::Google => "google.com",
            Self::GitHub => "github.com",
        }
    }
}

/// Credential obtained from an external provider's consent flow.
///
/// `id_token` is `None` when the user closed the consent window.
#[derive(Debug, Clone)]
pub struct ExternalCredential {
    pub provider: ExternalProvider,
    pub id_token: Option<String>,
}

/// Profile fields to change. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// Identity provider adapter.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Subscribe to identity changes. The current state is visible immediately.
    fn state(&self) -> watch::Receiver<ProviderState>;

    /// Register a new email/password account and sign it in.
    async fn create_user(&self, email: &str, password: &str) -> Result<Identity, IdentityError>;

    /// Sign in with email and password.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, IdentityError>;

    /// Sign in with a credential from an external provider.
    async fn sign_in_with_credential(
        &self,
        credential: ExternalCredential,
    ) -> Result<Identity, IdentityError>;

    /// Sign the current user out.
    async fn sign_out(&self) -> Result<(), IdentityError>;

    /// Change the current user's profile.
    async fn update_profile(&self, update: ProfileUpdate) -> Result<Identity, IdentityError>;
}
