//! Session State
//!
//! The session service owns "who is signed in and may call the backend".
//! It is started once at application start and publishes immutable
//! [`SessionSnapshot`]s; everything else reads snapshots, never writes them.

mod service;
mod store;
mod vault;

use ns_common::Identity;
use thiserror::Error;

use crate::identity::IdentityError;
use crate::routes::Redirect;

pub use service::{SessionConfig, SessionService, SignUp};
pub use store::{
    FileTokenStore, KeyringTokenStore, MemoryTokenStore, TokenStore, VaultError, IDENTITY_FILE,
    SESSION_FILE,
};
pub use vault::{CredentialVault, Revocation};

/// Consistent view of the session between two writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Identity reported by the provider.
    pub identity: Option<Identity>,
    /// Whether the backend token for `identity` is in place.
    pub authenticated: bool,
    /// Whether an identity change or user action is being resolved.
    pub loading: bool,
}

impl SessionSnapshot {
    /// State before the identity provider has reported anything.
    pub const fn initial() -> Self {
        Self {
            identity: None,
            authenticated: false,
            loading: true,
        }
    }

    /// Settled, signed-in and holding a backend token.
    pub const fn is_authenticated(&self) -> bool {
        !self.loading && self.authenticated && self.identity.is_some()
    }

    /// Settled and not signed in.
    pub const fn is_unauthenticated(&self) -> bool {
        !self.loading && !self.is_authenticated()
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}

/// Severity of a user-facing notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient message for the user (toast).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

/// Out-of-band events emitted by the session service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Show a message to the user.
    Notice(Notice),
    /// Navigate, e.g. to sign-in after the backend rejected the session.
    Redirect(Redirect),
}

/// Session operation errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The identity provider refused the operation.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The session did not settle in time.
    #[error("Timed out waiting for the session to settle")]
    Timeout,

    /// Signed in with the provider but the backend issued no token.
    #[error("Signed in, but the server did not accept the session")]
    NotAuthenticated,

    /// The session service has shut down.
    #[error("Session service stopped")]
    Stopped,
}
