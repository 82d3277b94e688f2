//! Role Resolver
//!
//! Asks the backend whether an identity holds the administrator role. Never
//! cached: every guard evaluation asks again.

use ns_common::Identity;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::Resolution;
use crate::api::ApiClient;

/// Resolves the administrator flag for an identity.
#[derive(Clone)]
pub struct RoleResolver {
    api: ApiClient,
}

impl RoleResolver {
    /// Create a resolver using `api`.
    pub const fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Whether `identity` is an administrator. Any failure counts as "no".
    #[tracing::instrument(skip(self, identity), fields(uid = %identity.uid))]
    pub async fn resolve(&self, identity: &Identity) -> bool {
        match self.api.check_admin(&identity.email).await {
            Ok(is_admin) => {
                debug!(is_admin, "Role resolved");
                is_admin
            }
            Err(e) => {
                warn!("Role check failed, treating as non-admin: {}", e);
                false
            }
        }
    }

    /// Start resolving in the background.
    ///
    /// The receiver holds [`Resolution::Pending`] until the request completes.
    pub fn watch(&self, identity: &Identity) -> watch::Receiver<Resolution<bool>> {
        let (tx, rx) = watch::channel(Resolution::Pending);
        let resolver = self.clone();
        let identity = identity.clone();
        tokio::spawn(async move {
            let is_admin = resolver.resolve(&identity).await;
            // Receiver gone means nobody is waiting any more
            let _ = tx.send(Resolution::Settled(is_admin));
        });
        rx
    }
}
