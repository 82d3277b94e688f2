//! Application Lifecycle
//!
//! Wires configuration into the long-lived services. Everything here is
//! started once and torn down by [`NewsSphere::shutdown`].

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client as HttpClient;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::access::{AdminGuard, AuthGuard, RoleResolver, SubscriptionResolver};
use crate::api::ApiClient;
use crate::config::{ClientConfig, IdentityProviderKind, TokenStoreKind};
use crate::identity::{FirebaseIdentityProvider, IdentityProvider, MockIdentityProvider};
use crate::session::{
    CredentialVault, FileTokenStore, KeyringTokenStore, MemoryTokenStore, SessionConfig,
    SessionService, TokenStore, IDENTITY_FILE, SESSION_FILE,
};

/// Running client: session, API and access control.
pub struct NewsSphere {
    pub config: ClientConfig,
    pub api: ApiClient,
    pub session: SessionService,
    pub roles: RoleResolver,
    pub subscriptions: Arc<SubscriptionResolver>,
    pub auth_guard: AuthGuard,
    pub admin_guard: AdminGuard,
    restore_task: Option<JoinHandle<()>>,
}

fn token_store(
    kind: &TokenStoreKind,
    file_name: &str,
    keyring: KeyringTokenStore,
) -> Result<Arc<dyn TokenStore>> {
    Ok(match kind {
        TokenStoreKind::Keyring => Arc::new(keyring),
        TokenStoreKind::File(dir) => Arc::new(
            FileTokenStore::new(dir, file_name)
                .with_context(|| format!("Failed to open token store in {}", dir.display()))?,
        ),
        TokenStoreKind::Memory => Arc::new(MemoryTokenStore::new()),
    })
}

impl NewsSphere {
    /// Start with the built-in identity provider chosen by `config`.
    pub async fn start(config: ClientConfig) -> Result<Self> {
        let config = config.validated()?;
        let http = HttpClient::builder()
            .timeout(config.http_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let mut restore_task = None;
        let provider: Arc<dyn IdentityProvider> = match &config.identity_provider {
            IdentityProviderKind::Firebase {
                api_key,
                auth_url,
                token_url,
            } => {
                // Refresh token lives next to the session token, under its own key
                let refresh_store = token_store(
                    &config.token_store,
                    IDENTITY_FILE,
                    KeyringTokenStore::identity_refresh_token(auth_url),
                )?;
                let firebase = Arc::new(FirebaseIdentityProvider::new(
                    http.clone(),
                    api_key.as_str(),
                    auth_url.as_str(),
                    token_url.as_str(),
                    refresh_store,
                ));
                restore_task = Some(firebase.spawn_restore());
                firebase
            }
            IdentityProviderKind::Mock => {
                warn!("Using the in-memory identity provider");
                Arc::new(MockIdentityProvider::new())
            }
        };

        let mut app = Self::with_provider(config, http, provider)?;
        app.restore_task = restore_task;
        Ok(app)
    }

    /// Start with a caller-supplied identity provider.
    pub fn with_provider(
        config: ClientConfig,
        http: HttpClient,
        provider: Arc<dyn IdentityProvider>,
    ) -> Result<Self> {
        let config = config.validated()?;
        let store = token_store(
            &config.token_store,
            SESSION_FILE,
            KeyringTokenStore::access_token(&config.api_url),
        )?;
        let (vault, revocations) = CredentialVault::new(store);
        let api = ApiClient::new(http, &config.api_url, Arc::clone(&vault));

        let session = SessionService::start(
            provider,
            vault,
            revocations,
            api.clone(),
            SessionConfig {
                identity_timeout: config.identity_timeout,
                settle_timeout: config.identity_timeout + config.http_timeout,
                sign_in_path: config.sign_in_path.clone(),
            },
        );

        let roles = RoleResolver::new(api.clone());
        let subscriptions = Arc::new(SubscriptionResolver::new(
            api.clone(),
            config.subscription_cache_ttl,
        ));

        info!(api_url = %config.api_url, "NewsSphere client started");

        Ok(Self {
            auth_guard: AuthGuard::new(config.sign_in_path.as_str()),
            admin_guard: AdminGuard::new(config.sign_in_path.as_str(), roles.clone()),
            config,
            api,
            session,
            roles,
            subscriptions,
            restore_task: None,
        })
    }

    /// Stop background work. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.restore_task.take() {
            task.abort();
        }
        self.session.shutdown();
        self.subscriptions.clear();
        info!("NewsSphere client stopped");
    }
}
