//! Firebase Identity Provider
//!
//! Adapter for the Identity Toolkit REST API. The provider's refresh token is
//! kept in a [`TokenStore`] so a later run can restore the signed-in user.

use std::sync::Arc;

use async_trait::async_trait;
use ns_common::Identity;
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{
    ExternalCredential, IdentityError, IdentityProvider, ProfileUpdate, ProviderState,
};
use crate::session::TokenStore;

/// Account payload shared by the sign-in, sign-up, update and lookup responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl AccountResponse {
    fn identity(&self) -> Identity {
        Identity {
            uid: self.local_id.clone(),
            email: self.email.clone(),
            display_name: self.display_name.clone().filter(|n| !n.is_empty()),
            avatar_url: self.photo_url.clone().filter(|u| !u.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountResponse>,
}

/// Secure Token service response (snake_case, unlike Identity Toolkit).
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest {
    post_body: String,
    request_uri: &'static str,
    return_idp_credential: bool,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    id_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_url: Option<&'a str>,
    return_secure_token: bool,
}

/// Map an Identity Toolkit error code to an [`IdentityError`].
///
/// Codes look like `EMAIL_EXISTS` or `WEAK_PASSWORD : Password should be at least 6 characters`.
fn map_error_code(message: &str) -> IdentityError {
    let (code, detail) = match message.split_once(" : ") {
        Some((code, detail)) => (code.trim(), detail.trim()),
        None => (message.trim(), ""),
    };
    match code {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_EMAIL" => {
            IdentityError::InvalidCredentials
        }
        "EMAIL_EXISTS" => IdentityError::AccountExists,
        "WEAK_PASSWORD" => IdentityError::WeakPassword(if detail.is_empty() {
            "rejected by identity provider".to_string()
        } else {
            detail.to_string()
        }),
        "TOKEN_EXPIRED" | "INVALID_ID_TOKEN" | "USER_NOT_FOUND" | "INVALID_REFRESH_TOKEN" => {
            IdentityError::NotSignedIn
        }
        _ => IdentityError::Rejected(message.to_string()),
    }
}

/// Identity provider backed by Firebase Authentication.
pub struct FirebaseIdentityProvider {
    http: HttpClient,
    api_key: String,
    auth_url: String,
    token_url: String,
    refresh_store: Arc<dyn TokenStore>,
    /// Id token of the signed-in user.
    id_token: Mutex<Option<String>>,
    state: watch::Sender<ProviderState>,
}

impl FirebaseIdentityProvider {
    /// Create a provider. It reports [`ProviderState::Initializing`] until
    /// [`spawn_restore`](Self::spawn_restore) finishes.
    pub fn new(
        http: HttpClient,
        api_key: impl Into<String>,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
        refresh_store: Arc<dyn TokenStore>,
    ) -> Self {
        let (state, _) = watch::channel(ProviderState::Initializing);
        Self {
            http,
            api_key: api_key.into(),
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            refresh_store,
            id_token: Mutex::new(None),
            state,
        }
    }

    /// Restore the previous run's session in the background.
    pub fn spawn_restore(self: &Arc<Self>) -> JoinHandle<()> {
        let provider = Arc::clone(self);
        tokio::spawn(async move {
            let restored = provider.restore().await;
            match restored {
                Ok(Some(identity)) => {
                    info!("Restored identity provider session");
                    provider.state.send_replace(ProviderState::SignedIn(identity));
                }
                Ok(None) => {
                    provider.state.send_replace(ProviderState::SignedOut);
                }
                Err(e) => {
                    warn!("Could not restore identity provider session: {}", e);
                    if let Err(e) = provider.refresh_store.clear() {
                        warn!("Failed to clear refresh token: {}", e);
                    }
                    provider.state.send_replace(ProviderState::SignedOut);
                }
            }
        })
    }

    async fn restore(&self) -> Result<Option<Identity>, IdentityError> {
        let refresh_token = match self.refresh_store.load() {
            Ok(Some(token)) => token,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!("Failed to read refresh token: {}", e);
                return Ok(None);
            }
        };

        let refreshed: RefreshResponse = self
            .post(
                &format!("{}/token?key={}", self.token_url, self.api_key),
                &serde_json::json!({
                    "grant_type": "refresh_token",
                    "refresh_token": refresh_token,
                }),
            )
            .await?;

        let lookup: LookupResponse = self
            .call("accounts:lookup", &serde_json::json!({ "idToken": refreshed.id_token }))
            .await?;
        let account = lookup
            .users
            .into_iter()
            .next()
            .ok_or(IdentityError::NotSignedIn)?;

        let identity = account.identity();
        self.persist_refresh_token(&refreshed.refresh_token);
        *self.id_token.lock().await = Some(refreshed.id_token);
        Ok(Some(identity))
    }

    async fn call<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        method: &str,
        body: &B,
    ) -> Result<T, IdentityError> {
        self.post(
            &format!("{}/{}?key={}", self.auth_url, method, self.api_key),
            body,
        )
        .await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, IdentityError> {
        let response = self.http.post(url).json(body).send().await.map_err(|e| {
            error!("Identity provider request failed: {}", e);
            IdentityError::Unavailable(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            debug!("Identity provider returned {}: {}", status, body);
            return Err(match serde_json::from_str::<ErrorEnvelope>(&body) {
                Ok(envelope) => map_error_code(&envelope.error.message),
                Err(_) => IdentityError::Rejected(format!("HTTP {status}")),
            });
        }

        response.json().await.map_err(|e| {
            error!("Invalid identity provider response: {}", e);
            IdentityError::Unavailable(format!("Invalid response: {e}"))
        })
    }

    fn persist_refresh_token(&self, token: &str) {
        if let Err(e) = self.refresh_store.save(token) {
            // The user stays signed in for this run.
            error!("Failed to store refresh token: {}", e);
        }
    }

    /// Record a successful sign-in and report it to subscribers.
    async fn establish(&self, account: AccountResponse) -> Result<Identity, IdentityError> {
        let identity = account.identity();
        let id_token = account
            .id_token
            .ok_or_else(|| IdentityError::Rejected("response carried no id token".into()))?;
        if let Some(refresh_token) = account.refresh_token.as_deref() {
            self.persist_refresh_token(refresh_token);
        }
        *self.id_token.lock().await = Some(id_token);
        self.state.send_replace(ProviderState::SignedIn(identity.clone()));
        Ok(identity)
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    fn state(&self) -> watch::Receiver<ProviderState> {
        self.state.subscribe()
    }

    async fn create_user(&self, email: &str, password: &str) -> Result<Identity, IdentityError> {
        info!("Creating identity provider account");
        let account: AccountResponse = self
            .call(
                "accounts:signUp",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        self.establish(account).await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Identity, IdentityError> {
        debug!("Signing in with password");
        let account: AccountResponse = self
            .call(
                "accounts:signInWithPassword",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        self.establish(account).await
    }

    async fn sign_in_with_credential(
        &self,
        credential: ExternalCredential,
    ) -> Result<Identity, IdentityError> {
        let id_token = credential.id_token.ok_or(IdentityError::Cancelled)?;
        debug!(
            provider = credential.provider.provider_id(),
            "Signing in with external credential"
        );

        let post_body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("id_token", &id_token)
            .append_pair("providerId", credential.provider.provider_id())
            .finish();

        let account: AccountResponse = self
            .call(
                "accounts:signInWithIdp",
                &IdpRequest {
                    post_body,
                    request_uri: "http://localhost",
                    return_idp_credential: true,
                    return_secure_token: true,
                },
            )
            .await?;
        self.establish(account).await
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        *self.id_token.lock().await = None;
        if let Err(e) = self.refresh_store.clear() {
            warn!("Failed to clear refresh token: {}", e);
        }
        self.state.send_replace(ProviderState::SignedOut);
        Ok(())
    }

    async fn update_profile(&self, update: ProfileUpdate) -> Result<Identity, IdentityError> {
        let id_token = self
            .id_token
            .lock()
            .await
            .clone()
            .ok_or(IdentityError::NotSignedIn)?;

        let account: AccountResponse = self
            .call(
                "accounts:update",
                &UpdateRequest {
                    id_token: &id_token,
                    display_name: update.display_name.as_deref(),
                    photo_url: update.avatar_url.as_deref(),
                    return_secure_token: true,
                },
            )
            .await?;

        let identity = account.identity();
        if let Some(token) = account.id_token {
            *self.id_token.lock().await = Some(token);
        }
        if let Some(refresh_token) = account.refresh_token.as_deref() {
            self.persist_refresh_token(refresh_token);
        }
        self.state.send_replace(ProviderState::SignedIn(identity.clone()));
        Ok(identity)
    }
}
