//! Backend REST client.
//!
//! Typed wrappers over the `NewsSphere` backend. Authenticated calls read the
//! bearer token from the [`CredentialVault`] at request time; a 401/403 answer
//! revokes that token, which makes the session service sign the user out.

mod articles;
mod auth;
mod error;
mod payments;
mod publishers;
mod users;

use std::sync::Arc;

use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};
use url::form_urlencoded;

pub use error::{ApiError, ApiResult};

use crate::session::CredentialVault;

/// Body placeholder for requests without one.
pub(crate) const NO_BODY: Option<&()> = None;

/// Error body returned by the backend on refused operations.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Build a URL-encoded query string from optional pairs, skipping `None`.
pub(crate) fn build_query(params: &[(&str, Option<String>)]) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        if let Some(v) = value {
            serializer.append_pair(key, v);
        }
    }
    serializer.finish()
}

/// Append a query string to `path` when it is non-empty.
pub(crate) fn with_query(path: &str, query: &str) -> String {
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

/// Percent-encode a single path segment.
pub(crate) fn segment(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Client for the `NewsSphere` backend.
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    base_url: Arc<str>,
    vault: Arc<CredentialVault>,
}

impl ApiClient {
    /// Create a client for `base_url` that takes tokens from `vault`.
    pub fn new(http: HttpClient, base_url: &str, vault: Arc<CredentialVault>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').into(),
            vault,
        }
    }

    /// Backend base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Call an endpoint that needs no credentials.
    pub(crate) async fn public<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        self.execute(method, path, body, None).await
    }

    /// Call an endpoint with the session's bearer token.
    pub(crate) async fn authed<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let Some(token) = self.vault.bearer().await else {
            debug!(path, "Refusing authenticated call without a session");
            return Err(ApiError::NotAuthenticated);
        };
        self.execute(method, path, body, Some(token)).await
    }

    async fn execute<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        token: Option<String>,
    ) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let endpoint = path.split('?').next().unwrap_or(path);
        debug!(%method, endpoint, "Calling backend");

        let mut request = self
            .http
            .request(method.clone(), format!("{}{}", self.base_url, path));
        if let Some(token) = token.as_deref() {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            error!("Request to {} failed: {}", endpoint, e);
            ApiError::Transport(e.to_string())
        })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(status = status.as_u16(), endpoint, "Backend rejected credentials");
            if let Some(token) = token.as_deref() {
                self.vault.revoke_if_current(token, status.as_u16()).await;
            }
            return Err(ApiError::Unauthorized {
                status: status.as_u16(),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("{} {} failed: {} - {}", method, endpoint, status, body);
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or_else(|_| format!("Request failed: {status}"));
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        serde_json::from_str(&text).map_err(|source| {
            error!("Invalid response from {}: {}", endpoint, source);
            ApiError::Decode {
                endpoint: endpoint.to_string(),
                source,
            }
        })
    }
}
