//! Client Configuration
//!
//! Loads configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

/// Which identity provider adapter to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityProviderKind {
    /// Firebase Identity Toolkit REST API.
    Firebase {
        /// Web API key of the Firebase project.
        api_key: String,
        /// Identity Toolkit base URL.
        auth_url: String,
        /// Secure Token service base URL.
        token_url: String,
    },
    /// In-memory accounts (development only).
    Mock,
}

/// Where the bearer token is persisted between runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStoreKind {
    /// OS keyring.
    Keyring,
    /// JSON file inside the given directory.
    File(PathBuf),
    /// Process memory only.
    Memory,
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL (e.g., `https://api.newssphere.example`)
    pub api_url: String,

    /// Identity provider adapter
    pub identity_provider: IdentityProviderKind,

    /// How long to wait for the identity provider's first report (default: 10s)
    pub identity_timeout: Duration,

    /// Per-request HTTP timeout (default: 30s)
    pub http_timeout: Duration,

    /// Subscription status cache lifetime (default: 5 min)
    pub subscription_cache_ttl: Duration,

    /// Durable token storage
    pub token_store: TokenStoreKind,

    /// Route that unauthenticated visitors are redirected to (default: "/login")
    pub sign_in_path: String,
}

/// Default Firebase Identity Toolkit endpoint.
pub const FIREBASE_AUTH_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// Default Firebase Secure Token endpoint.
pub const FIREBASE_TOKEN_URL: &str = "https://securetoken.googleapis.com/v1";

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let api_url = env::var("NEWSSPHERE_API_URL").context("NEWSSPHERE_API_URL must be set")?;

        let identity_provider = match env::var("IDENTITY_PROVIDER")
            .unwrap_or_else(|_| "firebase".into())
            .as_str()
        {
            "firebase" => IdentityProviderKind::Firebase {
                api_key: env::var("FIREBASE_API_KEY")
                    .context("FIREBASE_API_KEY must be set for the firebase identity provider")?,
                auth_url: env::var("FIREBASE_AUTH_URL")
                    .unwrap_or_else(|_| FIREBASE_AUTH_URL.into()),
                token_url: env::var("FIREBASE_TOKEN_URL")
                    .unwrap_or_else(|_| FIREBASE_TOKEN_URL.into()),
            },
            "mock" => IdentityProviderKind::Mock,
            other => bail!("Unknown IDENTITY_PROVIDER: {other}. Supported: firebase, mock"),
        };

        let token_store = match env::var("TOKEN_STORE")
            .unwrap_or_else(|_| "keyring".into())
            .as_str()
        {
            "keyring" => TokenStoreKind::Keyring,
            "file" => TokenStoreKind::File(
                env::var("TOKEN_STORE_DIR")
                    .context("TOKEN_STORE_DIR must be set for the file token store")?
                    .into(),
            ),
            "memory" => TokenStoreKind::Memory,
            other => bail!("Unknown TOKEN_STORE: {other}. Supported: keyring, file, memory"),
        };

        Self {
            api_url,
            identity_provider,
            identity_timeout: secs_var("IDENTITY_TIMEOUT_SECS", 10),
            http_timeout: secs_var("HTTP_TIMEOUT_SECS", 30),
            subscription_cache_ttl: secs_var("SUBSCRIPTION_CACHE_TTL_SECS", 300),
            token_store,
            sign_in_path: env::var("SIGN_IN_PATH").unwrap_or_else(|_| "/login".into()),
        }
        .validated()
    }

    /// Configuration for tests: mock identity, in-memory tokens, short timeouts.
    pub fn default_for_test(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            identity_provider: IdentityProviderKind::Mock,
            identity_timeout: Duration::from_millis(200),
            http_timeout: Duration::from_secs(5),
            subscription_cache_ttl: Duration::from_secs(300),
            token_store: TokenStoreKind::Memory,
            sign_in_path: "/login".into(),
        }
    }

    /// Normalize and check values.
    pub fn validated(mut self) -> Result<Self> {
        self.api_url = self.api_url.trim().trim_end_matches('/').to_string();
        url::Url::parse(&self.api_url)
            .with_context(|| format!("Invalid NEWSSPHERE_API_URL: {}", self.api_url))?;

        if let IdentityProviderKind::Firebase {
            auth_url,
            token_url,
            ..
        } = &mut self.identity_provider
        {
            *auth_url = auth_url.trim_end_matches('/').to_string();
            *token_url = token_url.trim_end_matches('/').to_string();
        }
        if !self.sign_in_path.starts_with('/') {
            self.sign_in_path = format!("/{}", self.sign_in_path);
        }
        Ok(self)
    }
}

fn secs_var(name: &str, default: u64) -> Duration {
    Duration::from_secs(
        env::var(name)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default),
    )
}
