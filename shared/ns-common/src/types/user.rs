//! User Types

use serde::{Deserialize, Serialize};

/// The signed-in user's minimal profile, as reported by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Provider-assigned unique id.
    pub uid: String,
    /// Email address (the key the backend knows the user by).
    pub email: String,
    /// Display name.
    pub display_name: Option<String>,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
}

impl Identity {
    /// Name to show in the UI, falling back to the email's local part.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.email.split('@').next().unwrap_or(&self.email))
    }
}

/// User role as stored by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Regular reader/author.
    #[default]
    User,
    /// Platform administrator.
    Admin,
}

/// User record as listed in the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    /// Backend document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Avatar image URL.
    #[serde(default)]
    pub photo: Option<String>,
    /// Role; absent means a regular user.
    #[serde(default)]
    pub role: UserRole,
}

impl UserRecord {
    /// Whether this user holds the administrator role.
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Page of users from `GET /users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPage {
    /// Users on this page.
    pub users: Vec<UserRecord>,
    /// Total users across all pages.
    pub total_users: u64,
}

/// Answer of the role probe `GET /users/admin/{email}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdminCheck {
    /// Whether the user is an administrator.
    pub admin: bool,
}

/// Request body of `POST /jwt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRequest {
    /// Email of the established identity.
    pub email: String,
}

/// Response body of `POST /jwt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Backend-issued bearer credential.
    pub token: String,
}
