//! Session Endpoints
//!
//! Token exchange, role probe and subscription status.

use ns_common::{AdminCheck, SubscriptionStatus, TokenRequest, TokenResponse};
use reqwest::Method;

use super::{build_query, segment, with_query, ApiClient, ApiResult, NO_BODY};

impl ApiClient {
    /// Exchange an established identity's email for a backend bearer token.
    ///
    /// `POST /jwt`
    pub async fn exchange_token(&self, email: &str) -> ApiResult<String> {
        let response: TokenResponse = self
            .public(
                Method::POST,
                "/jwt",
                Some(&TokenRequest {
                    email: email.to_string(),
                }),
            )
            .await?;
        Ok(response.token)
    }

    /// Ask whether `email` holds the administrator role.
    ///
    /// `GET /users/admin/{email}`
    pub async fn check_admin(&self, email: &str) -> ApiResult<bool> {
        let check: AdminCheck = self
            .authed(
                Method::GET,
                &format!("/users/admin/{}", segment(email)),
                NO_BODY,
            )
            .await?;
        Ok(check.admin)
    }

    /// Fetch the subscription status of `email`.
    ///
    /// `GET /user-status`
    pub async fn user_status(&self, email: &str) -> ApiResult<SubscriptionStatus> {
        let query = build_query(&[("email", Some(email.to_string()))]);
        self.authed(Method::GET, &with_query("/user-status", &query), NO_BODY)
            .await
    }
}
