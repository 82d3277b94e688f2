//! User Management Endpoints (admin dashboard)

use ns_common::{PageRequest, UserPage, WriteAck};
use reqwest::Method;

use super::{build_query, segment, with_query, ApiClient, ApiResult, NO_BODY};

impl ApiClient {
    /// List users, one page at a time.
    ///
    /// `GET /users?page&limit`
    pub async fn list_users(&self, page: PageRequest) -> ApiResult<UserPage> {
        let query = build_query(&[
            ("page", Some(page.page.to_string())),
            ("limit", Some(page.limit.to_string())),
        ]);
        self.authed(Method::GET, &with_query("/users", &query), NO_BODY)
            .await
    }

    /// Grant the administrator role.
    ///
    /// `PATCH /users/admin/{id}`
    pub async fn make_admin(&self, user_id: &str) -> ApiResult<WriteAck> {
        self.authed(
            Method::PATCH,
            &format!("/users/admin/{}", segment(user_id)),
            NO_BODY,
        )
        .await
    }

    /// Delete a user.
    ///
    /// `DELETE /users/{id}`
    pub async fn delete_user(&self, user_id: &str) -> ApiResult<WriteAck> {
        self.authed(
            Method::DELETE,
            &format!("/users/{}", segment(user_id)),
            NO_BODY,
        )
        .await
    }
}
