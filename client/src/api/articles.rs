//! Article Endpoints
//!
//! Public feed, author submissions and the moderation lifecycle.

use ns_common::{
    Article, ArticleFilter, ArticlePage, ArticleUpdate, DeclineRequest, NewArticle, PageRequest,
    WriteAck,
};
use reqwest::Method;

use super::{build_query, segment, with_query, ApiClient, ApiError, ApiResult, NO_BODY};

impl ApiClient {
    // ------------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------------

    /// Approved articles matching `filter`.
    ///
    /// `GET /news`
    pub async fn list_news(&self, filter: &ArticleFilter) -> ApiResult<Vec<Article>> {
        let params: Vec<(&str, Option<String>)> = filter
            .query_pairs()
            .into_iter()
            .map(|(k, v)| (k, Some(v)))
            .collect();
        self.public(Method::GET, &with_query("/news", &build_query(&params)), NO_BODY)
            .await
    }

    /// One article by id.
    ///
    /// `GET /newsId/{id}`
    pub async fn article(&self, id: &str) -> ApiResult<Article> {
        self.public(Method::GET, &format!("/newsId/{}", segment(id)), NO_BODY)
            .await
    }

    /// Every article regardless of status (admin).
    ///
    /// `GET /articles?page&limit`
    pub async fn list_articles(&self, page: PageRequest) -> ApiResult<ArticlePage> {
        let query = build_query(&[
            ("page", Some(page.page.to_string())),
            ("limit", Some(page.limit.to_string())),
        ]);
        self.authed(Method::GET, &with_query("/articles", &query), NO_BODY)
            .await
    }

    /// Articles awaiting moderation.
    ///
    /// `GET /pending-articles`
    pub async fn pending_articles(&self) -> ApiResult<Vec<Article>> {
        self.authed(Method::GET, "/pending-articles", NO_BODY).await
    }

    /// Approved premium articles.
    ///
    /// `GET /premium-articles`
    pub async fn premium_articles(&self) -> ApiResult<Vec<Article>> {
        self.authed(Method::GET, "/premium-articles", NO_BODY).await
    }

    /// Articles submitted by `email`.
    ///
    /// `GET /my-articles`
    pub async fn my_articles(&self, email: &str) -> ApiResult<Vec<Article>> {
        let query = build_query(&[("email", Some(email.to_string()))]);
        self.authed(Method::GET, &with_query("/my-articles", &query), NO_BODY)
            .await
    }

    /// Count one view of an article.
    ///
    /// `POST /update-view/{id}`
    pub async fn record_view(&self, id: &str) -> ApiResult<WriteAck> {
        self.public(Method::POST, &format!("/update-view/{}", segment(id)), NO_BODY)
            .await
    }

    // ------------------------------------------------------------------------
    // Authoring
    // ------------------------------------------------------------------------

    /// Submit a new article for moderation.
    ///
    /// `POST /articles`
    pub async fn submit_article(&self, article: NewArticle) -> ApiResult<WriteAck> {
        let article = article.validated()?;
        self.authed(Method::POST, "/articles", Some(&article)).await
    }

    /// Edit an article.
    ///
    /// `PATCH /articles/{id}`
    pub async fn update_article(&self, id: &str, update: &ArticleUpdate) -> ApiResult<WriteAck> {
        self.authed(
            Method::PATCH,
            &format!("/articles/{}", segment(id)),
            Some(update),
        )
        .await
    }

    /// Delete an article. The backend refuses once the article is approved;
    /// that refusal comes back as [`ApiError::Rejected`].
    ///
    /// `DELETE /articles/{id}`
    pub async fn delete_article(&self, id: &str) -> ApiResult<WriteAck> {
        self.authed(
            Method::DELETE,
            &format!("/articles/{}", segment(id)),
            NO_BODY,
        )
        .await
    }

    // ------------------------------------------------------------------------
    // Moderation
    // ------------------------------------------------------------------------

    /// Publish a pending article.
    ///
    /// `PUT /approve-article/{id}`
    pub async fn approve_article(&self, id: &str) -> ApiResult<WriteAck> {
        self.authed(
            Method::PUT,
            &format!("/approve-article/{}", segment(id)),
            NO_BODY,
        )
        .await
    }

    /// Decline a pending article with a reason for the author.
    ///
    /// `PATCH /articles/decline/{id}`
    pub async fn decline_article(&self, id: &str, reason: &str) -> ApiResult<WriteAck> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ApiError::Invalid(ns_common::Error::Validation(
                "a decline reason is required".into(),
            )));
        }
        self.authed(
            Method::PATCH,
            &format!("/articles/decline/{}", segment(id)),
            Some(&DeclineRequest {
                reason: reason.to_string(),
            }),
        )
        .await
    }

    /// Reserve an article for subscribers.
    ///
    /// `PATCH /articles/premium/{id}`
    pub async fn make_premium(&self, id: &str) -> ApiResult<WriteAck> {
        self.authed(
            Method::PATCH,
            &format!("/articles/premium/{}", segment(id)),
            NO_BODY,
        )
        .await
    }
}
