//! Article Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Moderation state of an article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    /// Submitted, awaiting review.
    #[default]
    Pending,
    /// Published.
    Approved,
    /// Rejected by an administrator.
    Declined,
}

/// Article as returned by the article endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Backend document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Headline.
    pub title: String,
    /// Cover image URL.
    pub image: String,
    /// Publisher name.
    pub publisher: String,
    /// Topic tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Body text.
    pub description: String,
    /// Moderation state.
    pub status: ArticleStatus,
    /// Whether the article is reserved for subscribers.
    #[serde(default)]
    pub is_premium: bool,
    /// View counter.
    #[serde(default)]
    pub views: u64,
    /// Author display name.
    pub author_name: String,
    /// Author email.
    pub author_email: String,
    /// Author avatar URL.
    #[serde(default)]
    pub author_photo: Option<String>,
    /// Submission time.
    pub posted_date: DateTime<Utc>,
    /// Reason given when the article was declined.
    #[serde(default)]
    pub decline_reason: Option<String>,
}

impl Article {
    /// Whether the author may still delete the article.
    ///
    /// The backend refuses deletion once an article is approved.
    pub fn is_deletable(&self) -> bool {
        self.status != ArticleStatus::Approved
    }
}

/// Body of `POST /articles`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewArticle {
    pub title: String,
    pub image: String,
    pub publisher: String,
    pub tags: Vec<String>,
    pub description: String,
    pub author_name: String,
    pub author_email: String,
    pub author_photo: Option<String>,
}

impl NewArticle {
    /// Trim fields, drop empty/duplicate tags and reject blanks.
    pub fn validated(mut self) -> crate::Result<Self> {
        self.title = self.title.trim().to_string();
        self.description = self.description.trim().to_string();
        self.publisher = self.publisher.trim().to_string();

        for (field, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("publisher", &self.publisher),
            ("image", &self.image),
            ("author email", &self.author_email),
        ] {
            if value.trim().is_empty() {
                return Err(crate::Error::Validation(format!("{field} is required")));
            }
        }

        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags.drain(..) {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        self.tags = tags;
        Ok(self)
    }
}

/// Body of `PATCH /articles/{id}`. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Body of `PATCH /articles/decline/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeclineRequest {
    /// Reason shown to the author.
    pub reason: String,
}

/// Page of articles from `GET /articles`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePage {
    /// Articles on this page.
    pub articles: Vec<Article>,
    /// Total articles across all pages.
    pub total_articles: u64,
}

/// Search filters for the public feed `GET /news`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    /// Free-text title search.
    pub search: Option<String>,
    /// Exact publisher name.
    pub publisher: Option<String>,
    /// Any of these tags.
    pub tags: Vec<String>,
}

impl ArticleFilter {
    /// Query pairs for the non-empty filters, in a stable order.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(publisher) = self
            .publisher
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            pairs.push(("publisher", publisher.to_string()));
        }
        if !self.tags.is_empty() {
            pairs.push(("tags", self.tags.join(",")));
        }
        pairs
    }
}
