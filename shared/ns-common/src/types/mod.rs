//! Wire Types

mod article;
mod publisher;
mod subscription;
mod user;

pub use article::*;
pub use publisher::*;
pub use subscription::*;
pub use user::*;

use serde::{Deserialize, Serialize};

/// Acknowledgement returned by backend write endpoints.
///
/// The backend forwards its document store's write result, so only the
/// counter matching the operation is present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteAck {
    /// Whether the write was acknowledged by the store.
    pub acknowledged: bool,
    /// Id of a newly inserted document.
    pub inserted_id: Option<String>,
    /// Documents matched by an update.
    pub matched_count: Option<u64>,
    /// Documents modified by an update.
    pub modified_count: Option<u64>,
    /// Documents removed by a delete.
    pub deleted_count: Option<u64>,
}

impl WriteAck {
    /// True when the write touched at least one document.
    pub fn changed_anything(&self) -> bool {
        self.inserted_id.is_some()
            || self.modified_count.unwrap_or(0) > 0
            || self.deleted_count.unwrap_or(0) > 0
    }
}

/// Page/limit pair sent as query parameters to paginated endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Zero-based page index.
    pub page: u32,
    /// Items per page.
    pub limit: u32,
}

impl PageRequest {
    /// Build a page request, clamping the limit to `1..=100`.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit: limit.clamp(1, 100),
        }
    }

    /// Number of pages needed to show `total` items.
    ///
    /// A zero limit (only reachable by building the struct directly or by
    /// deserializing it) counts as one item per page.
    pub fn page_count(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.limit.max(1)))
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 0, limit: 10 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_ack_counts() {
        let ack: WriteAck =
            serde_json::from_str(r#"{"acknowledged":true,"modifiedCount":1,"matchedCount":1}"#)
                .unwrap();
        assert!(ack.changed_anything());

        let ack: WriteAck =
            serde_json::from_str(r#"{"acknowledged":true,"deletedCount":0}"#).unwrap();
        assert!(!ack.changed_anything());
    }

    #[test]
    fn test_write_ack_requires_acknowledged() {
        assert!(serde_json::from_str::<WriteAck>(r#"{"deletedCount":1}"#).is_err());
    }

    #[test]
    fn test_page_request_clamps_limit() {
        assert_eq!(PageRequest::new(2, 0).limit, 1);
        assert_eq!(PageRequest::new(2, 500).limit, 100);
    }

    #[test]
    fn test_page_count() {
        let page = PageRequest::new(0, 10);
        assert_eq!(page.page_count(0), 0);
        assert_eq!(page.page_count(10), 1);
        assert_eq!(page.page_count(11), 2);
    }

    #[test]
    fn test_page_count_with_zero_limit() {
        let page: PageRequest = serde_json::from_str(r#"{"page":0,"limit":0}"#).unwrap();
        assert_eq!(page.page_count(3), 3);
        assert_eq!(PageRequest { page: 1, limit: 0 }.page_count(0), 0);
    }
}
