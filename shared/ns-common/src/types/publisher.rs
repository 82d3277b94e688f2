//! Publisher Types

use serde::{Deserialize, Serialize};

/// Publisher entry from `GET /publishers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Publisher {
    /// Backend document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Publisher name.
    pub name: String,
    /// Logo image URL.
    pub logo: String,
}

/// Body of `POST /publishers`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPublisher {
    /// Publisher name.
    pub name: String,
    /// Logo image URL.
    pub logo: String,
}

impl NewPublisher {
    /// Trim fields and reject blanks.
    pub fn validated(self) -> crate::Result<Self> {
        let name = self.name.trim().to_string();
        let logo = self.logo.trim().to_string();
        if name.is_empty() {
            return Err(crate::Error::Validation("publisher name is required".into()));
        }
        if logo.is_empty() {
            return Err(crate::Error::Validation("publisher logo is required".into()));
        }
        Ok(Self { name, logo })
    }
}
