//! Publisher Directory Endpoints

use ns_common::{NewPublisher, Publisher, WriteAck};
use reqwest::Method;

use super::{ApiClient, ApiResult, NO_BODY};

impl ApiClient {
    /// List publishers.
    ///
    /// `GET /publishers`
    pub async fn list_publishers(&self) -> ApiResult<Vec<Publisher>> {
        self.authed(Method::GET, "/publishers", NO_BODY).await
    }

    /// Add a publisher.
    ///
    /// `POST /publishers`
    pub async fn add_publisher(&self, publisher: NewPublisher) -> ApiResult<WriteAck> {
        let publisher = publisher.validated()?;
        self.authed(Method::POST, "/publishers", Some(&publisher))
            .await
    }
}
