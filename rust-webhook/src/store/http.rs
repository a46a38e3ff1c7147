//! HTTP data-API message store.
//!
//! Talks to a MongoDB Atlas Data API compatible endpoint:
//!
//! ```text
//! POST {base}/action/updateOne
//! api-key: <key>
//!
//! {"dataSource": "...", "database": "...", "collection": "...",
//!  "filter": {"message_id": "<id>"}, "update": {"$set": {"status": "<status>"}}}
//!
//! → {"matchedCount": 1, "modifiedCount": 1}
//! ```
//!
//! `updateOne` without `upsert` never creates a record, so unknown message
//! IDs come back with `matchedCount: 0`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, info};
use url::Url;

use super::{MessageStore, StoreError, StoreResult};
use crate::config::StoreConfig;
use crate::webhook::MessageStatus;

/// Document field holding the provider-assigned message ID.
pub const MESSAGE_ID_FIELD: &str = "message_id";

/// Document field holding the delivery status.
pub const STATUS_FIELD: &str = "status";

/// Message store backed by a data-API endpoint.
///
/// Cheap to clone; clones share one connection pool.
#[derive(Clone)]
pub struct HttpMessageStore {
    inner: Arc<HttpStoreInner>,
}

struct HttpStoreInner {
    client: Client,
    update_url: Url,
    api_key: Option<String>,
    data_source: String,
    database: String,
    collection: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateOneRequest<'a> {
    data_source: &'a str,
    database: &'a str,
    collection: &'a str,
    filter: serde_json::Value,
    update: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateOneResponse {
    matched_count: u64,
    #[serde(default)]
    modified_count: u64,
}

impl HttpMessageStore {
    /// Build a store from configuration. Requires `config.url`.
    pub fn new(config: &StoreConfig) -> StoreResult<Self> {
        let base = config
            .url
            .as_deref()
            .ok_or_else(|| StoreError::Endpoint("MESSAGE_STORE_URL is not set".to_string()))?;

        let update_url = action_url(base, "updateOne")?;

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        info!(
            endpoint = %update_url,
            api_key_set = config.api_key.is_some(),
            database = %config.database,
            collection = %config.collection,
            timeout_ms = config.timeout_ms,
            "message_store_created"
        );

        Ok(Self {
            inner: Arc::new(HttpStoreInner {
                client,
                update_url,
                api_key: config.api_key.clone(),
                data_source: config.data_source.clone(),
                database: config.database.clone(),
                collection: config.collection.clone(),
            }),
        })
    }
}

#[async_trait]
impl MessageStore for HttpMessageStore {
    async fn update_status_by_id(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> StoreResult<u64> {
        let inner = &self.inner;

        let body = UpdateOneRequest {
            data_source: &inner.data_source,
            database: &inner.database,
            collection: &inner.collection,
            filter: json!({ MESSAGE_ID_FIELD: message_id }),
            update: json!({ "$set": { STATUS_FIELD: status.as_str() } }),
        };

        let mut request = inner.client.post(inner.update_url.clone()).json(&body);
        if let Some(key) = &inner.api_key {
            request = request.header("api-key", key);
        }

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                if e.is_timeout() {
                    error!(message_id = %message_id, error = %e, "message_store_timeout");
                } else {
                    error!(message_id = %message_id, error = %e, "message_store_request_error");
                }
                return Err(StoreError::Request(e));
            }
        };

        let status_code = resp.status();
        let text = resp.text().await?;

        if !status_code.is_success() {
            error!(
                message_id = %message_id,
                status_code = status_code.as_u16(),
                body = %text,
                "message_store_http_error"
            );
            return Err(StoreError::Status {
                status: status_code.as_u16(),
                body: text,
            });
        }

        let parsed: UpdateOneResponse =
            serde_json::from_str(&text).map_err(|e| StoreError::Decode(e.to_string()))?;

        debug!(
            message_id = %message_id,
            matched_count = parsed.matched_count,
            modified_count = parsed.modified_count,
            "message_store_update_complete"
        );

        Ok(parsed.matched_count)
    }

    async fn close(&self) {
        info!("message_store_closed");
    }
}

/// Append `/action/{action}` to the data-API base URL.
fn action_url(base: &str, action: &str) -> StoreResult<Url> {
    let mut url = Url::parse(base).map_err(|e| StoreError::Endpoint(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|_| StoreError::Endpoint(format!("{} cannot be used as a base URL", base)))?
        .pop_if_empty()
        .extend(["action", action]);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BASE_PATH: &str = "/app/data-abc/endpoint/data/v1";
    const UPDATE_PATH: &str = "/app/data-abc/endpoint/data/v1/action/updateOne";

    fn store_for(server: &MockServer) -> HttpMessageStore {
        let config = StoreConfig {
            url: Some(format!("{}{}", server.uri(), BASE_PATH)),
            api_key: Some("test-key".to_string()),
            ..StoreConfig::default()
        };
        HttpMessageStore::new(&config).unwrap()
    }

    #[test]
    fn test_action_url() {
        let url = action_url("https://data.example.com/endpoint/data/v1", "updateOne").unwrap();
        assert_eq!(
            url.as_str(),
            "https://data.example.com/endpoint/data/v1/action/updateOne"
        );

        let url = action_url("https://data.example.com/endpoint/data/v1/", "updateOne").unwrap();
        assert_eq!(
            url.as_str(),
            "https://data.example.com/endpoint/data/v1/action/updateOne"
        );
    }

    #[test]
    fn test_action_url_invalid() {
        assert!(matches!(
            action_url("not a url", "updateOne"),
            Err(StoreError::Endpoint(_))
        ));
        assert!(matches!(
            action_url("mailto:ops@example.com", "updateOne"),
            Err(StoreError::Endpoint(_))
        ));
    }

    #[test]
    fn test_new_requires_url() {
        let result = HttpMessageStore::new(&StoreConfig::default());
        assert!(matches!(result, Err(StoreError::Endpoint(_))));
    }

    #[tokio::test]
    async fn test_update_matched() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(UPDATE_PATH))
            .and(header("api-key", "test-key"))
            .and(body_partial_json(json!({
                "dataSource": "Cluster0",
                "database": "whatsapp",
                "collection": "messages",
                "filter": {"message_id": "wamid.1"},
                "update": {"$set": {"status": "delivered"}}
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"matchedCount": 1, "modifiedCount": 1})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let matched = store_for(&server)
            .update_status_by_id("wamid.1", MessageStatus::Delivered)
            .await
            .unwrap();

        assert_eq!(matched, 1);
    }

    #[tokio::test]
    async fn test_update_unmatched() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(UPDATE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"matchedCount": 0, "modifiedCount": 0})),
            )
            .mount(&server)
            .await;

        let matched = store_for(&server)
            .update_status_by_id("wamid.unknown", MessageStatus::Read)
            .await
            .unwrap();

        assert_eq!(matched, 0);
    }

    #[tokio::test]
    async fn test_update_http_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(UPDATE_PATH))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let result = store_for(&server)
            .update_status_by_id("wamid.1", MessageStatus::Sent)
            .await;

        match result {
            Err(err @ StoreError::Status { .. }) => {
                assert_eq!(err.to_string(), "store returned HTTP 401");
                if let StoreError::Status { status, body } = err {
                    assert_eq!(status, 401);
                    assert_eq!(body, "invalid api key");
                }
            }
            other => panic!("Expected Status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_undecodable_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path(UPDATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let result = store_for(&server)
            .update_status_by_id("wamid.1", MessageStatus::Sent)
            .await;

        assert!(matches!(result, Err(StoreError::Decode(_))));
    }

    #[tokio::test]
    async fn test_update_unreachable() {
        let config = StoreConfig {
            url: Some("http://127.0.0.1:1/endpoint".to_string()),
            timeout_ms: 500,
            ..StoreConfig::default()
        };
        let store = HttpMessageStore::new(&config).unwrap();

        let result = store
            .update_status_by_id("wamid.1", MessageStatus::Sent)
            .await;

        assert!(matches!(result, Err(StoreError::Request(_))));
    }
}
