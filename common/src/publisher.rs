// Publisher boundary: the external content-creation sink.
//
// The engine only ever talks to the trait; the production adapter is a JSON
// client against the sink's HTTP API.

use crate::config::PublisherConfig;
use crate::errors::PublishError;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, instrument};

/// Identifier assigned by the sink to created content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentId(pub String);

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content handed to the sink for creation
#[derive(Debug, Clone, Serialize)]
pub struct NewContent {
    pub title: String,
    pub content: String,
    pub status: String,
    pub author: String,
    pub categories: Vec<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Create one piece of content, returning the sink's identifier
    async fn create(&self, content: &NewContent) -> Result<ContentId, PublishError>;

    async fn set_tags(&self, content_id: &ContentId, tags: &[String]) -> Result<(), PublishError>;

    async fn set_thumbnail(
        &self,
        content_id: &ContentId,
        media_ref: &str,
    ) -> Result<(), PublishError>;
}

/// HTTP adapter for the Publisher boundary
pub struct HttpPublisher {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpPublisher {
    pub fn new(config: &PublisherConfig) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PublishError::Request(e.to_string()))?;

        let auth_token = config
            .auth_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    fn request(&self, url: String, body: &impl Serialize) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(url).json(body);
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn send(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, PublishError> {
        let response = builder
            .send()
            .await
            .map_err(|e| PublishError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    #[instrument(skip(self, content), fields(title = %content.title))]
    async fn create(&self, content: &NewContent) -> Result<ContentId, PublishError> {
        let url = format!("{}/posts", self.base_url);
        let response = self.send(self.request(url, content)).await?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PublishError::InvalidResponse(e.to_string()))?;

        let id = match &body["id"] {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) => s.clone(),
            _ => {
                return Err(PublishError::InvalidResponse(
                    "response carries no content id".to_string(),
                ))
            }
        };

        info!(content_id = %id, "Content created");
        Ok(ContentId(id))
    }

    #[instrument(skip(self, tags))]
    async fn set_tags(&self, content_id: &ContentId, tags: &[String]) -> Result<(), PublishError> {
        let url = format!("{}/posts/{}/tags", self.base_url, content_id);
        self.send(self.request(url, &serde_json::json!({ "tags": tags })))
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn set_thumbnail(
        &self,
        content_id: &ContentId,
        media_ref: &str,
    ) -> Result<(), PublishError> {
        let url = format!("{}/posts/{}/thumbnail", self.base_url, content_id);
        self.send(self.request(url, &serde_json::json!({ "media": media_ref })))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json_string, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> PublisherConfig {
        PublisherConfig {
            base_url,
            auth_token: None,
            default_author: "dripfeed".to_string(),
            publish_status: "publish".to_string(),
        }
    }

    fn content() -> NewContent {
        NewContent {
            title: "Hello".to_string(),
            content: "Body".to_string(),
            status: "publish".to_string(),
            author: "dripfeed".to_string(),
            categories: vec!["news".to_string()],
        }
    }

    #[tokio::test]
    async fn test_create_returns_content_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({"id": 42})))
            .mount(&server)
            .await;

        let publisher = HttpPublisher::new(&config(server.uri())).unwrap();
        let id = publisher.create(&content()).await.unwrap();
        assert_eq!(id, ContentId("42".to_string()));
    }

    #[tokio::test]
    async fn test_create_maps_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts"))
            .respond_with(ResponseTemplate::new(422).set_body_string("title required"))
            .mount(&server)
            .await;

        let publisher = HttpPublisher::new(&config(server.uri())).unwrap();
        match publisher.create(&content()).await {
            Err(PublishError::Rejected { status, body }) => {
                assert_eq!(status, 422);
                assert_eq!(body, "title required");
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_set_tags_posts_to_content_path() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/posts/42/tags"))
            .and(body_json_string(r#"{"tags":["a","b"]}"#))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let publisher = HttpPublisher::new(&config(server.uri())).unwrap();
        publisher
            .set_tags(
                &ContentId("42".to_string()),
                &["a".to_string(), "b".to_string()],
            )
            .await
            .unwrap();
    }
}
