use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

use crate::config::{ContentfulConfig, Credentials};
use crate::contentful::api_types::{GraphQlEnvelope, GraphQlRequest};
use crate::contentful::error::ContentfulError;

/// Contentful GraphQL fetch adapter.
///
/// Sends one POST per call and maps failures onto [`ContentfulError`].
/// There is no caching at this layer.
#[derive(Clone)]
pub struct ContentfulClient {
  http: reqwest::Client,
  url: Url,
  credentials: Arc<Credentials>,
}

impl ContentfulClient {
  pub fn new(config: &ContentfulConfig, credentials: Credentials) -> Result<Self> {
    let url = endpoint_url(&config.endpoint, &credentials.space_id, &config.environment)?;

    let http = reqwest::Client::builder()
      .timeout(config.timeout())
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      url,
      credentials: Arc::new(credentials),
    })
  }

  pub fn space_id(&self) -> &str {
    &self.credentials.space_id
  }

  fn token(&self, preview: bool) -> Result<&str, ContentfulError> {
    let (token, name) = if preview {
      (
        self.credentials.preview_access_token.as_deref(),
        "preview access token",
      )
    } else {
      (self.credentials.access_token.as_deref(), "access token")
    };

    token
      .filter(|t| !t.is_empty())
      .ok_or(ContentfulError::MissingCredentials(name))
  }

  /// Run a GraphQL query and return its `data` member.
  ///
  /// A response without `data` yields `Value::Null`; callers decide whether
  /// that is malformed.
  pub async fn fetch_graphql(
    &self,
    query: &str,
    variables: &Value,
    preview: bool,
  ) -> Result<Value, ContentfulError> {
    let token = self.token(preview)?;

    tracing::debug!(preview, url = %self.url, "POST graphql");

    let response = self
      .http
      .post(self.url.clone())
      .bearer_auth(token)
      .json(&GraphQlRequest { query, variables })
      .send()
      .await
      .map_err(ContentfulError::fetch)?;

    let status = response.status();
    if !status.is_success() {
      tracing::warn!(status = status.as_u16(), "Contentful returned non-success status");
      return Err(ContentfulError::Network {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
      });
    }

    let envelope: GraphQlEnvelope = response.json().await.map_err(ContentfulError::fetch)?;

    if let Some(errors) = envelope.errors.filter(|e| !e.is_empty()) {
      tracing::warn!(count = errors.len(), "GraphQL errors in response");
      return Err(ContentfulError::GraphQl { errors });
    }

    Ok(envelope.data.unwrap_or(Value::Null))
  }
}

fn endpoint_url(endpoint: &str, space_id: &str, environment: &str) -> Result<Url> {
  let raw = format!(
    "{}/content/v1/spaces/{}/environments/{}",
    endpoint.trim_end_matches('/'),
    space_id,
    environment
  );
  Url::parse(&raw).map_err(|e| eyre!("Invalid Contentful endpoint {}: {}", raw, e))
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use httpmock::prelude::*;
  use serde_json::json;

  pub(crate) fn test_client(base_url: &str) -> ContentfulClient {
    let config = ContentfulConfig {
      space_id: None,
      environment: "master".to_string(),
      endpoint: base_url.to_string(),
      timeout_secs: 5,
    };
    let credentials = Credentials {
      space_id: "space1".to_string(),
      access_token: Some("public-token".to_string()),
      preview_access_token: Some("preview-token".to_string()),
    };
    ContentfulClient::new(&config, credentials).unwrap()
  }

  pub(crate) const GRAPHQL_PATH: &str = "/content/v1/spaces/space1/environments/master";

  #[test]
  fn test_endpoint_url() {
    let url = endpoint_url("https://graphql.contentful.com/", "abc", "master").unwrap();
    assert_eq!(
      url.as_str(),
      "https://graphql.contentful.com/content/v1/spaces/abc/environments/master"
    );
  }

  #[tokio::test]
  async fn test_uses_public_token_and_returns_data() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
      when
        .method(POST)
        .path(GRAPHQL_PATH)
        .header("authorization", "Bearer public-token")
        .header("content-type", "application/json");
      then
        .status(200)
        .json_body(json!({ "data": { "ok": true } }));
    });

    let client = test_client(&server.base_url());
    let data = client
      .fetch_graphql("{ ok }", &json!({}), false)
      .await
      .unwrap();

    assert_eq!(data, json!({ "ok": true }));
    mock.assert();
  }

  #[tokio::test]
  async fn test_uses_preview_token() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
      when
        .method(POST)
        .path(GRAPHQL_PATH)
        .header("authorization", "Bearer preview-token");
      then.status(200).json_body(json!({ "data": {} }));
    });

    let client = test_client(&server.base_url());
    client
      .fetch_graphql("{ ok }", &json!({}), true)
      .await
      .unwrap();
    mock.assert();
  }

  #[tokio::test]
  async fn test_missing_preview_token() {
    let mut client = test_client("http://127.0.0.1:9");
    client.credentials = Arc::new(Credentials {
      space_id: "space1".to_string(),
      access_token: Some("public-token".to_string()),
      preview_access_token: None,
    });

    let err = client
      .fetch_graphql("{ ok }", &json!({}), true)
      .await
      .unwrap_err();
    assert!(matches!(err, ContentfulError::MissingCredentials(_)));
  }

  #[tokio::test]
  async fn test_non_success_status_is_network_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
      when.method(POST).path(GRAPHQL_PATH);
      then.status(503).body("down");
    });

    let client = test_client(&server.base_url());
    let err = client
      .fetch_graphql("{ ok }", &json!({}), false)
      .await
      .unwrap_err();

    match &err {
      ContentfulError::Network { status, .. } => assert_eq!(*status, 503),
      other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("Service Unavailable"));
  }

  #[tokio::test]
  async fn test_graphql_errors_with_200() {
    let server = MockServer::start();
    server.mock(|when, then| {
      when.method(POST).path(GRAPHQL_PATH);
      then.status(200).json_body(json!({
        "data": { "partial": true },
        "errors": [{ "message": "Invalid field" }]
      }));
    });

    let client = test_client(&server.base_url());
    let err = client
      .fetch_graphql("{ ok }", &json!({}), false)
      .await
      .unwrap_err();

    assert!(matches!(err, ContentfulError::GraphQl { .. }));
    assert!(err.to_string().contains("Invalid field"));
  }

  #[tokio::test]
  async fn test_undecodable_body_is_fetch_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
      when.method(POST).path(GRAPHQL_PATH);
      then.status(200).body("<html>not json</html>");
    });

    let client = test_client(&server.base_url());
    let err = client
      .fetch_graphql("{ ok }", &json!({}), false)
      .await
      .unwrap_err();

    assert!(matches!(err, ContentfulError::Fetch { .. }));
    assert!(err
      .to_string()
      .starts_with("Failed to fetch data from Contentful"));
  }

  #[tokio::test]
  async fn test_connection_failure_is_fetch_error() {
    // Nothing listens on the discard port
    let client = test_client("http://127.0.0.1:9");
    let err = client
      .fetch_graphql("{ ok }", &json!({}), false)
      .await
      .unwrap_err();
    assert!(matches!(err, ContentfulError::Fetch { .. }));
  }
}
