//! HTTP client for the platform resource APIs.
//!
//! Every kind exposes the same REST shape under
//! `{base}/api/v1/projects/{project}/{api_path}`: `POST` to create, `POST /byids`
//! to retrieve, `POST /update`, `POST /delete` and a cursor-paginated `GET`
//! to list.

use async_trait::async_trait;
use reqwest::{header, Client, Method};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, trace, warn};

use super::api::PlatformApi;
use crate::config::PlatformSettings;
use crate::error::{ModkitError, PlatformError, Result};
use crate::resources::{Identifier, ResourceKind};

/// Delay before the first retry; doubled on each further attempt.
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Upper bound on a server-requested rate-limit wait.
const MAX_RATE_LIMIT_WAIT_SECS: u64 = 60;

/// Page size used when listing.
const LIST_PAGE_SIZE: u32 = 1000;

/// Platform API client.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    /// HTTP client.
    client: Client,
    /// Base URL without trailing slash.
    base_url: String,
    /// Project name.
    project: String,
    /// Bearer token.
    token: String,
    /// Maximum retries for transient failures.
    max_retries: u32,
    /// Delay before the first retry.
    retry_base: Duration,
}

/// Item list response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    next_cursor: Option<String>,
}

impl PlatformClient {
    /// Creates a new client from connection settings.
    ///
    /// # Errors
    ///
    /// Returns an error if no token is configured or the HTTP client cannot be
    /// created.
    pub fn new(settings: &PlatformSettings) -> Result<Self> {
        let token = settings.require_token()?.to_string();
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| PlatformError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            project: settings.project.clone(),
            token,
            max_retries: settings.max_retries,
            retry_base: Duration::from_millis(RETRY_BASE_DELAY_MS),
        })
    }

    /// Overrides the delay before the first retry.
    #[must_use]
    pub const fn with_retry_base(mut self, delay: Duration) -> Self {
        self.retry_base = delay;
        self
    }

    fn endpoint(&self, kind: ResourceKind, suffix: &str) -> String {
        format!(
            "{}/api/v1/projects/{}/{}{suffix}",
            self.base_url,
            self.project,
            kind.api_path()
        )
    }

    /// Executes a request, retrying transient failures with exponential backoff.
    async fn execute(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ItemsResponse> {
        let mut attempt = 0;
        loop {
            match self.execute_once(method.clone(), url, query, body).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let backoff = self.retry_base * 2_u32.saturating_pow(attempt);
                    let delay = e
                        .retry_delay_secs()
                        .filter(|secs| *secs > 0)
                        .map_or(backoff, |secs| {
                            Duration::from_secs(secs.min(MAX_RATE_LIMIT_WAIT_SECS))
                        });
                    attempt += 1;
                    warn!(
                        "Transient failure on {url}: {e}; retry {attempt} of {} in {delay:?}",
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Executes a single request.
    async fn execute_once(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<ItemsResponse> {
        trace!("{method} {url}");

        let mut request = self
            .client
            .request(method, url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .query(query);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            ModkitError::Platform(PlatformError::NetworkError {
                message: format!("Request failed: {e}"),
            })
        })?;

        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();

            return Err(ModkitError::Platform(PlatformError::RateLimited {
                retry_after_secs: retry_after,
            }));
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(ModkitError::Platform(PlatformError::AuthenticationFailed {
                message: format!("{status}: {body}"),
            }));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModkitError::Platform(PlatformError::api_error(
                status.as_u16(),
                body,
            )));
        }

        let text = response.text().await.map_err(|e| {
            ModkitError::Platform(PlatformError::InvalidResponse {
                message: format!("Failed to read response: {e}"),
            })
        })?;
        if text.trim().is_empty() {
            return Ok(ItemsResponse {
                items: Vec::new(),
                next_cursor: None,
            });
        }
        serde_json::from_str(&text).map_err(|e| {
            ModkitError::Platform(PlatformError::InvalidResponse {
                message: format!("Failed to parse response: {e}"),
            })
        })
    }
}

fn id_items(ids: &[Identifier]) -> Vec<Value> {
    ids.iter().map(Identifier::to_json).collect()
}

#[async_trait]
impl PlatformApi for PlatformClient {
    async fn retrieve(&self, kind: ResourceKind, ids: &[Identifier]) -> Result<Vec<Value>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Retrieving {} {kind}", ids.len());
        let body = json!({ "items": id_items(ids), "ignoreUnknownIds": true });
        let response = self
            .execute(Method::POST, &self.endpoint(kind, "/byids"), &[], Some(&body))
            .await?;
        Ok(response.items)
    }

    async fn list(&self, kind: ResourceKind) -> Result<Vec<Value>> {
        let url = self.endpoint(kind, "");
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![("limit", LIST_PAGE_SIZE.to_string())];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }
            let page = self.execute(Method::GET, &url, &query, None).await?;
            items.extend(page.items);
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }
        debug!("Listed {} {kind}", items.len());
        Ok(items)
    }

    async fn create(&self, kind: ResourceKind, items: &[Value]) -> Result<Vec<Value>> {
        debug!("Creating {} {kind}", items.len());
        let body = json!({ "items": items });
        let response = self
            .execute(Method::POST, &self.endpoint(kind, ""), &[], Some(&body))
            .await?;
        Ok(response.items)
    }

    async fn update(&self, kind: ResourceKind, items: &[Value]) -> Result<Vec<Value>> {
        debug!("Updating {} {kind}", items.len());
        let body = json!({ "items": items });
        let response = self
            .execute(Method::POST, &self.endpoint(kind, "/update"), &[], Some(&body))
            .await?;
        Ok(response.items)
    }

    async fn delete(&self, kind: ResourceKind, ids: &[Identifier]) -> Result<()> {
        debug!("Deleting {} {kind}", ids.len());
        let body = json!({ "items": id_items(ids) });
        self.execute(Method::POST, &self.endpoint(kind, "/delete"), &[], Some(&body))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> PlatformClient {
        let settings = PlatformSettings {
            base_url: server.uri(),
            project: String::from("acme"),
            token: Some(String::from("secret")),
            timeout: Duration::from_secs(5),
            max_retries: 2,
        };
        PlatformClient::new(&settings)
            .unwrap()
            .with_retry_base(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retrieve_posts_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/projects/acme/datasets/byids"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(json!({
                "items": [{"externalId": "ds_1"}],
                "ignoreUnknownIds": true
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"items": [{"externalId": "ds_1", "id": 7}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let items = client(&server)
            .retrieve(ResourceKind::DataSet, &[Identifier::data_set("ds_1")])
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn test_list_follows_cursor() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/projects/acme/models/spaces"))
            .and(query_param("cursor", "page2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"items": [{"space": "b"}]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/projects/acme/models/spaces"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"items": [{"space": "a"}], "nextCursor": "page2"}),
            ))
            .mount(&server)
            .await;

        let items = client(&server).list(ResourceKind::Space).await.unwrap();
        assert_eq!(items, vec![json!({"space": "a"}), json!({"space": "b"})]);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/projects/acme/timeseries"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/projects/acme/timeseries"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let result = client(&server)
            .create(ResourceKind::TimeSeries, &[json!({"externalId": "ts"})])
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_rejections_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/projects/acme/transformations/delete"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad id"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .delete(
                ResourceKind::Transformation,
                &[Identifier::Transformation {
                    external_id: String::from("t"),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ModkitError::Platform(PlatformError::ApiRequestFailed { status: 400, .. })
        ));
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server)
            .update(ResourceKind::Group, &[json!({"name": "g"})])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ModkitError::Platform(PlatformError::AuthenticationFailed { .. })
        ));
    }

    #[test]
    fn test_client_requires_token() {
        let settings = PlatformSettings {
            base_url: String::from("http://localhost"),
            project: String::from("acme"),
            token: None,
            timeout: Duration::from_secs(1),
            max_retries: 0,
        };
        assert!(PlatformClient::new(&settings).is_err());
    }
}
