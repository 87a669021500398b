//! HTTP client for communicating with the OrgAuth API server.

use anyhow::{Context, Result};
use orgauth_core::api::ApiResponse;
use orgauth_core::error::ErrorResponse;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// HTTP client for the OrgAuth API.
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client pointing at the given base URL.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Return the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Path prefix for one organization.
    pub fn org_path(org: &str, rest: &str) -> String {
        format!("/api/v1/organizations/{}{}", org, rest)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::GET, path, None::<&()>).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    /// POST with no body, expecting an enveloped response.
    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(Method::POST, path, None::<&()>).await
    }

    /// Issue a request whose success answer is `204 No Content`.
    pub async fn send_no_content(&self, method: Method, path: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .request(method.clone(), &url)
            .send()
            .await
            .with_context(|| format!("{} {} failed", method, url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }
        Ok(())
    }

    /// Perform a raw GET request and return the full JSON value (for health endpoint).
    pub async fn get_raw(&self, path: &str) -> Result<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .request(Method::GET, &url)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        resp.json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut builder = self.request(method.clone(), &url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let resp = builder
            .send()
            .await
            .with_context(|| format!("{} {} failed", method, url))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let api_resp: ApiResponse<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse response from {}", url))?;

        api_resp
            .data
            .ok_or_else(|| anyhow::anyhow!("API returned success but no data"))
    }
}

/// Turn an error body into a readable message. Falls back to the raw body
/// when it is not a structured error.
fn api_error(status: StatusCode, body: &str) -> anyhow::Error {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(err) => anyhow::anyhow!(
            "{} ({}, HTTP {})",
            err.error.message,
            err.error.code,
            status.as_u16()
        ),
        Err(_) => anyhow::anyhow!("API error ({}): {}", status, body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orgauth_core::rbac::{AuthorizationResult, DenialReason};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_get_sends_bearer_and_unwraps_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/organizations/acme/authorize"))
            .and(header("authorization", "Bearer t0ken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": { "allowed": false, "reason": "suspended" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri(), Some("t0ken".into())).unwrap();
        let result: AuthorizationResult = client
            .post(
                &ApiClient::org_path("acme", "/authorize"),
                &serde_json::json!({ "permissions": ["post:view"] }),
            )
            .await
            .unwrap();
        assert_eq!(result, AuthorizationResult::Denied(DenialReason::Suspended));
    }

    #[tokio::test]
    async fn test_structured_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/organizations/acme/members"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "success": false,
                "error": {
                    "code": "MISSING_PERMISSION",
                    "numeric_code": 4103,
                    "message": "You do not have permission to perform this action",
                    "timestamp": "2026-01-01T00:00:00Z"
                }
            })))
            .mount(&server)
            .await;

        let client = ApiClient::new(&server.uri(), None).unwrap();
        let err = client
            .get::<serde_json::Value>(&ApiClient::org_path("acme", "/members"))
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("You do not have permission"));
        assert!(err.contains("403"));
    }

    #[tokio::test]
    async fn test_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/organizations/acme/members/bob"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = ApiClient::new(&format!("{}/", server.uri()), Some("t".into())).unwrap();
        client
            .send_no_content(Method::DELETE, &ApiClient::org_path("acme", "/members/bob"))
            .await
            .unwrap();
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let client = ApiClient::new("http://localhost:8080", Some("  ".into())).unwrap();
        assert!(client.token.is_none());
    }
}
