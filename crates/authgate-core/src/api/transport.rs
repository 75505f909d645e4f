//! HTTP transport for backend calls.
//!
//! The coordination logic only needs "send this request, give me the status
//! and body". `Transport` is that seam; `ReqwestTransport` is the real client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::AuthError;
use crate::config::AuthConfig;

/// Everything needed to issue (and later re-issue) one HTTP call.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSpec {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

impl RequestSpec {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }

    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
        }
    }
}

/// Status and body of a completed HTTP call.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == StatusCode::UNAUTHORIZED
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AuthError> {
        serde_json::from_str(&self.body)
            .map_err(|e| AuthError::InvalidResponse(format!("{} (status {})", e, self.status)))
    }

    /// Turn a non-success status into an error, keeping the body for `err` codes
    pub fn error_for_status(self) -> Result<Self, AuthError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(AuthError::from_status(self.status, &self.body))
        }
    }
}

/// Performs one HTTP call. Any status (including 401) is a successful send;
/// only a call that produced no response is an `Err`.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, AuthError>;
}

/// Transport backed by `reqwest`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Resolve a request path against the base URL. Absolute URLs pass through.
    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestSpec) -> Result<HttpResponse, AuthError> {
        let url = self.url_for(&request.path);
        debug!(method = %request.method, url = %url, "Sending request");

        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .header(header::ACCEPT, "application/json");
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(url = %url, status = %status, "Response received");

        Ok(HttpResponse { status, body })
    }
}
