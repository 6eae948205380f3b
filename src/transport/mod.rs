//! Transport abstraction
//!
//! The core consumes one primitive: `fetch(request) -> response with status
//! and body`. [`HttpTransport`] is the reqwest-backed production
//! implementation; [`MemoryTransport`](memory::MemoryTransport) is a scripted
//! in-memory implementation for tests and offline use.
//!
//! Every call is bounded by the configured timeout; a timed-out call surfaces
//! as a network error like any other, so cache slots never stay pending
//! forever.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::types::{ApiError, Result};

pub mod memory;

/// HTTP method subset the protocol uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

/// A transport request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// JSON body plus content-type header
    pub fn with_json<T: serde::Serialize>(self, value: &T) -> Result<Self> {
        let body = serde_json::to_string(value)?;
        Ok(self
            .with_header("content-type", "application/json")
            .with_body(body))
    }
}

/// A transport response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body)
            .map_err(|e| ApiError::Decode(format!("response body: {}", e)))
    }

    /// Map non-success statuses to a transport error
    pub fn ensure_success(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::Transport {
                status: self.status,
                body: self.body,
            })
        }
    }
}

/// The generic fetch primitive every loader and the session manager consume
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Reqwest-backed transport with a per-request timeout
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport whose every request is bounded by `timeout`
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("causeway/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self { client }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!(method = request.method.as_str(), url = %request.url, "transport fetch");

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
            Method::Put => self.client.put(&request.url),
            Method::Delete => self.client.delete(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_success_maps_status_and_body() {
        let err = HttpResponse::new(502, "bad gateway").ensure_success().unwrap_err();
        assert!(err.is_status(502));

        assert!(HttpResponse::new(204, "").ensure_success().is_ok());
    }

    #[test]
    fn test_request_builder() {
        let request = HttpRequest::get("https://h.example/api/v1/host")
            .with_header("authorization", "Bearer t");

        assert_eq!(request.method, Method::Get);
        assert_eq!(request.headers.len(), 1);
        assert!(request.body.is_none());
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let request = HttpRequest::new(Method::Post, "https://h.example/api/v1/messages")
            .with_json(&serde_json::json!({"id": "m1"}))
            .unwrap();

        assert!(request
            .headers
            .iter()
            .any(|(name, value)| name == "content-type" && value == "application/json"));
        assert_eq!(request.body.as_deref(), Some(r#"{"id":"m1"}"#));
    }
}
