//! In-memory scripted transport
//!
//! Maps `(method, url)` to a queue of canned responses and records every
//! request it serves. Used by this crate's own tests and exported so
//! downstream applications can exercise the client offline.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::types::Result;

use super::{HttpRequest, HttpResponse, Method, Transport};

/// Scripted transport for tests
#[derive(Default)]
pub struct MemoryTransport {
    routes: DashMap<String, VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
    latency: Option<Duration>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Artificial delay before every response; lets tests pile up concurrent
    /// callers behind one in-flight request.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn key(method: Method, url: &str) -> String {
        format!("{} {}", method.as_str(), url)
    }

    /// Script a sticky response: served for every matching request.
    /// Replaces any previously scripted responses for the route.
    pub fn stub(&self, method: Method, url: &str, response: HttpResponse) {
        self.routes
            .insert(Self::key(method, url), VecDeque::from([response]));
    }

    /// Script a JSON response
    pub fn stub_json(&self, method: Method, url: &str, status: u16, body: serde_json::Value) {
        self.stub(method, url, HttpResponse::new(status, body.to_string()));
    }

    /// Script a sequence of responses; the last one is sticky
    pub fn stub_sequence(&self, method: Method, url: &str, responses: Vec<HttpResponse>) {
        self.routes
            .insert(Self::key(method, url), VecDeque::from(responses));
    }

    /// All requests served so far
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Total number of requests served
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of requests served for one route
    pub fn count_for(&self, method: Method, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let key = Self::key(request.method, &request.url);
        self.requests.lock().unwrap().push(request);

        let response = match self.routes.get_mut(&key) {
            Some(mut queue) => {
                if queue.len() > 1 {
                    queue.pop_front().unwrap()
                } else {
                    queue.front().cloned().unwrap_or_else(|| HttpResponse::new(404, "{}"))
                }
            }
            None => HttpResponse::new(404, "{}"),
        };

        Ok(response)
    }
}
