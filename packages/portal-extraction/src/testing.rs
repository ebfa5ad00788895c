//! Mock implementations for testing.
//!
//! `MockTransport` plays the portal: canned responses are keyed by URL path,
//! with optional per-path sequences for endpoints whose answer changes
//! between calls (report materialization, pagination). Every executed
//! request is recorded for verification.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};

use crate::error::PortalResult;
use crate::session::transport::{Method, PortalRequest, PortalResponse, PortalTransport};

/// A recorded portal exchange.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub form: Option<Vec<(String, String)>>,
}

/// Scripted portal transport.
///
/// Responses queue per path: a path with several queued responses pops them
/// in order and then sticks on the last one; a path with a single response
/// repeats it. Unknown paths answer 404.
#[derive(Default)]
pub struct MockTransport {
    responses: RwLock<HashMap<String, VecDeque<PortalResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Mutex<std::time::Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate network latency per exchange (deadline tests).
    pub fn with_latency(self, latency: std::time::Duration) -> Self {
        *self.latency.lock().unwrap() = latency;
        self
    }

    /// Queue a response for a path (builder form).
    pub fn with_response(self, path: &str, response: PortalResponse) -> Self {
        self.add_response(path, response);
        self
    }

    /// Queue a plain 200 text response for a path.
    pub fn with_page(self, path: &str, body: &str) -> Self {
        self.with_response(path, PortalResponse::new(200, body))
    }

    /// Queue a 200 JSON response for a path.
    pub fn with_json(self, path: &str, json: serde_json::Value) -> Self {
        self.with_response(path, PortalResponse::new(200, json.to_string()))
    }

    /// Queue several responses for one path, served in order.
    pub fn with_sequence(self, path: &str, responses: Vec<PortalResponse>) -> Self {
        for response in responses {
            self.add_response(path, response);
        }
        self
    }

    /// Queue a response after construction.
    pub fn add_response(&self, path: &str, response: PortalResponse) {
        self.responses
            .write()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    /// Every executed request, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// How many times a path was requested.
    pub fn calls_to(&self, path: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.path == path)
            .count()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl Clone for MockTransport {
    fn clone(&self) -> Self {
        Self {
            responses: RwLock::new(self.responses.read().unwrap().clone()),
            calls: Mutex::new(self.calls.lock().unwrap().clone()),
            latency: Mutex::new(*self.latency.lock().unwrap()),
        }
    }
}

#[async_trait]
impl PortalTransport for MockTransport {
    async fn execute(&self, request: PortalRequest) -> PortalResult<PortalResponse> {
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let path = url::Url::parse(&request.url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| request.url.clone());

        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method,
            path: path.clone(),
            headers: request.headers.clone(),
            form: request.form.clone(),
        });

        let mut responses = self.responses.write().unwrap();
        let response = match responses.get_mut(&path) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        };

        Ok(response.unwrap_or_else(|| PortalResponse::new(404, "")))
    }
}

/// A transport wired with a working login flow: entry page with anti-forgery
/// cookie, accepting login action, landing page with a practice id.
pub fn portal_with_login() -> MockTransport {
    MockTransport::new()
        .with_response(
            "/login",
            PortalResponse::new(200, "<html><form action=\"/login/validate\"></form></html>")
                .with_header("Set-Cookie", "xsrf=seed; Path=/"),
        )
        .with_response(
            "/login/validate",
            PortalResponse::new(200, "ok").with_header("Set-Cookie", "session=authed; Path=/"),
        )
        .with_page(
            "/dashboard",
            r#"<html><input type="hidden" name="practiceId" value="PR-1"></html>"#,
        )
}
