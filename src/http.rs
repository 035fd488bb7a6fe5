//! HTTP client abstraction for delivering batches.
//!
//! This module defines the `HttpClient` trait to abstract HTTP request execution,
//! enabling testability with mock implementations.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// A fully-encoded batch upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Batch number, for logging only
    pub batch: usize,
    /// Base URL of the ingestion endpoint (no trailing slash)
    pub endpoint: String,
    /// Path and query appended to the endpoint
    pub path: String,
    /// JSON array of records
    pub body: String,
}

impl HttpRequest {
    pub fn url(&self) -> String {
        format!("{}{}", self.endpoint, self.path)
    }
}

/// Response from an HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as a string
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait for executing HTTP requests.
///
/// This abstraction allows for different implementations (production vs. testing)
/// and makes the submission logic testable without making real HTTP calls.
///
/// # Example
/// ```ignore
/// let client = ReqwestHttpClient::new();
/// let response = client.execute(&request, "token", 30_000).await?;
/// println!("Status: {}, Body: {}", response.status, response.body);
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync + Clone {
    /// POST a batch.
    ///
    /// # Arguments
    /// * `request` - Endpoint, path and encoded body
    /// * `token` - Bearer token; omitted from the request when empty
    /// * `timeout_ms` - Request timeout in milliseconds
    ///
    /// # Errors
    /// Returns an error if the request fails due to network issues, times out,
    /// or the URL is invalid. Non-success status codes are *not* errors.
    async fn execute(
        &self,
        request: &HttpRequest,
        token: &str,
        timeout_ms: u64,
    ) -> Result<HttpResponse>;
}

// ============================================================================
// Production Implementation using reqwest
// ============================================================================

/// Production HTTP client using reqwest.
#[derive(Clone, Default)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    #[tracing::instrument(skip(self, request, token), fields(batch = request.batch))]
    async fn execute(
        &self,
        request: &HttpRequest,
        token: &str,
        timeout_ms: u64,
    ) -> Result<HttpResponse> {
        let url = request.url();

        tracing::debug!(
            url = %url,
            timeout_ms = timeout_ms,
            body_len = request.body.len(),
            "Executing HTTP request"
        );

        let mut req = self
            .client
            .post(&url)
            .timeout(Duration::from_millis(timeout_ms))
            .header("Content-Type", "application/json")
            .body(request.body.clone());

        // Only add Authorization header if a token is present
        if !token.is_empty() {
            req = req.bearer_auth(token);
            tracing::trace!(batch = request.batch, "Added Authorization header");
        }

        let response = req.send().await.map_err(|e| {
            tracing::error!(
                batch = request.batch,
                url = %url,
                error = %e,
                "HTTP request failed"
            );
            e
        })?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!(
            batch = request.batch,
            status = status,
            response_len = body.len(),
            "HTTP request completed"
        );

        Ok(HttpResponse { status, body })
    }
}

// ============================================================================
// Test/Mock Implementation
// ============================================================================

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Mock HTTP client for testing.
///
/// Responses are queued per request path and returned in FIFO order.
///
/// # Example
/// ```ignore
/// let mock = MockHttpClient::new();
/// mock.add_response(
///     "/dataCollectionRules/dcr-1/streams/Custom-Test_CL?api-version=2023-01-01",
///     Ok(HttpResponse { status: 204, body: String::new() }),
/// );
/// ```
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, Vec<MockResponse>>>>,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

/// A mock response that can optionally wait for a trigger before completing.
enum MockResponse {
    /// Immediate response
    Immediate(Result<HttpResponse>),
    /// Response that waits for a trigger signal before completing
    Triggered {
        response: Result<HttpResponse>,
        trigger: oneshot::Receiver<()>,
    },
}

/// Record of a call made to the mock HTTP client.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub batch: usize,
    pub endpoint: String,
    pub path: String,
    pub body: String,
    pub token: String,
    pub timeout_ms: u64,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for a request path.
    pub fn add_response(&self, path: &str, response: Result<HttpResponse>) {
        self.responses
            .lock()
            .entry(path.to_string())
            .or_default()
            .push(MockResponse::Immediate(response));
    }

    /// Queue a response that completes only once the returned sender fires
    /// (by sending `()` or being dropped).
    pub fn add_response_with_trigger(
        &self,
        path: &str,
        response: Result<HttpResponse>,
    ) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.responses
            .lock()
            .entry(path.to_string())
            .or_default()
            .push(MockResponse::Triggered {
                response,
                trigger: rx,
            });
        tx
    }

    /// Get all calls that have been made to this mock client.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(
        &self,
        request: &HttpRequest,
        token: &str,
        timeout_ms: u64,
    ) -> Result<HttpResponse> {
        self.calls.lock().push(MockCall {
            batch: request.batch,
            endpoint: request.endpoint.clone(),
            path: request.path.clone(),
            body: request.body.clone(),
            token: token.to_string(),
            timeout_ms,
        });

        let mock_response = {
            let mut responses = self.responses.lock();
            responses
                .get_mut(&request.path)
                .filter(|queue| !queue.is_empty())
                .map(|queue| queue.remove(0))
        };

        match mock_response {
            Some(MockResponse::Immediate(response)) => response,
            Some(MockResponse::Triggered { response, trigger }) => {
                // Proceed whether the trigger fired or was dropped
                let _ = trigger.await;
                response
            }
            None => Err(crate::error::IngestError::Other(anyhow::anyhow!(
                "No mock response configured for {}",
                request.path
            ))),
        }
    }
}
