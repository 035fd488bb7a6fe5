//! Submitter that uploads batches over HTTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;

use super::{FailureCode, SubmissionOutcome, Submitter};
use crate::config::SubmitterConfig;
use crate::domain::batch::Batch;
use crate::error::{IngestError, Result};
use crate::http::{HttpClient, HttpRequest, HttpResponse};

/// API version sent with every upload.
pub const API_VERSION: &str = "2023-01-01";

/// Predicate function to determine if a response should be retried.
///
/// Only consulted for non-success responses.
pub type ShouldRetryFn = Arc<dyn Fn(&HttpResponse) -> bool + Send + Sync>;

/// Default retry predicate: retry on server errors (5xx), rate limits (429), and timeouts (408).
pub fn default_should_retry(response: &HttpResponse) -> bool {
    response.status >= 500 || response.status == 429 || response.status == 408
}

/// Source of the bearer token attached to each upload.
///
/// How the token is obtained is up to the implementation.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String>;
}

/// A fixed, pre-acquired bearer token.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        StaticToken(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(<redacted>)")
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Uploads each batch as a JSON array to a data collection stream.
pub struct HttpSubmitter<H, T> {
    client: H,
    token_source: T,
    endpoint: String,
    path: String,
    timeout: Duration,
    should_retry: ShouldRetryFn,
}

impl<H: HttpClient, T: TokenSource> HttpSubmitter<H, T> {
    /// Build a submitter for the destination named in `config`.
    ///
    /// The configuration is expected to be validated already.
    pub fn new(client: H, config: &SubmitterConfig, token_source: T) -> Self {
        Self {
            client,
            token_source,
            endpoint: config.dce_endpoint.trim_end_matches('/').to_string(),
            path: stream_path(&config.dcr_immutable_id, &config.stream_name),
            timeout: Duration::from_secs(30),
            should_retry: Arc::new(default_should_retry),
        }
    }

    /// Per-request timeout passed to the HTTP client.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the transient/permanent classification of error responses.
    pub fn with_should_retry(mut self, should_retry: ShouldRetryFn) -> Self {
        self.should_retry = should_retry;
        self
    }

    /// Path and query every upload is sent to.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn classify_response(&self, response: &HttpResponse) -> SubmissionOutcome {
        if response.is_success() {
            return SubmissionOutcome::Success;
        }

        counter!(
            "dce_ingest_http_status_total",
            "status" => response.status.to_string()
        )
        .increment(1);

        let code = FailureCode::HttpStatus(response.status);
        if (self.should_retry)(response) {
            SubmissionOutcome::transient(code, response.body.clone())
        } else {
            SubmissionOutcome::permanent(code, response.body.clone())
        }
    }
}

/// Classify a transport error from the HTTP client.
fn classify_error(error: &IngestError) -> SubmissionOutcome {
    match error {
        IngestError::HttpClient(e) if e.is_timeout() => {
            SubmissionOutcome::transient(FailureCode::Timeout, e.to_string())
        }
        IngestError::HttpClient(e) if e.is_builder() => {
            SubmissionOutcome::permanent(FailureCode::InvalidRequest, e.to_string())
        }
        other => SubmissionOutcome::transient(FailureCode::Network, other.to_string()),
    }
}

fn stream_path(rule_id: &str, stream_name: &str) -> String {
    format!(
        "/dataCollectionRules/{}/streams/{}?api-version={}",
        rule_id, stream_name, API_VERSION
    )
}

#[async_trait]
impl<H, T> Submitter for HttpSubmitter<H, T>
where
    H: HttpClient,
    T: TokenSource,
{
    async fn submit(&self, batch: &Batch<'_>) -> SubmissionOutcome {
        let token = match self.token_source.token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::error!(batch = batch.number(), error = %e, "Failed to obtain token");
                return SubmissionOutcome::permanent(FailureCode::Unauthorized, e.to_string());
            }
        };

        let body = match serde_json::to_string(batch.records()) {
            Ok(body) => body,
            Err(e) => {
                return SubmissionOutcome::permanent(FailureCode::InvalidRequest, e.to_string());
            }
        };

        let request = HttpRequest {
            batch: batch.number(),
            endpoint: self.endpoint.clone(),
            path: self.path.clone(),
            body,
        };

        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        match self.client.execute(&request, &token, timeout_ms).await {
            Ok(response) => self.classify_response(&response),
            Err(e) => classify_error(&e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::batch::batch;
    use crate::domain::record::Record;
    use crate::http::MockHttpClient;
    use serde_json::json;

    fn config() -> SubmitterConfig {
        SubmitterConfig {
            tenant_id: "tenant".to_string(),
            application_id: "app".to_string(),
            application_secret: "secret".to_string(),
            dce_endpoint: "https://dce.example.com/".to_string(),
            dcr_immutable_id: "dcr-abc".to_string(),
            stream_name: "Custom-Test_CL".to_string(),
        }
    }

    fn status(status: u16) -> crate::error::Result<HttpResponse> {
        Ok(HttpResponse {
            status,
            body: format!("status {}", status),
        })
    }

    struct FailingToken;

    #[async_trait]
    impl TokenSource for FailingToken {
        async fn token(&self) -> Result<String> {
            Err(anyhow::anyhow!("credential expired").into())
        }
    }

    #[test]
    fn test_default_should_retry() {
        for code in [408, 429, 500, 502, 503, 504] {
            assert!(default_should_retry(&HttpResponse { status: code, body: String::new() }));
        }
        for code in [400, 401, 403, 404, 413] {
            assert!(!default_should_retry(&HttpResponse { status: code, body: String::new() }));
        }
    }

    #[tokio::test]
    async fn test_submit_posts_records_as_json_array() {
        let mock = MockHttpClient::new();
        let submitter = HttpSubmitter::new(mock.clone(), &config(), StaticToken::new("tok"))
            .with_timeout(Duration::from_secs(5));
        mock.add_response(submitter.path(), status(204));

        let records: Vec<Record> = vec![json!({"VulnId": "CVE-1"}).into(), json!({"VulnId": "CVE-2"}).into()];
        let plan = batch(&records, 10).unwrap();
        let first = plan.iter().next().unwrap();

        assert_eq!(submitter.submit(&first).await, SubmissionOutcome::Success);

        let calls = mock.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].endpoint, "https://dce.example.com");
        assert_eq!(
            calls[0].path,
            "/dataCollectionRules/dcr-abc/streams/Custom-Test_CL?api-version=2023-01-01"
        );
        assert_eq!(calls[0].token, "tok");
        assert_eq!(calls[0].timeout_ms, 5000);
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(&calls[0].body).unwrap(),
            json!([{"VulnId": "CVE-1"}, {"VulnId": "CVE-2"}])
        );
    }

    #[tokio::test]
    async fn test_status_classification() {
        let mock = MockHttpClient::new();
        let submitter = HttpSubmitter::new(mock.clone(), &config(), StaticToken::new("tok"));
        let records: Vec<Record> = vec![json!({}).into()];
        let plan = batch(&records, 1).unwrap();
        let only = plan.iter().next().unwrap();

        mock.add_response(submitter.path(), status(429));
        mock.add_response(submitter.path(), status(403));
        mock.add_response(submitter.path(), status(503));

        assert_eq!(
            submitter.submit(&only).await,
            SubmissionOutcome::transient(FailureCode::HttpStatus(429), "status 429")
        );
        assert_eq!(
            submitter.submit(&only).await,
            SubmissionOutcome::permanent(FailureCode::HttpStatus(403), "status 403")
        );
        assert!(submitter.submit(&only).await.is_retriable());
    }

    #[tokio::test]
    async fn test_custom_should_retry() {
        let mock = MockHttpClient::new();
        let submitter = HttpSubmitter::new(mock.clone(), &config(), StaticToken::new("tok"))
            .with_should_retry(Arc::new(|_| false));
        mock.add_response(submitter.path(), status(503));

        let records: Vec<Record> = vec![json!({}).into()];
        let plan = batch(&records, 1).unwrap();
        let outcome = submitter.submit(&plan.iter().next().unwrap()).await;
        assert!(matches!(outcome, SubmissionOutcome::PermanentFailure(_)));
    }

    #[tokio::test]
    async fn test_transport_error_is_transient() {
        let mock = MockHttpClient::new();
        let submitter = HttpSubmitter::new(mock.clone(), &config(), StaticToken::new("tok"));
        mock.add_response(
            submitter.path(),
            Err(anyhow::anyhow!("connection reset").into()),
        );

        let records: Vec<Record> = vec![json!({}).into()];
        let plan = batch(&records, 1).unwrap();
        let outcome = submitter.submit(&plan.iter().next().unwrap()).await;
        assert_eq!(outcome.failure().unwrap().code, FailureCode::Network);
        assert!(outcome.is_retriable());
    }

    #[tokio::test]
    async fn test_token_failure_is_permanent_and_sends_nothing() {
        let mock = MockHttpClient::new();
        let submitter = HttpSubmitter::new(mock.clone(), &config(), FailingToken);

        let records: Vec<Record> = vec![json!({}).into()];
        let plan = batch(&records, 1).unwrap();
        let outcome = submitter.submit(&plan.iter().next().unwrap()).await;

        assert_eq!(outcome.failure().unwrap().code, FailureCode::Unauthorized);
        assert!(!outcome.is_retriable());
        assert_eq!(mock.call_count(), 0);
    }

    #[test]
    fn test_static_token_debug_is_redacted() {
        assert_eq!(format!("{:?}", StaticToken::new("secret")), "StaticToken(<redacted>)");
    }
}
