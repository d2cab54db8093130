//! The Insights query client: token handling, retry execution, and
//! envelope decoding composed behind one `call` surface.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use strata_insights_auth::{InsightsCredentials, Region, TokenManager};

use crate::config::ClientConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::query::{build_query, EndpointClass, FilterRule, QueryRequest, TimeWindow};
use crate::response::ResponseEnvelope;
use crate::retry::RetryPolicy;
use crate::API_PREFIX;

/// Client for the Insights query endpoints.
///
/// Owns one pooled HTTP transport, acquired at construction and
/// released when the last clone is dropped, and one [`TokenManager`]
/// shared by every request path of this client. Cloning is cheap and
/// shares both, so concurrent callers issuing `call`s in parallel
/// never trigger independent token acquisitions.
///
/// # Example
///
/// ```rust,ignore
/// use strata_insights_auth::{InsightsCredentials, Region};
/// use strata_insights_client::{EndpointClass, InsightsClient, TimeWindow};
///
/// let creds = InsightsCredentials::new(client_id, client_secret, tsg_id)?;
/// let client = InsightsClient::new(creds, Region::Americas)?;
///
/// let users = client
///     .call(
///         "query/users/agent/user_list",
///         TimeWindow::LastHours(24),
///         &[],
///         EndpointClass::AgentUser,
///     )
///     .await?;
/// ```
#[derive(Clone)]
pub struct InsightsClient {
    http: reqwest::Client,
    config: ClientConfig,
    region: Region,
    tokens: Arc<TokenManager>,
}

impl std::fmt::Debug for InsightsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightsClient")
            .field("base_url", &self.config.base_url)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl InsightsClient {
    /// Create a client with the default configuration.
    pub fn new(credentials: InsightsCredentials, region: Region) -> Result<Self> {
        Self::with_config(credentials, region, ClientConfig::default())
    }

    /// Create a client with custom configuration.
    pub fn with_config(
        credentials: InsightsCredentials,
        region: Region,
        mut config: ClientConfig,
    ) -> Result<Self> {
        // Fail fast on an unparseable base URL instead of at request time.
        url::Url::parse(&config.base_url)?;
        config.base_url = config.base_url.trim_end_matches('/').to_string();

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;

        let tokens = TokenManager::with_auth_url(credentials, http.clone(), &config.auth_url)
            .with_timeout(config.auth_timeout);

        Ok(Self {
            http,
            config,
            region,
            tokens: Arc::new(tokens),
        })
    }

    /// The configured region.
    pub fn region(&self) -> Region {
        self.region
    }

    /// The base URL in use.
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// The shared token manager.
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Build the full URL for an endpoint path.
    ///
    /// Example: `url("query/users/agent/user_list")` ->
    /// `{base_url}/insights/v3.0/resource/query/users/agent/user_list`
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url,
            API_PREFIX,
            path.trim_start_matches('/')
        )
    }

    /// Build a body for `endpoint_class` and execute it against `path`.
    ///
    /// Validation failures (missing mandated filters, malformed
    /// windows) surface before any network I/O.
    pub async fn call(
        &self,
        path: &str,
        window: TimeWindow,
        filters: &[FilterRule],
        class: EndpointClass,
    ) -> Result<ResponseEnvelope> {
        let body = build_query(window, filters, class)?;
        self.post_query(path, &body).await
    }

    /// Like [`call`](Self::call) with a search term attached to the
    /// body (site-location search endpoints).
    pub async fn search(
        &self,
        path: &str,
        term: &str,
        window: TimeWindow,
        filters: &[FilterRule],
        class: EndpointClass,
    ) -> Result<ResponseEnvelope> {
        let body = build_query(window, filters, class)?.with_search(term);
        self.post_query(path, &body).await
    }

    /// Issue many calls in parallel, joined at one fan-out point.
    ///
    /// Results are returned in input order. Each call carries its own
    /// retry budget and deadline; all of them share this client's
    /// token manager, so a cold token cache costs one identity-endpoint
    /// call regardless of how many calls are in flight.
    pub async fn call_many(&self, calls: Vec<QueryCall>) -> Vec<Result<ResponseEnvelope>> {
        futures::future::join_all(calls.into_iter().map(|call| {
            let client = self.clone();
            async move {
                client
                    .call(&call.path, call.window, &call.filters, call.class)
                    .await
            }
        }))
        .await
    }

    /// Execute a prebuilt query body with retry handling.
    ///
    /// The body is pure data, so resending it on retry is safe; the
    /// bearer token is re-fetched for every attempt so a retry after a
    /// forced refresh never reuses the stale token.
    #[instrument(skip(self, body), fields(path = %path))]
    pub async fn post_query(&self, path: &str, body: &QueryRequest) -> Result<ResponseEnvelope> {
        let url = self.url(path);
        let mut retry_policy = self
            .config
            .retry
            .as_ref()
            .map(|c| RetryPolicy::new(c.clone()));
        let mut reauth_used = false;

        loop {
            let result = self.attempt(&url, body, &mut reauth_used).await;

            match result {
                Ok(envelope) => return Ok(envelope),
                Err(err) if err.is_retryable() => {
                    if let Some(ref mut policy) = retry_policy {
                        if let Some(delay) = policy.next_delay(err.retry_after()) {
                            warn!(
                                attempt = policy.attempt(),
                                delay_ms = delay.as_millis() as u64,
                                error = %err,
                                "request failed, retrying"
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }

                        return Err(Error::new(ErrorKind::RetriesExhausted {
                            attempts: policy.attempt(),
                            last_status: err.status(),
                            message: err.to_string(),
                        }));
                    }

                    // No retry policy configured.
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// One attempt: fetch a valid token, execute, and on the first 401
    /// of this request force a single token reacquisition and
    /// re-execute. The forced retry is not counted against the generic
    /// retry budget; `reauth_used` spans the whole request, so any
    /// later 401, even on a different attempt, surfaces as a terminal
    /// authentication failure.
    async fn attempt(
        &self,
        url: &str,
        body: &QueryRequest,
        reauth_used: &mut bool,
    ) -> Result<ResponseEnvelope> {
        let token = self.tokens.get_valid_token().await?;

        match self.execute_once(url, body, token.value()).await {
            Err(err) if err.is_auth_error() && !*reauth_used => {
                *reauth_used = true;
                info!("query endpoint returned 401, forcing token reacquisition");
                self.tokens.invalidate(token.value()).await;
                let fresh = self.tokens.get_valid_token().await?;
                self.execute_once(url, body, fresh.value()).await
            }
            other => other,
        }
    }

    /// Execute a single request and classify the outcome.
    async fn execute_once(
        &self,
        url: &str,
        body: &QueryRequest,
        token: &str,
    ) -> Result<ResponseEnvelope> {
        if self.config.enable_tracing {
            debug!(url, "sending query request");
        }

        let response = self
            .http
            .post(url)
            .bearer_auth(token)
            .header("X-PANW-Region", self.region.as_str())
            .json(body)
            .send()
            .await?;

        let status = response.status().as_u16();

        if self.config.enable_tracing {
            if response.status().is_success() {
                debug!(status, "response received");
            } else {
                info!(status, "non-success response");
            }
        }

        if status == 401 {
            return Err(Error::new(ErrorKind::Authentication(
                "query endpoint rejected bearer token (HTTP 401)".to_string(),
            )));
        }

        if status == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs);

            return Err(Error::new(ErrorKind::RateLimited { retry_after }));
        }

        if response.status().is_server_error() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::new(ErrorKind::Http { status, message }));
        }

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::new(ErrorKind::Api { status, body }));
        }

        response.json::<ResponseEnvelope>().await.map_err(Into::into)
    }
}

/// One query in a [`InsightsClient::call_many`] fan-out.
#[derive(Debug, Clone)]
pub struct QueryCall {
    pub path: String,
    pub window: TimeWindow,
    pub filters: Vec<FilterRule>,
    pub class: EndpointClass,
}

impl QueryCall {
    /// A call with no extra filters.
    pub fn new(path: impl Into<String>, window: TimeWindow, class: EndpointClass) -> Self {
        Self {
            path: path.into(),
            window,
            filters: Vec::new(),
            class,
        }
    }

    /// Attach caller filters.
    pub fn with_filters(mut self, filters: Vec<FilterRule>) -> Self {
        self.filters = filters;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use crate::retry::RetryConfig;

    use super::*;

    fn test_client(server: &MockServer, retry: Option<RetryConfig>) -> InsightsClient {
        let credentials =
            InsightsCredentials::new("svc@example.iam", "secret", "123456").unwrap();
        let config = match retry {
            Some(retry) => ClientConfig::builder().with_retry(retry),
            None => ClientConfig::builder().without_retry(),
        }
        .with_base_url(server.uri())
        .with_auth_url(format!("{}/oauth2/access_token", server.uri()))
        .build();

        InsightsClient::with_config(credentials, Region::Americas, config).unwrap()
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig::default()
            .with_max_attempts(max_attempts)
            .with_initial_delay(Duration::from_millis(10))
    }

    async fn mount_token_endpoint(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/oauth2/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "token_type": "Bearer",
                "expires_in": 900
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn envelope_body() -> serde_json::Value {
        serde_json::json!({
            "header": {"status": 200, "requestId": "req-1", "dataCount": 1},
            "data": [{"username": "jdoe"}]
        })
    }

    #[tokio::test]
    async fn test_url_building() {
        let server = MockServer::start().await;
        let client = test_client(&server, None);

        assert_eq!(
            client.url("query/users/agent/user_list"),
            format!(
                "{}/insights/v3.0/resource/query/users/agent/user_list",
                server.uri()
            )
        );
        assert_eq!(
            client.url("/query/sites/site_count"),
            format!("{}/insights/v3.0/resource/query/sites/site_count", server.uri())
        );
    }

    #[tokio::test]
    async fn test_successful_call_attaches_token_and_region() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/insights/v3.0/resource/query/users/agent/user_list"))
            .and(header("Authorization", "Bearer tok-1"))
            .and(header("X-PANW-Region", "americas"))
            .and(body_partial_json(serde_json::json!({
                "filter": {"rules": [
                    {"property": "event_time", "operator": "last_n_hours", "values": [24]}
                ]}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope_body()))
            .mount(&server)
            .await;

        let client = test_client(&server, None);
        let envelope = client
            .call(
                "query/users/agent/user_list",
                TimeWindow::LastHours(24),
                &[],
                EndpointClass::AgentUser,
            )
            .await
            .unwrap();

        assert_eq!(envelope.header.status, 200);
        assert_eq!(envelope.data[0]["username"], "jdoe");
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_request() {
        let server = MockServer::start().await;
        // No mocks mounted: any request would 404 and fail differently;
        // the token endpoint expect(0) is implicit since nothing is mounted.

        let client = test_client(&server, None);
        let err = client
            .call(
                "query/users/other/session_list",
                TimeWindow::LastHours(24),
                &[],
                EndpointClass::UserSession,
            )
            .await
            .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::Validation(_)));
        assert_eq!(server.received_requests().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_retry_on_503_then_success() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, 1).await;

        let calls = AtomicU32::new(0);
        Mock::given(method("POST"))
            .and(path("/insights/v3.0/resource/query/sites/site_count"))
            .respond_with(move |_: &Request| {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    ResponseTemplate::new(503)
                } else {
                    ResponseTemplate::new(200).set_body_json(envelope_body())
                }
            })
            .expect(3)
            .mount(&server)
            .await;

        let client = test_client(&server, Some(fast_retry(3)));
        let envelope = client
            .call(
                "query/sites/site_count",
                TimeWindow::LastHours(24),
                &[],
                EndpointClass::Generic,
            )
            .await
            .unwrap();

        assert_eq!(envelope.len(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted_carries_last_status() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/insights/v3.0/resource/query/sites/site_count"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3) // initial attempt + 2 retries
            .mount(&server)
            .await;

        let client = test_client(&server, Some(fast_retry(2)));
        let err = client
            .call(
                "query/sites/site_count",
                TimeWindow::LastHours(24),
                &[],
                EndpointClass::Generic,
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err.kind,
            ErrorKind::RetriesExhausted {
                attempts: 2,
                last_status: Some(503),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_client_error_fails_immediately() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/insights/v3.0/resource/query/sites/site_count"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string(r#"{"message":"bad filter"}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, Some(fast_retry(3)));
        let err = client
            .call(
                "query/sites/site_count",
                TimeWindow::LastHours(24),
                &[],
                EndpointClass::Generic,
            )
            .await
            .unwrap_err();

        match err.kind {
            ErrorKind::Api { status, body } => {
                assert_eq!(status, 400);
                assert!(body.contains("bad filter"));
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_respects_retry_after() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, 1).await;

        let calls = AtomicU32::new(0);
        Mock::given(method("POST"))
            .and(path("/insights/v3.0/resource/query/sites/site_count"))
            .respond_with(move |_: &Request| {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(429).insert_header("Retry-After", "0")
                } else {
                    ResponseTemplate::new(200).set_body_json(envelope_body())
                }
            })
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server, Some(fast_retry(3)));
        let envelope = client
            .call(
                "query/sites/site_count",
                TimeWindow::LastHours(24),
                &[],
                EndpointClass::Generic,
            )
            .await
            .unwrap();

        assert_eq!(envelope.len(), 1);
    }

    #[tokio::test]
    async fn test_401_forces_one_reacquisition() {
        let server = MockServer::start().await;
        // Initial acquisition plus the forced reacquisition.
        mount_token_endpoint(&server, 2).await;

        let calls = AtomicU32::new(0);
        Mock::given(method("POST"))
            .and(path("/insights/v3.0/resource/query/sites/site_count"))
            .respond_with(move |_: &Request| {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    ResponseTemplate::new(401)
                } else {
                    ResponseTemplate::new(200).set_body_json(envelope_body())
                }
            })
            .expect(2)
            .mount(&server)
            .await;

        let client = test_client(&server, None);
        let envelope = client
            .call(
                "query/sites/site_count",
                TimeWindow::LastHours(24),
                &[],
                EndpointClass::Generic,
            )
            .await
            .unwrap();

        assert_eq!(envelope.header.status, 200);
    }

    #[tokio::test]
    async fn test_second_401_is_terminal() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, 2).await;

        Mock::given(method("POST"))
            .and(path("/insights/v3.0/resource/query/sites/site_count"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2) // once before and once after the forced refresh
            .mount(&server)
            .await;

        // Generic retry budget available, but auth failures must not
        // consume it.
        let client = test_client(&server, Some(fast_retry(3)));
        let err = client
            .call(
                "query/sites/site_count",
                TimeWindow::LastHours(24),
                &[],
                EndpointClass::Generic,
            )
            .await
            .unwrap_err();

        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn test_reacquisition_spent_survives_generic_retries() {
        let server = MockServer::start().await;
        // Initial acquisition plus exactly one forced reacquisition;
        // the 401 after the 503 retry must not trigger another.
        mount_token_endpoint(&server, 2).await;

        let calls = AtomicU32::new(0);
        Mock::given(method("POST"))
            .and(path("/insights/v3.0/resource/query/sites/site_count"))
            .respond_with(move |_: &Request| match calls.fetch_add(1, Ordering::SeqCst) {
                0 => ResponseTemplate::new(401),
                1 => ResponseTemplate::new(503),
                _ => ResponseTemplate::new(401),
            })
            .expect(3)
            .mount(&server)
            .await;

        let client = test_client(&server, Some(fast_retry(3)));
        let err = client
            .call(
                "query/sites/site_count",
                TimeWindow::LastHours(24),
                &[],
                EndpointClass::Generic,
            )
            .await
            .unwrap_err();

        assert!(err.is_auth_error());
    }

    #[tokio::test]
    async fn test_call_many_shares_one_token_acquisition() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/insights/v3.0/resource/query/sites/site_count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope_body()))
            .expect(4)
            .mount(&server)
            .await;

        let client = test_client(&server, None);
        let calls = (0..4)
            .map(|_| {
                QueryCall::new(
                    "query/sites/site_count",
                    TimeWindow::LastHours(24),
                    EndpointClass::Generic,
                )
            })
            .collect();

        let results = client.call_many(calls).await;
        assert_eq!(results.len(), 4);
        for result in results {
            assert_eq!(result.unwrap().header.status, 200);
        }
    }

    #[tokio::test]
    async fn test_missing_data_field_is_success() {
        let server = MockServer::start().await;
        mount_token_endpoint(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/insights/v3.0/resource/query/sites/site_count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "header": {"status": 200}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server, None);
        let envelope = client
            .call(
                "query/sites/site_count",
                TimeWindow::LastHours(24),
                &[],
                EndpointClass::Generic,
            )
            .await
            .unwrap();

        assert!(envelope.is_empty());
    }
}
