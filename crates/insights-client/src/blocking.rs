//! Synchronous wrapper for callers without an async runtime.

use strata_insights_auth::{InsightsCredentials, Region};

use crate::client::{InsightsClient, QueryCall};
use crate::config::ClientConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::query::{EndpointClass, FilterRule, QueryRequest, TimeWindow};
use crate::response::ResponseEnvelope;

/// Blocking variant of [`InsightsClient`].
///
/// Owns a single-threaded tokio runtime and drives the async client on
/// it. Each method blocks the calling thread until the request (and
/// its retries) finish. Must not be constructed or called from inside
/// an async context.
#[derive(Debug)]
pub struct BlockingClient {
    inner: InsightsClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingClient {
    /// Create a blocking client with the default configuration.
    pub fn new(credentials: InsightsCredentials, region: Region) -> Result<Self> {
        Self::with_config(credentials, region, ClientConfig::default())
    }

    /// Create a blocking client with custom configuration.
    pub fn with_config(
        credentials: InsightsCredentials,
        region: Region,
        config: ClientConfig,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::with_source(ErrorKind::Config(e.to_string()), e))?;

        let inner = {
            let _guard = runtime.enter();
            InsightsClient::with_config(credentials, region, config)?
        };

        Ok(Self { inner, runtime })
    }

    /// See [`InsightsClient::call`].
    pub fn call(
        &self,
        path: &str,
        window: TimeWindow,
        filters: &[FilterRule],
        class: EndpointClass,
    ) -> Result<ResponseEnvelope> {
        self.runtime
            .block_on(self.inner.call(path, window, filters, class))
    }

    /// See [`InsightsClient::search`].
    pub fn search(
        &self,
        path: &str,
        term: &str,
        window: TimeWindow,
        filters: &[FilterRule],
        class: EndpointClass,
    ) -> Result<ResponseEnvelope> {
        self.runtime
            .block_on(self.inner.search(path, term, window, filters, class))
    }

    /// See [`InsightsClient::post_query`].
    pub fn post_query(&self, path: &str, body: &QueryRequest) -> Result<ResponseEnvelope> {
        self.runtime.block_on(self.inner.post_query(path, body))
    }

    /// See [`InsightsClient::call_many`]. The fan-out still runs
    /// concurrently on the internal runtime.
    pub fn call_many(&self, calls: Vec<QueryCall>) -> Vec<Result<ResponseEnvelope>> {
        self.runtime.block_on(self.inner.call_many(calls))
    }

    /// Access the wrapped async client.
    pub fn inner(&self) -> &InsightsClient {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    // MockServer is async, so the mock setup runs on its own runtime
    // while the client under test blocks on its internal one.
    fn start_server() -> (tokio::runtime::Runtime, MockServer) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let server = rt.block_on(MockServer::start());
        (rt, server)
    }

    #[test]
    fn test_blocking_call() {
        let (rt, server) = start_server();

        rt.block_on(async {
            Mock::given(method("POST"))
                .and(path("/oauth2/access_token"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "access_token": "tok-1",
                    "token_type": "Bearer",
                    "expires_in": 900
                })))
                .mount(&server)
                .await;

            Mock::given(method("POST"))
                .and(path("/insights/v3.0/resource/query/sites/site_count"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "header": {"status": 200},
                    "data": [{"site_count": 3}]
                })))
                .mount(&server)
                .await;
        });

        let credentials =
            InsightsCredentials::new("svc@example.iam", "secret", "123456").unwrap();
        let config = ClientConfig::builder()
            .without_retry()
            .with_base_url(server.uri())
            .with_auth_url(format!("{}/oauth2/access_token", server.uri()))
            .build();
        let client = BlockingClient::with_config(credentials, Region::Americas, config).unwrap();

        let envelope = client
            .call(
                "query/sites/site_count",
                TimeWindow::LastHours(24),
                &[],
                EndpointClass::Generic,
            )
            .unwrap();

        assert_eq!(envelope.data[0]["site_count"], 3);
    }

    #[test]
    fn test_blocking_validation_error() {
        let (_rt, server) = start_server();

        let credentials =
            InsightsCredentials::new("svc@example.iam", "secret", "123456").unwrap();
        let config = ClientConfig::builder()
            .without_retry()
            .with_base_url(server.uri())
            .build();
        let client = BlockingClient::with_config(credentials, Region::Europe, config).unwrap();

        let err = client
            .call(
                "query/users/other/session_list",
                TimeWindow::LastHours(24),
                &[],
                EndpointClass::UserSession,
            )
            .unwrap_err();

        assert!(matches!(err.kind, ErrorKind::Validation(_)));
    }
}
