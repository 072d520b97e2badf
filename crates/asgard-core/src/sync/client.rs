//! Remote sync client for the CRM API.
//!
//! Contract:
//! - `GET {base}/health`
//! - `GET {base}/sync/{collection}[?since=<RFC 3339>]` → `{"records": [...]}`
//! - `POST {base}/sync/{collection}` with `{"records": [...]}` → `{"pushed": n}`

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ClientOptions, SettingsProvider};
use crate::error::{Error, Result};
use crate::models::{Collection, Record};
use crate::util::{compact_text, format_timestamp};

/// Result of a reachability check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub connected: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub const fn online(info: Value) -> Self {
        Self {
            connected: true,
            info: Some(info),
            error: None,
        }
    }

    pub fn offline(error: impl Into<String>) -> Self {
        Self {
            connected: false,
            info: None,
            error: Some(error.into()),
        }
    }
}

/// The server side of synchronization.
#[async_trait]
pub trait RemoteSync: Send + Sync {
    /// Probe the server. Never fails; problems are reported in the status.
    async fn health(&self) -> HealthStatus;

    /// Records changed since `since`, or every record when `since` is `None`.
    async fn pull(&self, collection: &Collection, since: Option<DateTime<Utc>>)
        -> Result<Vec<Record>>;

    /// Send local records; returns how many the server stored.
    async fn push(&self, collection: &Collection, records: &[Record]) -> Result<usize>;
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    records: Vec<Record>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<Record>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Record>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Serialize)]
struct PushRequest<'a> {
    records: &'a [Record],
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    pushed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

/// HTTP implementation of [`RemoteSync`].
///
/// Settings are read from the provider on every call so edits apply to the
/// next request without rebuilding the client.
#[derive(Clone)]
pub struct HttpSyncClient {
    settings: Arc<dyn SettingsProvider>,
    client: reqwest::Client,
    options: ClientOptions,
}

impl HttpSyncClient {
    pub fn new(settings: Arc<dyn SettingsProvider>, options: ClientOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()?;
        Ok(Self {
            settings,
            client,
            options,
        })
    }

    /// Base URL and bearer token from the current settings.
    async fn endpoint(&self) -> Result<(String, Option<String>)> {
        let settings = self.settings.current().await?;
        Ok((settings.base_url()?, settings.token()))
    }

    fn authorize(
        request: reqwest::RequestBuilder,
        token: Option<&str>,
    ) -> reqwest::RequestBuilder {
        let request = request.header(reqwest::header::ACCEPT, "application/json");
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn transport_error(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::Timeout(self.options.request_timeout)
        } else {
            Error::Http(error)
        }
    }

    /// Run `send` until it succeeds, fails permanently, or attempts run out.
    async fn with_retry<T, F, Fut>(&self, operation: &str, mut send: F) -> Result<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let max_attempts = self.options.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match send().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    let delay = self.options.retry.delay_for_retry(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        ?delay,
                        "{operation} failed, retrying: {error}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }

    async fn read_json<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let response = check_status(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|error| self.transport_error(error))
    }

    async fn pull_once(
        &self,
        collection: &Collection,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Record>> {
        let (base, token) = self.endpoint().await?;
        let mut request = self.client.get(format!("{base}/sync/{collection}"));
        if let Some(since) = since {
            request = request.query(&[("since", format_timestamp(since))]);
        }

        let response = Self::authorize(request, token.as_deref())
            .send()
            .await
            .map_err(|error| self.transport_error(error))?;
        let payload: PullResponse = self.read_json(response).await?;
        Ok(payload.records)
    }

    async fn push_once(&self, collection: &Collection, records: &[Record]) -> Result<usize> {
        let (base, token) = self.endpoint().await?;
        let request = self
            .client
            .post(format!("{base}/sync/{collection}"))
            .json(&PushRequest { records });

        let response = Self::authorize(request, token.as_deref())
            .send()
            .await
            .map_err(|error| self.transport_error(error))?;
        let response = check_status(response).await?;
        let body = response
            .text()
            .await
            .map_err(|error| self.transport_error(error))?;

        // Older servers answer without a count; the batch is then assumed stored
        let pushed = serde_json::from_str::<PushResponse>(&body)
            .ok()
            .and_then(|payload| payload.pushed)
            .and_then(|pushed| usize::try_from(pushed).ok())
            .filter(|pushed| *pushed > 0)
            .unwrap_or(records.len());
        Ok(pushed)
    }
}

#[async_trait]
impl RemoteSync for HttpSyncClient {
    async fn health(&self) -> HealthStatus {
        let (base, token) = match self.endpoint().await {
            Ok(endpoint) => endpoint,
            Err(error) => return HealthStatus::offline(error.to_string()),
        };

        let request = Self::authorize(self.client.get(format!("{base}/health")), token.as_deref());
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => return HealthStatus::offline(self.transport_error(error).to_string()),
        };

        let response = match check_status(response).await {
            Ok(response) => response,
            Err(error) => return HealthStatus::offline(error.to_string()),
        };

        let body = response.text().await.unwrap_or_default();
        let info =
            serde_json::from_str(&body).unwrap_or_else(|_| Value::String(compact_text(&body)));
        HealthStatus::online(info)
    }

    async fn pull(
        &self,
        collection: &Collection,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Record>> {
        self.with_retry("pull", || self.pull_once(collection, since))
            .await
    }

    async fn push(&self, collection: &Collection, records: &[Record]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.with_retry("push", || self.push_once(collection, records))
            .await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Api {
        status: status.as_u16(),
        message: parse_api_error(status, &body),
    })
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return compact_text(&message);
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetryPolicy, StaticSettings};
    use crate::models::SyncSettings;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(url: Option<&str>) -> Arc<dyn SettingsProvider> {
        Arc::new(StaticSettings(SyncSettings {
            enabled: true,
            api_url: url.map(str::to_string),
            api_key: Some("test-token".to_string()),
            ..SyncSettings::default()
        }))
    }

    fn fast_options() -> ClientOptions {
        ClientOptions::default().with_retry(RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        })
    }

    fn client_for(server: &MockServer) -> HttpSyncClient {
        HttpSyncClient::new(settings(Some(&server.uri())), fast_options()).unwrap()
    }

    fn users() -> Collection {
        Collection::new("users").unwrap()
    }

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    #[tokio::test]
    async fn pull_without_cursor_requests_everything() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sync/users"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [{"id": 1, "name": "Ada"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let records = client_for(&server).pull(&users(), None).await.unwrap();

        assert_eq!(records, vec![record(json!({"id": 1, "name": "Ada"}))]);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests[0].url.query(), None);
    }

    #[tokio::test]
    async fn pull_sends_since_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sync/users"))
            .and(query_param("since", "2024-01-01T00:00:00.000Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": []})))
            .expect(1)
            .mount(&server)
            .await;

        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let records = client_for(&server).pull(&users(), Some(since)).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn null_or_missing_records_mean_nothing_changed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sync/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": null})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sync/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.pull(&users(), None).await.unwrap().is_empty());
        assert!(client.pull(&users(), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn push_posts_records_and_reads_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sync/users"))
            .and(header("Authorization", "Bearer test-token"))
            .and(body_json(json!({"records": [{"id": 1}, {"id": 2}]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"pushed": 2})))
            .expect(1)
            .mount(&server)
            .await;

        let batch = vec![record(json!({"id": 1})), record(json!({"id": 2}))];
        let pushed = client_for(&server).push(&users(), &batch).await.unwrap();
        assert_eq!(pushed, 2);
    }

    #[tokio::test]
    async fn push_without_count_assumes_whole_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sync/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let batch = vec![record(json!({"id": 1})), record(json!({"id": 2}))];
        let pushed = client_for(&server).push(&users(), &batch).await.unwrap();
        assert_eq!(pushed, 2);
    }

    #[tokio::test]
    async fn empty_push_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let pushed = client_for(&server).push(&users(), &[]).await.unwrap();
        assert_eq!(pushed, 0);
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sync/users"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sync/users"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": [{"id": 3}]})))
            .expect(1)
            .mount(&server)
            .await;

        let records = client_for(&server).pull(&users(), None).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "db down"})))
            .expect(3)
            .mount(&server)
            .await;

        let error = client_for(&server).pull(&users(), None).await.unwrap_err();
        assert_eq!(error.to_string(), "API error 500: db down");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"message": "Invalid token"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let error = client_for(&server).pull(&users(), None).await.unwrap_err();
        match error {
            Error::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid token");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn slow_responses_become_timeouts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let options = ClientOptions::default()
            .with_request_timeout(Duration::from_millis(50))
            .with_retry(RetryPolicy::none());
        let client = HttpSyncClient::new(settings(Some(&server.uri())), options).unwrap();

        let error = client.pull(&users(), None).await.unwrap_err();
        assert!(matches!(error, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn missing_url_is_a_configuration_error() {
        let client = HttpSyncClient::new(settings(None), fast_options()).unwrap();

        let error = client.pull(&users(), None).await.unwrap_err();
        assert!(matches!(error, Error::Config(_)));

        let error = client
            .push(&users(), &[record(json!({"id": 1}))])
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Config(_)));

        let health = client.health().await;
        assert!(!health.connected);
        assert!(health.error.unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn health_reports_success_and_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = client_for(&server);

        let healthy = client.health().await;
        assert!(healthy.connected);
        assert_eq!(healthy.info, Some(json!({"status": "ok"})));

        let unhealthy = client.health().await;
        assert!(!unhealthy.connected);
        assert_eq!(
            unhealthy.error.as_deref(),
            Some("API error 503: maintenance")
        );
    }

    #[tokio::test]
    async fn health_reports_unreachable_server() {
        // Nothing listens on the discard port
        let client =
            HttpSyncClient::new(settings(Some("http://127.0.0.1:9")), fast_options()).unwrap();
        let health = client.health().await;
        assert!(!health.connected);
        assert!(health.error.is_some());
    }

    #[test]
    fn parse_api_error_prefers_json_message() {
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, r#"{"error":"bad table"}"#),
            "bad table"
        );
        assert_eq!(parse_api_error(StatusCode::NOT_FOUND, ""), "Not Found");
        assert_eq!(parse_api_error(StatusCode::BAD_GATEWAY, " upstream "), "upstream");
    }
}
