//! Polling client for a chain gateway's lease-event JSON API.
//!
//! The gateway exposes ratification events for one observed contract as a
//! cursor-paged collection; the source turns that into the continuous
//! [`EventStream`] the ingester consumes.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ChainError, Result};
use crate::event::{decode_lease_id, validate_price, LeaseRatified};
use crate::source::{EventSource, EventStream};

/// Retry configuration for gateway requests
#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
        }
    }
}

/// One lease ratification as served by the gateway.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayLeaseEvent {
    pub lease_id: String,
    pub spender: String,
    pub earner: String,
    /// Decimal string or JSON integer; normalized during decoding.
    pub price: serde_json::Value,
    #[serde(default)]
    pub cursor: Option<String>,
}

impl TryFrom<GatewayLeaseEvent> for LeaseRatified {
    type Error = ChainError;

    fn try_from(raw: GatewayLeaseEvent) -> Result<Self> {
        let lease_id = decode_lease_id(&raw.lease_id)?;
        if raw.spender.is_empty() || raw.earner.is_empty() {
            return Err(ChainError::EventMalformed(
                "spender and earner addresses must be non-empty".to_string(),
            ));
        }
        let price = match &raw.price {
            serde_json::Value::String(s) => validate_price(s)?,
            serde_json::Value::Number(n) if n.is_u64() => n.to_string(),
            other => {
                return Err(ChainError::EventMalformed(format!(
                    "price has unsupported shape: {}",
                    other
                )))
            }
        };
        Ok(LeaseRatified {
            lease_id,
            spender: raw.spender,
            earner: raw.earner,
            price,
        })
    }
}

/// One page of the gateway's event collection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayEventsPage {
    pub records: Vec<GatewayLeaseEvent>,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

#[derive(Clone)]
pub struct GatewayClient {
    base_url: String,
    contract: String,
    http: reqwest::Client,
    retry_config: RetryConfig,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>, contract: impl Into<String>) -> Self {
        Self::with_retry_config(base_url, contract, RetryConfig::default())
    }

    pub fn with_retry_config(
        base_url: impl Into<String>,
        contract: impl Into<String>,
        retry_config: RetryConfig,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            contract: contract.into(),
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            retry_config,
        }
    }

    /// Execute a request with exponential backoff retry logic
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        let mut delay_ms = self.retry_config.initial_delay_ms;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;

                    if !e.is_retryable() || attempt >= self.retry_config.max_retries {
                        match e.log_level() {
                            tracing::Level::ERROR => {
                                tracing::error!("Request failed after {} attempts: {}", attempt, e)
                            }
                            _ => {
                                tracing::warn!("Request failed after {} attempts: {}", attempt, e)
                            }
                        }
                        return Err(e);
                    }

                    debug!(
                        "Request failed (attempt {}/{}), retrying in {}ms: {}",
                        attempt, self.retry_config.max_retries, delay_ms, e
                    );

                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;

                    delay_ms = ((delay_ms as f64) * self.retry_config.backoff_multiplier) as u64;
                    delay_ms = delay_ms.min(self.retry_config.max_delay_ms);
                }
            }
        }
    }

    /// Fetch a page of ratification events for the observed contract.
    ///
    /// Endpoint: `GET /contracts/{contract}/lease-events`
    /// Parameters:
    /// - `limit`: page size
    /// - `cursor`: resume token from a previous page (optional)
    pub async fn get_events(
        &self,
        cursor: Option<&str>,
        limit: u32,
    ) -> Result<GatewayEventsPage> {
        let mut url = format!(
            "{}/contracts/{}/lease-events?limit={}",
            self.base_url, self.contract, limit
        );
        if let Some(c) = cursor {
            url.push_str("&cursor=");
            url.push_str(c);
        }

        let client = self.http.clone();
        let url_clone = url.clone();

        self.retry_request(|| async {
            debug!("Fetching lease events from: {}", url_clone);
            let resp = client.get(&url_clone).send().await?;

            let status = resp.status();
            if !status.is_success() {
                let error_body = resp.text().await.unwrap_or_default();
                return Err(ChainError::GatewayApi {
                    endpoint: url_clone.clone(),
                    status: status.as_u16(),
                    message: error_body,
                });
            }

            let page: GatewayEventsPage = resp.json().await?;
            Ok(page)
        })
        .await
    }
}

/// Polling behavior of the gateway-backed event source.
#[derive(Debug, Clone)]
pub struct GatewaySourceConfig {
    pub poll_interval: Duration,
    pub page_limit: u32,
}

impl Default for GatewaySourceConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            page_limit: 200,
        }
    }
}

/// [`EventSource`] implementation that polls the gateway for new events.
pub struct GatewayEventSource {
    client: GatewayClient,
    config: GatewaySourceConfig,
}

impl GatewayEventSource {
    pub fn new(client: GatewayClient, config: GatewaySourceConfig) -> Self {
        Self { client, config }
    }
}

enum PollState {
    Active { cursor: Option<String> },
    Done,
}

#[async_trait]
impl EventSource for GatewayEventSource {
    async fn subscribe(&self) -> Result<EventStream> {
        // Probe first so a dead gateway fails the subscribe attempt instead
        // of surfacing as an immediate stream error.
        self.client.get_events(None, 1).await?;

        let client = self.client.clone();
        let poll_interval = self.config.poll_interval;
        let limit = self.config.page_limit;

        let stream = stream::unfold(
            PollState::Active { cursor: None },
            move |state| {
                let client = client.clone();
                async move {
                    match state {
                        PollState::Done => None,
                        PollState::Active { cursor } => {
                            match client.get_events(cursor.as_deref(), limit).await {
                                Ok(page) => {
                                    if page.records.is_empty() {
                                        tokio::time::sleep(poll_interval).await;
                                        return Some((
                                            Vec::new(),
                                            PollState::Active { cursor },
                                        ));
                                    }
                                    let next = page
                                        .next_cursor
                                        .clone()
                                        .or_else(|| {
                                            page.records.last().and_then(|r| r.cursor.clone())
                                        })
                                        .or(cursor);
                                    let items: Vec<Result<LeaseRatified>> = page
                                        .records
                                        .into_iter()
                                        .map(LeaseRatified::try_from)
                                        .collect();
                                    Some((items, PollState::Active { cursor: next }))
                                }
                                Err(e) => {
                                    warn!("lease event poll failed: {}", e);
                                    Some((
                                        vec![Err(ChainError::SubscriptionLost(e.to_string()))],
                                        PollState::Done,
                                    ))
                                }
                            }
                        }
                    }
                }
            },
        )
        .flat_map(stream::iter)
        .boxed();

        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    const CONTRACT: &str = "0xC0FFEE";

    fn events_path() -> String {
        format!("/contracts/{}/lease-events", CONTRACT)
    }

    fn sample_event_json() -> serde_json::Value {
        json!({
            "leaseId": "0x01",
            "spender": "0xAA",
            "earner": "0xBB",
            "price": "1000000000000000",
            "cursor": "17"
        })
    }

    fn page_json(records: serde_json::Value) -> String {
        json!({ "records": records, "nextCursor": "17" }).to_string()
    }

    fn no_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 0,
            initial_delay_ms: 0,
            max_delay_ms: 0,
            backoff_multiplier: 1.0,
        }
    }

    // -----------------------------------------------------------------------
    // Event decoding
    // -----------------------------------------------------------------------

    #[test]
    fn test_decode_event_with_string_price() {
        let raw: GatewayLeaseEvent = serde_json::from_value(sample_event_json()).unwrap();
        let event = LeaseRatified::try_from(raw).unwrap();
        assert_eq!(event.lease_id, vec![0x01]);
        assert_eq!(event.spender, "0xAA");
        assert_eq!(event.earner, "0xBB");
        assert_eq!(event.price, "1000000000000000");
    }

    #[test]
    fn test_decode_event_with_numeric_price() {
        let raw: GatewayLeaseEvent = serde_json::from_value(json!({
            "leaseId": "0x02",
            "spender": "0xAA",
            "earner": "0xBB",
            "price": 1000
        }))
        .unwrap();
        let event = LeaseRatified::try_from(raw).unwrap();
        assert_eq!(event.price, "1000");
    }

    #[test]
    fn test_decode_event_rejects_bad_lease_id() {
        let raw: GatewayLeaseEvent = serde_json::from_value(json!({
            "leaseId": "0xZZ",
            "spender": "0xAA",
            "earner": "0xBB",
            "price": "1"
        }))
        .unwrap();
        assert!(matches!(
            LeaseRatified::try_from(raw),
            Err(ChainError::EventMalformed(_))
        ));
    }

    #[test]
    fn test_decode_event_rejects_empty_addresses() {
        let raw: GatewayLeaseEvent = serde_json::from_value(json!({
            "leaseId": "0x01",
            "spender": "",
            "earner": "0xBB",
            "price": "1"
        }))
        .unwrap();
        assert!(matches!(
            LeaseRatified::try_from(raw),
            Err(ChainError::EventMalformed(_))
        ));
    }

    #[test]
    fn test_decode_event_rejects_fractional_price() {
        let raw: GatewayLeaseEvent = serde_json::from_value(json!({
            "leaseId": "0x01",
            "spender": "0xAA",
            "earner": "0xBB",
            "price": 1.5
        }))
        .unwrap();
        assert!(matches!(
            LeaseRatified::try_from(raw),
            Err(ChainError::EventMalformed(_))
        ));
    }

    // -----------------------------------------------------------------------
    // get_events
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_get_events_returns_records() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(events_path()))
            .and(query_param("limit", "10"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page_json(json!([sample_event_json()]))),
            )
            .mount(&mock_server)
            .await;

        let client = GatewayClient::new(mock_server.uri(), CONTRACT);
        let page = client.get_events(None, 10).await.unwrap();
        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].lease_id, "0x01");
        assert_eq!(page.next_cursor.as_deref(), Some("17"));
    }

    #[tokio::test]
    async fn test_get_events_passes_cursor() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(events_path()))
            .and(query_param("cursor", "42"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page_json(json!([]))))
            .mount(&mock_server)
            .await;

        let client = GatewayClient::new(mock_server.uri(), CONTRACT);
        let page = client.get_events(Some("42"), 200).await.unwrap();
        assert!(page.records.is_empty());
    }

    #[tokio::test]
    async fn test_get_events_500_returns_gateway_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(events_path()))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&mock_server)
            .await;

        let client = GatewayClient::with_retry_config(mock_server.uri(), CONTRACT, no_retry());
        let err = client.get_events(None, 10).await.unwrap_err();
        match err {
            ChainError::GatewayApi { status, .. } => assert_eq!(status, 500),
            other => panic!("Expected GatewayApi error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_events_invalid_json_returns_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(events_path()))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let client = GatewayClient::with_retry_config(mock_server.uri(), CONTRACT, no_retry());
        assert!(client.get_events(None, 10).await.is_err());
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_transient_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(events_path()))
            .respond_with(ResponseTemplate::new(500).set_body_string("error"))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path(events_path()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page_json(json!([sample_event_json()]))),
            )
            .mount(&mock_server)
            .await;

        let cfg = RetryConfig {
            max_retries: 3,
            initial_delay_ms: 1,
            max_delay_ms: 10,
            backoff_multiplier: 1.0,
        };
        let client = GatewayClient::with_retry_config(mock_server.uri(), CONTRACT, cfg);
        let page = client.get_events(None, 10).await.unwrap();
        assert_eq!(page.records.len(), 1);
    }

    // -----------------------------------------------------------------------
    // Subscription stream
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn test_subscribe_fails_when_gateway_is_down() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(events_path()))
            .respond_with(ResponseTemplate::new(503).set_body_string("down"))
            .mount(&mock_server)
            .await;

        let client = GatewayClient::with_retry_config(mock_server.uri(), CONTRACT, no_retry());
        let source = GatewayEventSource::new(client, GatewaySourceConfig::default());
        assert!(source.subscribe().await.is_err());
    }

    #[tokio::test]
    async fn test_subscribe_streams_decoded_events() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(events_path()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page_json(json!([sample_event_json()]))),
            )
            .mount(&mock_server)
            .await;

        let client = GatewayClient::new(mock_server.uri(), CONTRACT);
        let source = GatewayEventSource::new(
            client,
            GatewaySourceConfig {
                poll_interval: Duration::from_millis(10),
                page_limit: 10,
            },
        );
        let mut stream = source.subscribe().await.unwrap();

        let event = stream.next().await.unwrap().unwrap();
        assert_eq!(event.proposal_id(), "lease_prop_01");
        assert_eq!(event.price, "1000000000000000");
    }

    #[tokio::test]
    async fn test_stream_turns_poll_failure_into_subscription_lost() {
        let mock_server = MockServer::start().await;

        // Healthy during the subscribe probe and the first poll, then gone.
        Mock::given(method("GET"))
            .and(path(events_path()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page_json(json!([sample_event_json()]))),
            )
            .up_to_n_times(2)
            .mount(&mock_server)
            .await;

        Mock::given(method("GET"))
            .and(path(events_path()))
            .respond_with(ResponseTemplate::new(502).set_body_string("gone"))
            .mount(&mock_server)
            .await;

        let client = GatewayClient::with_retry_config(mock_server.uri(), CONTRACT, no_retry());
        let source = GatewayEventSource::new(
            client,
            GatewaySourceConfig {
                poll_interval: Duration::from_millis(10),
                page_limit: 10,
            },
        );
        let mut stream = source.subscribe().await.unwrap();

        assert!(stream.next().await.unwrap().is_ok());
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, ChainError::SubscriptionLost(_)));
        assert!(stream.next().await.is_none(), "stream ends after loss");
    }

    #[tokio::test]
    async fn test_malformed_record_is_an_item_not_a_loss() {
        let mock_server = MockServer::start().await;

        let records = json!([
            {
                "leaseId": "0xZZ",
                "spender": "0xAA",
                "earner": "0xBB",
                "price": "1",
                "cursor": "1"
            },
            {
                "leaseId": "0x03",
                "spender": "0xAA",
                "earner": "0xBB",
                "price": "2",
                "cursor": "2"
            }
        ]);
        Mock::given(method("GET"))
            .and(path(events_path()))
            .respond_with(ResponseTemplate::new(200).set_body_string(page_json(records)))
            .mount(&mock_server)
            .await;

        let client = GatewayClient::new(mock_server.uri(), CONTRACT);
        let source = GatewayEventSource::new(
            client,
            GatewaySourceConfig {
                poll_interval: Duration::from_millis(10),
                page_limit: 10,
            },
        );
        let mut stream = source.subscribe().await.unwrap();

        let first = stream.next().await.unwrap();
        assert!(matches!(first, Err(ChainError::EventMalformed(_))));
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.proposal_id(), "lease_prop_03");
    }
}
